//! Persisted last-known device addresses and scan-prefix candidates.
//!
//! The address book is a small JSON key-value file mapping each device class
//! to the IP it last answered discovery from. It is read at startup,
//! overwritten on every successful discovery, and never auto-expired — a
//! stale entry just makes the fast path miss and costs one short probe.
//!
//! It also supplies the ordered, deduplicated list of subnet prefixes the
//! broadcast scan walks: the /24 of the machine's own outbound address
//! first, then a fixed list of common private-network prefixes.

use std::collections::HashMap;
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LinkError, LinkResult};
use crate::profile::DeviceClass;

/// Common private-network prefixes probed when the local subnet comes up
/// empty. Order matters only for send order — the scan listens across all
/// of them in one window.
const FALLBACK_PREFIXES: [&str; 6] = [
    "192.168.43.",
    "192.168.1.",
    "192.168.0.",
    "192.168.254.",
    "10.0.0.",
    "172.20.10.",
];

/// Durable store of last-known device IPs, one entry per device class.
#[derive(Debug)]
pub struct AddressBook {
    path: PathBuf,
    entries: HashMap<DeviceClass, String>,
}

impl AddressBook {
    /// Open the store at `path`, loading existing entries.
    ///
    /// A missing file is an empty book, not an error. A corrupted file is
    /// reported as [`LinkError::AddressBook`] so the caller can decide
    /// whether to start over.
    pub fn open(path: impl Into<PathBuf>) -> LinkResult<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                LinkError::AddressBook(format!("corrupted store at {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(LinkError::AddressBook(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, entries })
    }

    /// Last IP the given device class answered from, if any.
    pub fn get(&self, class: DeviceClass) -> Option<IpAddr> {
        let raw = self.entries.get(&class)?;
        match raw.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!(%class, entry = %raw, "ignoring unparseable address book entry");
                None
            }
        }
    }

    /// Record `ip` as the last-known address for `class`, overwriting any
    /// previous entry, and persist the store.
    pub fn set(&mut self, class: DeviceClass, ip: IpAddr) -> LinkResult<()> {
        self.entries.insert(class, ip.to_string());
        self.persist()
    }

    fn persist(&self) -> LinkResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LinkError::AddressBook(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LinkError::AddressBook(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| {
            LinkError::AddressBook(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    /// Path of the backing store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ordered candidate subnet prefixes (`"a.b.c."`) for a broadcast scan:
    /// the local outbound /24 first, then the fixed fallback list,
    /// deduplicated preserving first occurrence.
    pub fn candidate_prefixes() -> Vec<String> {
        prefixes_from(local_outbound_ip())
    }
}

/// Resolve the machine's outbound LAN address by "connecting" a UDP socket
/// toward a well-known external endpoint and reading the local end. No
/// datagram is sent — connect on UDP only selects a route.
fn local_outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).ok()?;
    socket.connect(("8.8.8.8", 53)).ok()?;
    let local = socket.local_addr().ok()?;
    debug!(ip = %local.ip(), "resolved local outbound address");
    Some(local.ip())
}

fn prefixes_from(local: Option<IpAddr>) -> Vec<String> {
    let mut prefixes = Vec::with_capacity(FALLBACK_PREFIXES.len() + 1);
    if let Some(IpAddr::V4(v4)) = local {
        let [a, b, c, _] = v4.octets();
        prefixes.push(format!("{a}.{b}.{c}."));
    }
    for fallback in FALLBACK_PREFIXES {
        if !prefixes.iter().any(|p| p == fallback) {
            prefixes.push(fallback.to_string());
        }
    }
    prefixes
}
