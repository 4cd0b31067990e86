//! Device discovery.
//!
//! Resolves a device class to a concrete endpoint in two stages: a cheap
//! probe of the last-known IP, then — only if that misses — a broadcast
//! sweep of every candidate subnet. The fast path dominates cost in the
//! common "same device, same network" case.
//!
//! The scanner never retries on its own: a `DeviceNotFound` is returned to
//! the caller, who owns the re-scan decision.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::address_book::AddressBook;
use crate::error::{LinkError, LinkResult};
use crate::profile::DeviceProfile;
use crate::transport::{trim_payload, ProbeTransport};

/// Total time spent listening for scan replies, independent of how many
/// probes were sent.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(3);

/// Host suffixes probed within each /24 prefix.
const HOST_SUFFIXES: std::ops::RangeInclusive<u16> = 1..=254;

/// One-shot discovery for a single device class.
pub struct DiscoveryScanner {
    profile: DeviceProfile,
    scan_window: Duration,
    scan_targets: Option<Vec<SocketAddr>>,
}

impl DiscoveryScanner {
    /// Scanner for `profile` with the default scan window.
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            scan_window: DEFAULT_SCAN_WINDOW,
            scan_targets: None,
        }
    }

    /// Override the scan window.
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Scan an explicit target list instead of enumerating subnet prefixes.
    ///
    /// This exists for tests, where the "device" is a scripted responder on
    /// a loopback socket that a prefix sweep would never reach.
    pub fn with_scan_targets(mut self, targets: Vec<SocketAddr>) -> Self {
        self.scan_targets = Some(targets);
        self
    }

    /// Resolve the device's current endpoint.
    ///
    /// On success the winning IP is written back to `book`. On a missed scan
    /// window returns [`LinkError::DeviceNotFound`]; the caller decides
    /// whether to scan again.
    pub async fn discover(&self, book: &mut AddressBook) -> LinkResult<SocketAddr> {
        if let Some(ip) = book.get(self.profile.class) {
            let cached = SocketAddr::new(ip, self.profile.port);
            if self.probe_cached(cached).await {
                info!(class = %self.profile.class, endpoint = %cached, "cached endpoint answered");
                book.set(self.profile.class, cached.ip())?;
                return Ok(cached);
            }
            debug!(class = %self.profile.class, endpoint = %cached, "cached endpoint silent, scanning");
        }

        self.scan(book).await
    }

    /// Fast path: one probe at the last-known address, short timeout, exact
    /// signature required. Any failure — including an unroutable cached
    /// address — is just a miss; the scan is the recovery path.
    async fn probe_cached(&self, target: SocketAddr) -> bool {
        let exchange = async {
            let transport = ProbeTransport::bind().await?;
            transport
                .exchange(
                    self.profile.discovery_probe.as_bytes(),
                    target,
                    self.profile.cached_probe_timeout,
                )
                .await
        };
        match exchange.await {
            Ok(Some((signature, _))) => signature == self.profile.discovery_reply,
            Ok(None) => false,
            Err(e) => {
                debug!(%target, error = %e, "cached probe failed");
                false
            }
        }
    }

    /// Broadcast sweep: probe every candidate host, then listen for the
    /// first exactly matching signature within the scan window.
    async fn scan(&self, book: &mut AddressBook) -> LinkResult<SocketAddr> {
        let transport = ProbeTransport::bind().await?;
        let targets = self.scan_targets();
        debug!(
            class = %self.profile.class,
            targets = targets.len(),
            window = ?self.scan_window,
            "broadcasting discovery probe"
        );
        transport
            .broadcast_to(self.profile.discovery_probe.as_bytes(), targets)
            .await;

        let deadline = Instant::now() + self.scan_window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LinkError::DeviceNotFound(self.profile.class));
            }
            let Some((payload, from)) = transport.recv_with_timeout(remaining).await? else {
                return Err(LinkError::DeviceNotFound(self.profile.class));
            };
            let signature = trim_payload(&payload);
            if signature == self.profile.discovery_reply {
                let endpoint = SocketAddr::new(from.ip(), self.profile.port);
                info!(class = %self.profile.class, %endpoint, "device discovered");
                book.set(self.profile.class, endpoint.ip())?;
                return Ok(endpoint);
            }
            // Not our device; keep listening until the window closes.
            debug!(%from, reply = %signature, "ignoring non-matching discovery reply");
        }
    }

    fn scan_targets(&self) -> Vec<SocketAddr> {
        if let Some(targets) = &self.scan_targets {
            return targets.clone();
        }
        let prefixes = AddressBook::candidate_prefixes();
        let mut targets = Vec::with_capacity(prefixes.len() * HOST_SUFFIXES.count());
        for prefix in prefixes {
            for suffix in HOST_SUFFIXES {
                if let Ok(ip) = format!("{prefix}{suffix}").parse() {
                    targets.push(SocketAddr::new(ip, self.profile.port));
                }
            }
        }
        targets
    }
}
