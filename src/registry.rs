//! Process-wide registry of device sessions.
//!
//! The registry owns at most one live [`ConnectionSession`] per device class
//! and is the single interface collaborator layers (chat, UI) talk to. It is
//! constructed once at startup and passed by handle — there are no ambient
//! singletons. Replacing or removing a session aborts its heartbeat and
//! releases its sockets before anything new is opened.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address_book::AddressBook;
use crate::command;
use crate::config::LinkConfig;
use crate::discovery::DiscoveryScanner;
use crate::error::{LinkError, LinkResult};
use crate::profile::{Command, DeviceClass};
use crate::session::{ConnectionSession, LinkEvent};
use crate::transport::ProbeTransport;

/// Capacity of the event channel. Disconnects are rare; observers that lag
/// behind this many events only lose history, not liveness.
const EVENT_CAPACITY: usize = 32;

/// Owner of all device sessions and the collaborator-facing API.
pub struct DeviceRegistry {
    config: LinkConfig,
    address_book: AddressBook,
    sessions: HashMap<DeviceClass, ConnectionSession>,
    events: broadcast::Sender<LinkEvent>,
    scan_targets: HashMap<DeviceClass, Vec<SocketAddr>>,
}

impl DeviceRegistry {
    /// Build a registry from configuration, opening the address book store.
    pub fn new(config: LinkConfig) -> LinkResult<Self> {
        let address_book = AddressBook::open(&config.address_book.path)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            address_book,
            sessions: HashMap::new(),
            events,
            scan_targets: HashMap::new(),
        })
    }

    /// Replace prefix enumeration with an explicit scan target list for one
    /// class. For tests driving a scripted device on loopback.
    pub fn with_scan_targets(mut self, class: DeviceClass, targets: Vec<SocketAddr>) -> Self {
        self.scan_targets.insert(class, targets);
        self
    }

    /// Subscribe to session lifecycle events ([`LinkEvent`]).
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Discover the device and open a session for it.
    ///
    /// Any previous session for the class — live or dead — is torn down
    /// first, so its heartbeat and sockets are gone before the scan opens a
    /// new one. Does not retry: a [`LinkError::DeviceNotFound`] is the
    /// caller's decision point.
    pub async fn connect(&mut self, class: DeviceClass) -> LinkResult<SocketAddr> {
        if let Some(previous) = self.sessions.remove(&class) {
            debug!(%class, "replacing existing session");
            previous.disconnect();
        }

        let profile = self.config.profile(class);
        let mut scanner =
            DiscoveryScanner::new(profile.clone()).with_scan_window(self.config.discovery.scan_window);
        if let Some(targets) = self.scan_targets.get(&class) {
            scanner = scanner.with_scan_targets(targets.clone());
        }

        let endpoint = scanner.discover(&mut self.address_book).await?;
        let session = ConnectionSession::start(profile, endpoint, self.events.clone());
        self.sessions.insert(class, session);
        let _ = self.events.send(LinkEvent::Connected { class, endpoint });
        Ok(endpoint)
    }

    /// Tear down the session for `class`, if any. Returns whether one
    /// existed. No disconnect event fires for an explicit teardown.
    pub fn disconnect(&mut self, class: DeviceClass) -> bool {
        match self.sessions.remove(&class) {
            Some(session) => {
                session.disconnect();
                true
            }
            None => false,
        }
    }

    /// Whether a live session exists for `class`.
    pub fn is_connected(&self, class: DeviceClass) -> bool {
        self.sessions
            .get(&class)
            .is_some_and(ConnectionSession::is_connected)
    }

    /// The session for `class`, live or not, if one exists.
    pub fn session(&self, class: DeviceClass) -> Option<&ConnectionSession> {
        self.sessions.get(&class)
    }

    /// Last address the device answered from, per the address book.
    pub fn last_known(&self, class: DeviceClass) -> Option<IpAddr> {
        self.address_book.get(class)
    }

    /// One-shot availability check against the cached address.
    ///
    /// Probes with the liveness vocabulary and a short timeout; touches no
    /// session state. `false` covers "no cached address", "silent device"
    /// and transport failure alike — absence of a reply is an answer.
    pub async fn is_available(&self, class: DeviceClass) -> bool {
        let Some(ip) = self.address_book.get(class) else {
            return false;
        };
        let profile = self.config.profile(class);
        let target = SocketAddr::new(ip, profile.port);

        let probe = async {
            let transport = ProbeTransport::bind().await?;
            transport
                .exchange(
                    profile.heartbeat_probe.as_bytes(),
                    target,
                    profile.cached_probe_timeout,
                )
                .await
        };
        match probe.await {
            Ok(Some((reply, _))) => reply == profile.heartbeat_reply,
            Ok(None) => false,
            Err(e) => {
                debug!(%class, error = %e, "availability probe failed");
                false
            }
        }
    }

    /// Dispatch a typed command to the class's live session.
    ///
    /// Fails fast — without sending — when no session exists
    /// ([`LinkError::NotConnected`]) or the session has died
    /// ([`LinkError::ConnectionLost`]).
    pub async fn send(&self, class: DeviceClass, command: Command) -> LinkResult<()> {
        let session = self
            .sessions
            .get(&class)
            .ok_or(LinkError::NotConnected(class))?;
        if !session.is_connected() {
            return Err(LinkError::ConnectionLost {
                class,
                reason: "heartbeat missed".to_string(),
            });
        }
        command::dispatch(session, command).await
    }

    /// Tear down every session. Call on process shutdown.
    pub fn shutdown(&mut self) {
        for (class, session) in self.sessions.drain() {
            info!(%class, "shutting down session");
            drop(session);
        }
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Try to reconnect every device class that has a cached address.
///
/// This is the startup auto-reconnect: a background task the owner keeps a
/// handle to and can abort on shutdown, rather than an untracked detached
/// future. Failures are logged and swallowed — an absent device at startup
/// is normal.
pub fn spawn_auto_reconnect(registry: Arc<Mutex<DeviceRegistry>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for class in DeviceClass::ALL {
            let cached = registry.lock().await.last_known(class);
            if cached.is_none() {
                continue;
            }
            match registry.lock().await.connect(class).await {
                Ok(endpoint) => info!(%class, %endpoint, "auto-reconnected"),
                Err(e) => warn!(%class, error = %e, "auto-reconnect failed"),
            }
        }
    })
}
