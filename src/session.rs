//! Connection sessions and heartbeat-based liveness.
//!
//! A [`ConnectionSession`] is the live binding between a device class and
//! the endpoint discovery resolved for it. While the session lives, a
//! background task probes the device every `heartbeat_interval`; a single
//! missing or mismatched reply tears the session down and publishes a
//! [`LinkEvent::Disconnected`] exactly once.
//!
//! Heartbeats are strictly sequential — the loop awaits each exchange before
//! sleeping until the next beat, so at most one is ever in flight. Each beat
//! uses its own short-lived socket and therefore cannot race a concurrent
//! command for the device's reply.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::profile::{DeviceClass, DeviceProfile};
use crate::transport::ProbeTransport;

/// Reason string delivered to observers on heartbeat failure.
const CONNECTION_LOST: &str = "connection lost";

/// Session lifecycle notifications published to registry observers.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A discovery succeeded and a session went live.
    Connected {
        /// Device class that connected.
        class: DeviceClass,
        /// The resolved endpoint.
        endpoint: SocketAddr,
    },
    /// A live session died because a heartbeat went unanswered.
    Disconnected {
        /// Device class that dropped.
        class: DeviceClass,
        /// Non-empty, human-readable cause.
        reason: String,
    },
}

/// Observable session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Endpoint bound, heartbeat armed.
    Connected,
    /// Terminal. A new discovery is required to come back.
    Disconnected,
}

#[derive(Debug)]
struct SessionShared {
    connected: AtomicBool,
    last_heartbeat: Mutex<Option<DateTime<Utc>>>,
}

/// The live binding between a device class and a discovered endpoint.
///
/// Created only by a successful discovery; owns the heartbeat task and the
/// endpoint. Dropping the session (or replacing it with a newly discovered
/// one) aborts the heartbeat and releases every socket.
#[derive(Debug)]
pub struct ConnectionSession {
    profile: DeviceProfile,
    endpoint: SocketAddr,
    shared: Arc<SessionShared>,
    heartbeat: JoinHandle<()>,
}

impl ConnectionSession {
    /// Bind a session to `endpoint` and arm its heartbeat.
    pub(crate) fn start(
        profile: DeviceProfile,
        endpoint: SocketAddr,
        events: broadcast::Sender<LinkEvent>,
    ) -> Self {
        let shared = Arc::new(SessionShared {
            connected: AtomicBool::new(true),
            last_heartbeat: Mutex::new(None),
        });
        let heartbeat = tokio::spawn(heartbeat_loop(
            profile.clone(),
            endpoint,
            Arc::clone(&shared),
            events,
        ));
        Self {
            profile,
            endpoint,
            shared,
            heartbeat,
        }
    }

    /// The vocabulary this session speaks.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// The endpoint discovery resolved. Meaningful only while connected.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Whether the session is still live.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Current state of the session's two-state machine.
    pub fn state(&self) -> SessionState {
        if self.is_connected() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// When the device last answered a heartbeat, if it has yet.
    pub fn last_heartbeat_at(&self) -> Option<DateTime<Utc>> {
        *self
            .shared
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Explicitly tear the session down. No disconnect event is published —
    /// the caller initiated this and needs no notification.
    pub fn disconnect(self) {
        info!(class = %self.profile.class, endpoint = %self.endpoint, "session closed");
        drop(self);
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.heartbeat.abort();
        self.shared.connected.store(false, Ordering::SeqCst);
    }
}

/// Probe the device until a beat fails, then mark the session dead and
/// notify observers once. The task ends with the first failure; nothing is
/// rescheduled until a new discovery builds a new session.
async fn heartbeat_loop(
    profile: DeviceProfile,
    endpoint: SocketAddr,
    shared: Arc<SessionShared>,
    events: broadcast::Sender<LinkEvent>,
) {
    let mut ticker = tokio::time::interval(profile.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the first beat should wait one period.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match heartbeat_once(&profile, endpoint).await {
            Ok(true) => {
                debug!(class = %profile.class, "heartbeat answered");
                *shared
                    .last_heartbeat
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Utc::now());
            }
            Ok(false) => {
                warn!(class = %profile.class, %endpoint, "heartbeat missed");
                break;
            }
            Err(e) => {
                warn!(class = %profile.class, %endpoint, error = %e, "heartbeat transport failed");
                break;
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    let _ = events.send(LinkEvent::Disconnected {
        class: profile.class,
        reason: CONNECTION_LOST.to_string(),
    });
}

/// One probe/reply exchange on a dedicated socket. `Ok(false)` covers both a
/// silent device and a reply that is not the expected liveness token.
async fn heartbeat_once(profile: &DeviceProfile, endpoint: SocketAddr) -> crate::LinkResult<bool> {
    let transport = ProbeTransport::bind().await?;
    let reply = transport
        .exchange(
            profile.heartbeat_probe.as_bytes(),
            endpoint,
            profile.heartbeat_timeout,
        )
        .await?;
    Ok(matches!(reply, Some((token, _)) if token == profile.heartbeat_reply))
}
