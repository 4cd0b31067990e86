//! Scripted in-process device firmware for integration tests.
//!
//! A [`MockDevice`] binds a loopback UDP socket and answers probes according
//! to a [`Behavior`] — the same request/reply vocabulary the real peripherals
//! speak. Every received payload is recorded so tests can assert exactly
//! which datagrams reached the device, and the device can be silenced to
//! simulate a disappearing peripheral (it keeps recording while silent).

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use rehalink::config::{AddressBookConfig, DiscoveryConfig, LinkConfig, ProfileOverrides};
use rehalink::DeviceClass;

/// Request/reply vocabulary one mock device speaks.
#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    pub discovery_probe: &'static str,
    pub discovery_reply: &'static str,
    pub heartbeat_probe: &'static str,
    pub heartbeat_reply: &'static str,
    /// Reply to a command payload (`567` or `SET:...`), if the device acks.
    pub command_ack: Option<&'static str>,
}

impl Behavior {
    /// The posture plank's vocabulary.
    pub fn plank() -> Self {
        Self {
            discovery_probe: "242",
            discovery_reply: "123985",
            heartbeat_probe: "242",
            heartbeat_reply: "123985",
            command_ack: None,
        }
    }

    /// The electro-stimulator's vocabulary.
    pub fn stimulator() -> Self {
        Self {
            discovery_probe: "DISCOVER",
            discovery_reply: "PONG",
            heartbeat_probe: "PING",
            heartbeat_reply: "PONG",
            command_ack: Some("OK"),
        }
    }
}

/// A scripted peripheral on a loopback socket.
pub struct MockDevice {
    addr: SocketAddr,
    responsive: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<String>>>,
    server: JoinHandle<()>,
}

impl MockDevice {
    /// Bind a socket and start answering per `behavior`.
    pub async fn spawn(behavior: Behavior) -> Self {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        let responsive = Arc::new(AtomicBool::new(true));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let server = tokio::spawn(serve(
            socket,
            behavior,
            Arc::clone(&responsive),
            Arc::clone(&seen),
        ));

        Self {
            addr,
            responsive,
            seen,
            server,
        }
    }

    /// The device's endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the device answers probes. While unresponsive it still
    /// records everything it receives.
    pub fn set_responsive(&self, responsive: bool) {
        self.responsive.store(responsive, Ordering::SeqCst);
    }

    /// Every payload received so far, trimmed, in arrival order.
    pub async fn seen(&self) -> Vec<String> {
        self.seen.lock().await.clone()
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve(
    socket: UdpSocket,
    behavior: Behavior,
    responsive: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<String>>>,
) {
    let mut buf = [0u8; 512];
    loop {
        let Ok((len, from)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let payload = String::from_utf8_lossy(&buf[..len]).trim().to_string();
        seen.lock().await.push(payload.clone());

        if !responsive.load(Ordering::SeqCst) {
            continue;
        }

        let reply = if payload == behavior.discovery_probe {
            Some(behavior.discovery_reply)
        } else if payload == behavior.heartbeat_probe {
            Some(behavior.heartbeat_reply)
        } else if payload.starts_with("SET:") || payload == "567" {
            behavior.command_ack
        } else {
            None
        };

        if let Some(reply) = reply {
            let _ = socket.send_to(reply.as_bytes(), from).await;
        }
    }
}

/// Registry configuration tuned for fast tests: short windows, a temp
/// address book, and the device class's port pointed at the mock.
pub fn test_config(store_dir: &Path, class: DeviceClass, device_port: u16) -> LinkConfig {
    let overrides = ProfileOverrides {
        port: Some(device_port),
        heartbeat_interval: Some(Duration::from_millis(100)),
        heartbeat_timeout: Some(Duration::from_millis(150)),
        cached_probe_timeout: Some(Duration::from_millis(150)),
        ack_timeout: Some(Duration::from_millis(200)),
    };

    let mut config = LinkConfig {
        address_book: AddressBookConfig {
            path: store_dir.join("address_book.json"),
        },
        discovery: DiscoveryConfig {
            scan_window: Duration::from_millis(400),
        },
        ..Default::default()
    };
    match class {
        DeviceClass::Plank => config.plank = overrides,
        DeviceClass::Stimulator => config.stimulator = overrides,
    }
    config
}
