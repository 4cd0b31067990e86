//! # rehalink
//!
//! Connectivity core for two classes of LAN-attached rehabilitation
//! peripherals — a posture plank and an electro-stimulator — driven over a
//! private UDP request/reply protocol. Device addresses are not known in
//! advance and may change between sessions, so the crate provides discovery
//! by subnet probing with a cached-IP fast path, heartbeat-based liveness,
//! and typed command dispatch with acknowledgment handling.
//!
//! Chat/AI, UI and speech layers are external collaborators: they consume
//! the [`DeviceRegistry`] interface and own all user-facing messaging and
//! retry decisions. Nothing in this crate retries on its own.
//!
//! ## Crate Structure
//!
//! - **`profile`**: the per-class protocol vocabulary ([`DeviceProfile`])
//!   and typed commands. Each device class is a data value; one generic
//!   engine drives both.
//! - **`address_book`**: durable last-known-IP store and the candidate
//!   subnet prefixes a broadcast scan walks.
//! - **`transport`**: one short-lived UDP socket per logical exchange, with
//!   deadline-bound receives.
//! - **`discovery`**: cached-IP fast path, then first-match-wins broadcast
//!   scanning across candidate subnets.
//! - **`session`**: the per-class connection session and its sequential
//!   heartbeat task.
//! - **`command`**: calibration and stimulation dispatch against a live
//!   session, with clamping and ack windows.
//! - **`registry`**: process-wide owner of at most one session per class;
//!   the collaborator-facing API.
//! - **`config`**: TOML + environment configuration with per-profile timing
//!   overrides.
//! - **`error`**: the typed, fully recoverable failure taxonomy.

pub mod address_book;
pub mod command;
pub mod config;
pub mod discovery;
pub mod error;
pub mod profile;
pub mod registry;
pub mod session;
pub mod transport;

pub use address_book::AddressBook;
pub use config::LinkConfig;
pub use discovery::DiscoveryScanner;
pub use error::{LinkError, LinkResult};
pub use profile::{Command, DeviceClass, DeviceProfile};
pub use registry::{spawn_auto_reconnect, DeviceRegistry};
pub use session::{ConnectionSession, LinkEvent, SessionState};
pub use transport::ProbeTransport;
