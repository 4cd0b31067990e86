//! Custom error types for the protocol core.
//!
//! This module defines the primary error type, `LinkError`, for the crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way
//! to handle the failure modes of the discovery/liveness/command protocol.
//!
//! Every variant is recoverable: a peripheral being briefly unreachable is an
//! expected condition on these networks, so failures are returned as values
//! and never escalated into panics. Retry policy belongs to the caller — no
//! function in this crate retries on its own.

use thiserror::Error;

use crate::profile::DeviceClass;

/// Convenience alias for results using the crate error type.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

#[derive(Error, Debug)]
pub enum LinkError {
    /// The scan window elapsed without a qualifying discovery reply.
    #[error("no {0} answered within the scan window")]
    DeviceNotFound(DeviceClass),

    /// A previously connected session died (heartbeat missed or mismatched).
    #[error("connection to {class} lost: {reason}")]
    ConnectionLost {
        /// Device class whose session died.
        class: DeviceClass,
        /// Human-readable cause, suitable for user-facing status lines.
        reason: String,
    },

    /// The device did not acknowledge a command within the ack window.
    #[error("{0} did not acknowledge the command in time")]
    CommandTimeout(DeviceClass),

    /// The device replied to a command, but not with the success token.
    #[error("{class} rejected the command with reply {reply:?}")]
    CommandRejected {
        /// Device class that produced the reply.
        class: DeviceClass,
        /// The trimmed reply payload, for diagnostics.
        reply: String,
    },

    /// A command was issued against a device class with no live session.
    ///
    /// This is a caller contract violation and fails fast — no datagram is
    /// sent.
    #[error("no live session for {0}; connect first")]
    NotConnected(DeviceClass),

    /// The command is not part of the target device's vocabulary.
    #[error("the {class} device does not accept {command}")]
    UnsupportedCommand {
        /// Device class the command was routed to.
        class: DeviceClass,
        /// Wire name of the offending command.
        command: &'static str,
    },

    /// Socket-level failure (bind, send, receive).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The address book store could not be read or written.
    #[error("address book error: {0}")]
    AddressBook(String),
}
