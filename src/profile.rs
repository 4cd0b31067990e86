//! Device vocabularies and typed commands.
//!
//! Each supported peripheral class is a *data value*, not a code path: a
//! [`DeviceProfile`] carries the full fixed vocabulary of one device class
//! (discovery probe and signature, heartbeat exchange, timing windows, ack
//! token), and the protocol engine is generic over it. The two profiles here
//! describe the posture plank and the electro-stimulator.
//!
//! ## Protocol
//!
//! Plain ASCII payloads, one per UDP datagram, both devices on port 1234:
//!
//! | Exchange | Plank | Stimulator |
//! |----------|-------|------------|
//! | discovery | `242` → `123985` | `DISCOVER` → `PONG` |
//! | heartbeat | `242` → `123985` | `PING` → `PONG` |
//! | command | `567` (calibrate, no ack) | `SET:<power>,<mode>` → `OK` |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The device classes this crate can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Posture plank sensor/calibrator.
    Plank,
    /// Electro-stimulator.
    Stimulator,
}

impl DeviceClass {
    /// All known device classes, in registration order.
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Plank, DeviceClass::Stimulator];

    /// Stable lowercase name, used for store keys and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Plank => "plank",
            DeviceClass::Stimulator => "stimulator",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plank" => Ok(DeviceClass::Plank),
            "stimulator" | "stim" => Ok(DeviceClass::Stimulator),
            other => Err(format!(
                "unknown device class '{other}' (expected 'plank' or 'stimulator')"
            )),
        }
    }
}

/// Stimulation mode bounds accepted by the stimulator firmware.
pub const STIM_MODE_MIN: i32 = 1;
/// Upper mode bound.
pub const STIM_MODE_MAX: i32 = 8;
/// Stimulation power bounds accepted by the stimulator firmware.
pub const STIM_POWER_MIN: i32 = 0;
/// Upper power bound.
pub const STIM_POWER_MAX: i32 = 19;

/// Opcode the plank interprets as a calibration trigger.
const CALIBRATE_OPCODE: &str = "567";

/// The fixed per-class protocol vocabulary.
///
/// Immutable once built; timing fields may be adjusted from configuration
/// before a profile is handed to the engine (see `LinkConfig::profile`).
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Which device class this vocabulary belongs to.
    pub class: DeviceClass,
    /// Human-readable device name for logs and status lines.
    pub display_name: &'static str,
    /// UDP port the device listens on.
    pub port: u16,
    /// Payload broadcast to locate the device.
    pub discovery_probe: &'static str,
    /// Exact signature (after trim) the device answers discovery with.
    pub discovery_reply: &'static str,
    /// Payload of the periodic liveness probe.
    pub heartbeat_probe: &'static str,
    /// Exact reply (after trim) that proves the device is alive.
    pub heartbeat_reply: &'static str,
    /// Cadence of the liveness probe while connected.
    pub heartbeat_interval: Duration,
    /// How long one heartbeat reply may take before the session is dead.
    pub heartbeat_timeout: Duration,
    /// Timeout for the cached-IP fast path and one-shot availability probes.
    pub cached_probe_timeout: Duration,
    /// How long a command acknowledgment may take.
    pub ack_timeout: Duration,
    /// Token that acknowledges a successful command, if the device acks at all.
    pub ack_success_token: Option<&'static str>,
}

const PLANK: DeviceProfile = DeviceProfile {
    class: DeviceClass::Plank,
    display_name: "posture plank",
    port: 1234,
    discovery_probe: "242",
    discovery_reply: "123985",
    heartbeat_probe: "242",
    heartbeat_reply: "123985",
    heartbeat_interval: Duration::from_secs(5),
    heartbeat_timeout: Duration::from_millis(800),
    cached_probe_timeout: Duration::from_millis(600),
    ack_timeout: Duration::from_secs(2),
    ack_success_token: None,
};

const STIMULATOR: DeviceProfile = DeviceProfile {
    class: DeviceClass::Stimulator,
    display_name: "electro-stimulator",
    port: 1234,
    discovery_probe: "DISCOVER",
    discovery_reply: "PONG",
    heartbeat_probe: "PING",
    heartbeat_reply: "PONG",
    heartbeat_interval: Duration::from_secs(5),
    heartbeat_timeout: Duration::from_millis(1500),
    cached_probe_timeout: Duration::from_millis(1200),
    ack_timeout: Duration::from_secs(2),
    ack_success_token: Some("OK"),
};

impl DeviceProfile {
    /// Built-in vocabulary for a device class.
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Plank => PLANK,
            DeviceClass::Stimulator => STIMULATOR,
        }
    }
}

/// A command addressed to a peripheral.
///
/// Transient — formatted to the wire right before sending, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Trigger the plank's calibration routine. The protocol has no
    /// calibration ack; success is assumed once the datagram is sent.
    Calibrate,
    /// Apply stimulation parameters. Out-of-range values are clamped, not
    /// rejected, matching the device's own tolerance policy.
    SetStimulation {
        /// Stimulation pattern, clamped to [1, 8].
        mode: i32,
        /// Stimulation intensity, clamped to [0, 19].
        power: i32,
    },
}

impl Command {
    /// The device class this command belongs to.
    pub fn class(self) -> DeviceClass {
        match self {
            Command::Calibrate => DeviceClass::Plank,
            Command::SetStimulation { .. } => DeviceClass::Stimulator,
        }
    }

    /// Short wire name for error messages.
    pub fn name(self) -> &'static str {
        match self {
            Command::Calibrate => "calibrate",
            Command::SetStimulation { .. } => "set-stimulation",
        }
    }

    /// Whether the device acknowledges this command.
    pub fn expects_ack(self) -> bool {
        matches!(self, Command::SetStimulation { .. })
    }

    /// Serialize to the wire format, clamping parameters into their valid
    /// ranges. Clamping is total and idempotent.
    pub fn wire_format(self) -> String {
        match self {
            Command::Calibrate => CALIBRATE_OPCODE.to_string(),
            Command::SetStimulation { mode, power } => {
                let mode = mode.clamp(STIM_MODE_MIN, STIM_MODE_MAX);
                let power = power.clamp(STIM_POWER_MIN, STIM_POWER_MAX);
                format!("SET:{power},{mode}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_round_trips_through_str() {
        for class in DeviceClass::ALL {
            assert_eq!(class.as_str().parse::<DeviceClass>(), Ok(class));
        }
        assert!("treadmill".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn plank_heartbeat_reuses_discovery_vocabulary() {
        let profile = DeviceProfile::for_class(DeviceClass::Plank);
        assert_eq!(profile.discovery_probe, profile.heartbeat_probe);
        assert_eq!(profile.discovery_reply, profile.heartbeat_reply);
        assert!(profile.ack_success_token.is_none());
    }

    #[test]
    fn calibrate_is_the_fixed_opcode() {
        assert_eq!(Command::Calibrate.wire_format(), "567");
        assert!(!Command::Calibrate.expects_ack());
    }

    #[test]
    fn stimulation_params_are_clamped() {
        let cmd = Command::SetStimulation {
            mode: 99,
            power: -5,
        };
        assert_eq!(cmd.wire_format(), "SET:0,8");
    }

    #[test]
    fn in_range_stimulation_params_pass_through() {
        let cmd = Command::SetStimulation { mode: 4, power: 10 };
        assert_eq!(cmd.wire_format(), "SET:10,4");
    }

    #[test]
    fn clamping_is_idempotent() {
        let clamped = Command::SetStimulation {
            mode: STIM_MODE_MAX,
            power: STIM_POWER_MIN,
        };
        assert_eq!(
            clamped.wire_format(),
            Command::SetStimulation {
                mode: 1000,
                power: -1000,
            }
            .wire_format()
        );
    }
}
