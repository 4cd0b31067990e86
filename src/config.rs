//! Configuration loading.
//!
//! Configuration is merged from two providers, later wins:
//! 1. a `rehalink.toml` file (path overridable on the CLI)
//! 2. environment variables prefixed with `REHALINK_`, using `__` as the
//!    section separator (e.g. `REHALINK_LOG__LEVEL=debug`).
//!
//! All fields have defaults, so running without any configuration at all is
//! supported. Per-profile sections only override timing and port; the wire
//! vocabulary itself is fixed firmware behavior and not configurable.
//!
//! # Example
//! ```toml
//! [log]
//! level = "debug"
//!
//! [discovery]
//! scan_window = "3s"
//!
//! [stimulator]
//! heartbeat_interval = "2s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::discovery::DEFAULT_SCAN_WINDOW;
use crate::profile::{DeviceClass, DeviceProfile};

/// Top-level crate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Address book store settings.
    #[serde(default)]
    pub address_book: AddressBookConfig,
    /// Timing overrides for the plank profile.
    #[serde(default)]
    pub plank: ProfileOverrides,
    /// Timing overrides for the stimulator profile.
    #[serde(default)]
    pub stimulator: ProfileOverrides,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Total time the broadcast scan listens for replies.
    #[serde(default = "default_scan_window", with = "humantime_serde")]
    pub scan_window: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_window: default_scan_window(),
        }
    }
}

/// Address book store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBookConfig {
    /// Path of the JSON store holding last-known device IPs.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for AddressBookConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Optional per-profile timing/port overrides. Unset fields keep the
/// built-in profile values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    /// UDP port the device listens on.
    #[serde(default)]
    pub port: Option<u16>,
    /// Cadence of the liveness probe.
    #[serde(default, with = "humantime_serde::option")]
    pub heartbeat_interval: Option<Duration>,
    /// Reply window for one heartbeat.
    #[serde(default, with = "humantime_serde::option")]
    pub heartbeat_timeout: Option<Duration>,
    /// Timeout for cached-IP and availability probes.
    #[serde(default, with = "humantime_serde::option")]
    pub cached_probe_timeout: Option<Duration>,
    /// Command acknowledgment window.
    #[serde(default, with = "humantime_serde::option")]
    pub ack_timeout: Option<Duration>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scan_window() -> Duration {
    DEFAULT_SCAN_WINDOW
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rehalink")
        .join("address_book.json")
}

impl LinkConfig {
    /// Load configuration from `rehalink.toml` and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("rehalink.toml")
    }

    /// Load configuration from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("REHALINK_").split("__"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.as_str()) {
            return Err(format!(
                "invalid log level '{}'; must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            ));
        }

        if self.discovery.scan_window.is_zero() {
            return Err("discovery.scan_window must be non-zero".to_string());
        }

        for (section, overrides) in [("plank", &self.plank), ("stimulator", &self.stimulator)] {
            for (field, value) in [
                ("heartbeat_interval", overrides.heartbeat_interval),
                ("heartbeat_timeout", overrides.heartbeat_timeout),
                ("cached_probe_timeout", overrides.cached_probe_timeout),
                ("ack_timeout", overrides.ack_timeout),
            ] {
                if value.is_some_and(|d| d.is_zero()) {
                    return Err(format!("{section}.{field} must be non-zero"));
                }
            }
        }

        Ok(())
    }

    /// The effective profile for a device class: built-in vocabulary with
    /// this configuration's overrides applied.
    pub fn profile(&self, class: DeviceClass) -> DeviceProfile {
        let overrides = match class {
            DeviceClass::Plank => &self.plank,
            DeviceClass::Stimulator => &self.stimulator,
        };
        let mut profile = DeviceProfile::for_class(class);
        if let Some(port) = overrides.port {
            profile.port = port;
        }
        if let Some(interval) = overrides.heartbeat_interval {
            profile.heartbeat_interval = interval;
        }
        if let Some(timeout) = overrides.heartbeat_timeout {
            profile.heartbeat_timeout = timeout;
        }
        if let Some(timeout) = overrides.cached_probe_timeout {
            profile.cached_probe_timeout = timeout;
        }
        if let Some(timeout) = overrides.ack_timeout {
            profile.ack_timeout = timeout;
        }
        profile
    }
}
