//! Layered configuration for everything this crate does beyond what `bluez-async` already
//! defaults: retry counts, recovery stage caps, bond-storage location, and the handful of toggles
//! that change observable behavior (`auto_fix_stall`, bruteforce handle ceiling).

use serde::Deserialize;
use std::path::PathBuf;

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Number of attempts `safe_read_with_retry` makes before giving up on a transient error.
    pub read_retry_attempts: u32,
    /// Delay between `safe_read_with_retry` attempts, in milliseconds.
    pub read_retry_delay_ms: u64,
    /// Bounded history length kept per characteristic for notifications.
    pub notification_history_len: usize,
    /// Whether to shell out to `bluetoothctl disconnect <MAC>` on a `no_reply` landmine against a
    /// known device, to clear a wedged controller. Off by default; enabling this is a deployment
    /// choice, not something the core does unasked.
    #[serde(default)]
    pub auto_fix_stall: bool,
    /// Upper bound on the handle range probed by bruteforce mode when the caller asks for the
    /// full 16-bit range.
    pub bruteforce_handle_ceiling: u16,
    /// Directory bond records are persisted under; created with mode 0700.
    pub bond_storage_dir: PathBuf,
    /// TTL, in seconds, for the in-memory pairing-data cache.
    pub pairing_cache_ttl_secs: u64,
    pub recovery: RecoveryConfig,
    #[serde(default = "default_true")]
    pub serialize_per_device: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            read_retry_attempts: 3,
            read_retry_delay_ms: 300,
            notification_history_len: 10,
            auto_fix_stall: false,
            bruteforce_handle_ceiling: 0x00ff,
            bond_storage_dir: PathBuf::from("/var/lib/blerecon/bonds"),
            pairing_cache_ttl_secs: 300,
            recovery: RecoveryConfig::default(),
            serialize_per_device: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub reconnect_max_attempts: u32,
    pub reconnect_cooldown_secs: u64,
    pub reset_interfaces_max_attempts: u32,
    pub reset_interfaces_cooldown_secs: u64,
    pub power_cycle_max_attempts: u32,
    pub power_cycle_cooldown_secs: u64,
    pub controller_reset_max_attempts: u32,
    pub controller_reset_cooldown_secs: u64,
    pub daemon_restart_max_attempts: u32,
    pub daemon_restart_cooldown_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            reconnect_max_attempts: 3,
            reconnect_cooldown_secs: 60,
            reset_interfaces_max_attempts: 2,
            reset_interfaces_cooldown_secs: 300,
            power_cycle_max_attempts: 1,
            power_cycle_cooldown_secs: 900,
            controller_reset_max_attempts: 1,
            controller_reset_cooldown_secs: 1800,
            daemon_restart_max_attempts: 1,
            daemon_restart_cooldown_secs: 3600,
        }
    }
}

impl CoreConfig {
    /// Load a config from a TOML file, falling back to [`Default::default`] for anything the
    /// file leaves unset. Missing file is not an error; it just means all defaults.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_table() {
        let config = CoreConfig::default();
        assert_eq!(config.read_retry_attempts, 3);
        assert_eq!(config.recovery.reconnect_max_attempts, 3);
        assert_eq!(config.recovery.daemon_restart_cooldown_secs, 3600);
        assert!(!config.auto_fix_stall);
    }

    #[test]
    fn missing_file_is_defaults() {
        let config = CoreConfig::load_from_file(std::path::Path::new("/nonexistent/blerecon.toml"))
            .unwrap();
        assert_eq!(config.bruteforce_handle_ceiling, 0x00ff);
    }
}
