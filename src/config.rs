//! Hub configuration.
//!
//! Every field can be set by flag or by the matching environment variable
//! (via clap's `env` feature), with the same names and defaults as the
//! original Python hub's `HubConfig.from_env`.

use std::path::PathBuf;

use clap::Parser;

use crate::core::session::PortRange;

#[derive(Parser, Debug, Clone)]
#[command(name = "appium-hub", about = "Session-aware reverse-proxy hub for Appium", long_about = None)]
pub struct HubConfig {
    /// Address to bind the gateway's HTTP listener on.
    #[arg(long, env = "HUB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the gateway listens on.
    #[arg(long, env = "HUB_PORT", default_value_t = 4444)]
    pub port: u16,

    /// First port in the backend allocation range (inclusive).
    #[arg(long, env = "APPIUM_PORT_START", default_value_t = 4723)]
    pub appium_port_start: u16,

    /// Last port in the backend allocation range (inclusive).
    #[arg(long, env = "APPIUM_PORT_END", default_value_t = 4773)]
    pub appium_port_end: u16,

    /// Maximum number of concurrent sessions, independent of the port range size.
    #[arg(long, env = "MAX_SESSIONS", default_value_t = 10)]
    pub max_sessions: usize,

    /// Seconds of inactivity after which an idle session is evicted.
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 1800)]
    pub session_timeout_secs: u64,

    /// Directory for per-session and hub-wide log files.
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Hub's own log verbosity (used to seed `RUST_LOG` when unset).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Cadence, in seconds, of the background idle-eviction sweep.
    #[arg(long, env = "HEALTH_CHECK_INTERVAL", default_value_t = 60)]
    pub health_check_interval_secs: u64,

    /// Executable invoked to start a backend server.
    #[arg(long, env = "APPIUM_BIN", default_value = "appium")]
    pub appium_bin: String,
}

impl HubConfig {
    /// The inclusive port range sessions are allocated out of.
    ///
    /// # Panics
    ///
    /// Panics if `appium_port_start > appium_port_end` (a misconfiguration,
    /// not a runtime condition callers should recover from).
    #[must_use]
    pub fn port_range(&self) -> PortRange {
        PortRange::new(self.appium_port_start, self.appium_port_end)
            .expect("appium_port_start must be <= appium_port_end")
    }

    #[must_use]
    pub fn session_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_timeout_secs)
    }

    #[must_use]
    pub fn health_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.health_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_hub() {
        let cfg = HubConfig::parse_from(["appium-hub"]);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 4444);
        assert_eq!(cfg.appium_port_start, 4723);
        assert_eq!(cfg.appium_port_end, 4773);
        assert_eq!(cfg.max_sessions, 10);
        assert_eq!(cfg.session_timeout_secs, 1800);
        assert_eq!(cfg.log_dir, PathBuf::from("logs"));
        assert_eq!(cfg.health_check_interval_secs, 60);
    }

    #[test]
    fn port_range_respects_flags() {
        let cfg = HubConfig::parse_from([
            "appium-hub",
            "--appium-port-start",
            "5000",
            "--appium-port-end",
            "5001",
        ]);
        let range = cfg.port_range();
        assert_eq!(range.len(), 2);
    }
}
