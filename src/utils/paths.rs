//! Log file naming under the configured log directory.

use std::path::{Path, PathBuf};

/// Name of the file a single session's backend logs to, relative to
/// `log_dir`: `appium_server_<session_id>_<port>.log`.
#[must_use]
pub fn session_log_file_name(session_id: &str, port: u16) -> String {
    format!("appium_server_{session_id}_{port}.log")
}

/// Full path to a session's backend log file.
#[must_use]
pub fn session_log_path(log_dir: &Path, session_id: &str, port: u16) -> PathBuf {
    log_dir.join(session_log_file_name(session_id, port))
}

/// Path to the single process-wide hub log file.
#[must_use]
pub fn hub_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join("appium_hub.log")
}
