//! Data model: port ranges, session records, and their public view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::supervisor::Backend;

/// An immutable, inclusive range of TCP ports.
///
/// Cardinality (`end - start + 1`) is the hard ceiling on concurrent
/// sessions; `HubConfig::max_sessions` is a second, possibly smaller,
/// ceiling enforced independently by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Construct a range, rejecting `start > end`.
    pub fn new(start: u16, end: u16) -> Result<Self, String> {
        if start > end {
            return Err(format!("invalid port range: {start} > {end}"));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Ports in the range, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u16> + use<> {
        self.start..=self.end
    }
}

/// A single live session: the port it owns and the backend supervising it.
///
/// Ownership is 1:1 with its `backend`; dropping the record does not itself
/// stop the backend (the registry's `delete` path calls `backend.stop()`
/// explicitly before the record is discarded).
pub struct SessionRecord {
    pub id: String,
    pub port: u16,
    pub backend: Arc<dyn Backend>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub device_udid: Option<String>,
    pub device_name: Option<String>,
}

impl SessionRecord {
    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }
}

/// The public, serializable view of a session (`SessionView` in the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub port: u16,
    pub service_url: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub device_udid: Option<String>,
    pub device_name: Option<String>,
    pub is_alive: bool,
    pub log_file: String,
}
