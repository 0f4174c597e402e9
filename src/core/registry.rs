//! Authoritative session bookkeeping: the hub-session-id -> record map,
//! capacity enforcement, and idle eviction.
//!
//! The lock here guards only synchronous bookkeeping (map/port-set
//! mutation, counter checks) — never an outbound HTTP call or a process
//! spawn/wait, per the concurrency model this hub follows. `create` drops
//! the lock before calling `Backend::start`; `shutdown_all` snapshots
//! records under the lock and tears them down afterward rather than
//! re-entering it, since `std::sync::Mutex` is not reentrant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::port_allocator::PortAllocator;
use super::session::{PortRange, SessionRecord, SessionView};
use super::supervisor::Backend;
use crate::error::HubError;

/// Aggregate health snapshot returned by `GET /health`.
pub struct HealthReport {
    pub total_sessions: usize,
    pub healthy_sessions: usize,
    pub unhealthy_ids: Vec<String>,
    pub available_ports: usize,
    pub used_ports: Vec<u16>,
}

/// Builds a `Backend` for a freshly reserved port and its not-yet-inserted
/// session id (needed to name the backend's log file). The real binary
/// wires this to `BackendSupervisor::new`; tests wire it to a
/// `MockBackend`.
pub type BackendFactory = Arc<dyn Fn(u16, &str) -> Arc<dyn Backend> + Send + Sync>;

struct Bookkeeping {
    records: HashMap<String, SessionRecord>,
    ports: PortAllocator,
}

pub struct SessionRegistry {
    inner: Mutex<Bookkeeping>,
    max_sessions: usize,
    backend_start_timeout: Duration,
    factory: BackendFactory,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(range: PortRange, max_sessions: usize, backend_start_timeout: Duration, factory: BackendFactory) -> Self {
        Self {
            inner: Mutex::new(Bookkeeping {
                records: HashMap::new(),
                ports: PortAllocator::new(range),
            }),
            max_sessions,
            backend_start_timeout,
            factory,
        }
    }

    /// Session-create choreography, steps 1-4 of the registry contract:
    /// reserve bookkeeping under lock, spawn the backend outside the lock,
    /// and compensate (release the port, insert nothing) on any failure.
    pub async fn create(
        &self,
        device_udid: Option<String>,
        device_name: Option<String>,
    ) -> Result<String, HubError> {
        let port = {
            let mut state = self.inner.lock().unwrap();
            if state.records.len() >= self.max_sessions {
                return Err(HubError::CapacityExhausted);
            }
            state.ports.reserve().ok_or(HubError::CapacityExhausted)?
        };

        let id = Uuid::new_v4().to_string();
        let backend = (self.factory)(port, &id);
        if let Err(err) = backend.start(self.backend_start_timeout).await {
            let mut state = self.inner.lock().unwrap();
            state.ports.release(port);
            return Err(err);
        }

        let now = Utc::now();
        let record = SessionRecord {
            id: id.clone(),
            port,
            backend,
            created_at: now,
            last_used: now,
            device_udid,
            device_name,
        };

        let mut state = self.inner.lock().unwrap();
        state.records.insert(id.clone(), record);
        Ok(id)
    }

    /// Refresh `last_used` and return enough to build a `SessionView` or
    /// dispatch a proxied request. Consumers that only need the backend's
    /// base URL and id should prefer this over `view`.
    pub fn touch(&self, id: &str) -> Option<(String, u16, Arc<dyn Backend>)> {
        let mut state = self.inner.lock().unwrap();
        let record = state.records.get_mut(id)?;
        record.touch();
        Some((record.backend.base_url(), record.port, record.backend.clone()))
    }

    pub async fn view(&self, id: &str) -> Option<SessionView> {
        let snapshot = {
            let mut state = self.inner.lock().unwrap();
            let record = state.records.get_mut(id)?;
            record.touch();
            (
                record.id.clone(),
                record.port,
                record.backend.base_url(),
                record.created_at,
                record.last_used,
                record.device_udid.clone(),
                record.device_name.clone(),
                record.backend.clone(),
            )
        };
        let (id, port, service_url, created_at, last_used, device_udid, device_name, backend) = snapshot;
        let is_alive = backend.is_alive().await;
        Some(SessionView {
            session_id: id,
            port,
            service_url,
            created_at,
            last_used,
            device_udid,
            device_name,
            is_alive,
            log_file: backend.log_path().display().to_string(),
        })
    }

    pub async fn list(&self) -> Vec<SessionView> {
        let ids: Vec<String> = {
            let state = self.inner.lock().unwrap();
            state.records.keys().cloned().collect()
        };
        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(view) = self.view(&id).await {
                views.push(view);
            }
        }
        views
    }

    /// Remove a record and stop its backend. Backend-stop failures are
    /// logged, never fatal: the port and id are freed regardless.
    pub async fn delete(&self, id: &str) -> bool {
        let record = {
            let mut state = self.inner.lock().unwrap();
            let Some(record) = state.records.remove(id) else {
                return false;
            };
            state.ports.release(record.port);
            record
        };

        record.backend.stop().await;
        true
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub async fn health(&self) -> HealthReport {
        let (ids, available_ports, used_ports) = {
            let state = self.inner.lock().unwrap();
            (
                state.records.keys().cloned().collect::<Vec<_>>(),
                state.ports.available(),
                state.ports.used_ports(),
            )
        };

        let mut healthy = 0;
        let mut unhealthy_ids = Vec::new();
        for id in &ids {
            let backend = {
                let state = self.inner.lock().unwrap();
                state.records.get(id).map(|r| r.backend.clone())
            };
            let Some(backend) = backend else { continue };
            if backend.is_alive().await {
                healthy += 1;
            } else {
                unhealthy_ids.push(id.clone());
            }
        }

        HealthReport {
            total_sessions: ids.len(),
            healthy_sessions: healthy,
            unhealthy_ids,
            available_ports,
            used_ports,
        }
    }

    /// Snapshot every live id under the lock, then tear each down outside
    /// it — avoids re-entering the (non-reentrant) bookkeeping lock from
    /// within `delete`.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = {
            let state = self.inner.lock().unwrap();
            state.records.keys().cloned().collect()
        };
        for id in ids {
            self.delete(&id).await;
        }
    }

    /// Evict sessions idle for longer than `timeout`. Called from a
    /// long-lived background task; any errors the caller logs and
    /// swallows rather than letting the sweep die.
    pub async fn evict_idle(&self, timeout: Duration) -> usize {
        let now = Utc::now();
        let stale: Vec<String> = {
            let state = self.inner.lock().unwrap();
            state
                .records
                .iter()
                .filter_map(|(id, record)| {
                    let idle = now.signed_duration_since(record.last_used);
                    let idle_secs = idle.num_seconds().max(0) as u64;
                    (idle_secs > timeout.as_secs()).then(|| id.clone())
                })
                .collect()
        };

        let mut evicted = 0;
        for id in stale {
            if self.delete(&id).await {
                tracing::info!(session_id = %id, "evicted idle session");
                evicted += 1;
            }
        }
        evicted
    }
}
