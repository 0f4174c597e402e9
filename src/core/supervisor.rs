//! Spawning, readiness-probing, health-checking, and terminating one
//! backend process.
//!
//! Mirrors the shape of a execution backend in this workspace's
//! `backends` module (a small trait, one real implementation, one mock for
//! tests) but targets a single long-lived HTTP child process per session
//! rather than a container or git worktree.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::fs::File;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::HubError;

const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// One session's backend: spawn, probe readiness, report health, terminate.
///
/// Implemented by [`BackendSupervisor`] for real child processes and by a
/// test-only mock so the registry can be exercised without spawning
/// anything.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Start the backend, blocking until it answers `GET /status` with 200
    /// or `timeout` elapses.
    async fn start(&self, timeout: Duration) -> Result<(), HubError>;

    /// Idempotent: stop the backend, if running. Never fails the caller —
    /// failures are logged, not propagated, per the registry's teardown
    /// contract.
    async fn stop(&self);

    /// True iff the process is alive and a fresh readiness probe succeeds.
    async fn is_alive(&self) -> bool;

    /// `http://127.0.0.1:<port>`.
    fn base_url(&self) -> String;

    fn port(&self) -> u16;

    /// Path of the file this backend's stdout/stderr are redirected to.
    fn log_path(&self) -> PathBuf;
}

enum State {
    New,
    Starting,
    Running(Child),
    Stopped,
}

/// Real backend: owns a child process placed in its own process group.
pub struct BackendSupervisor {
    bin: String,
    port: u16,
    log_path: PathBuf,
    http: reqwest::Client,
    state: Mutex<State>,
}

impl BackendSupervisor {
    #[must_use]
    pub fn new(bin: String, port: u16, log_path: PathBuf) -> Self {
        Self {
            bin,
            port,
            log_path,
            http: reqwest::Client::new(),
            state: Mutex::new(State::New),
        }
    }

    async fn probe_status(&self) -> bool {
        let url = format!("{}/status", self.base_url());
        matches!(
            self.http
                .get(&url)
                .timeout(READY_PROBE_TIMEOUT)
                .send()
                .await,
            Ok(resp) if resp.status().is_success()
        )
    }
}

#[async_trait]
impl Backend for BackendSupervisor {
    async fn start(&self, timeout: Duration) -> Result<(), HubError> {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Running(_)) {
            tracing::warn!(port = self.port, "start called on an already-running backend");
            return Ok(());
        }
        *state = State::Starting;

        let log_file = File::create(&self.log_path)
            .await
            .map_err(|err| HubError::Internal(err.into()))?
            .into_std()
            .await;
        let log_file_stderr = log_file
            .try_clone()
            .map_err(|err| HubError::Internal(err.into()))?;

        let mut command = Command::new(&self.bin);
        command
            .arg("--address")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--session-override")
            .arg("--log-timestamp")
            .arg("--log-no-colors")
            .arg("--relaxed-security")
            .arg("--log")
            .arg(&self.log_path)
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_stderr))
            .process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                *state = State::Stopped;
                return Err(HubError::Internal(err.into()));
            }
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(Some(status)) = child.try_wait() {
                tracing::warn!(port = self.port, %status, "backend exited before becoming ready");
                *state = State::Stopped;
                return Err(HubError::BackendStartTimeout);
            }

            if self.probe_status().await {
                *state = State::Running(child);
                return Ok(());
            }

            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        let pid = child.id();
        drop(child);
        if let Some(pid) = pid {
            terminate_process_group(pid, STOP_GRACE_PERIOD).await;
        }
        *state = State::Stopped;
        Err(HubError::BackendStartTimeout)
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;
        let State::Running(child) = &mut *state else {
            tracing::warn!(port = self.port, "stop called on a non-running backend");
            return;
        };

        let pid = child.id();
        if let Some(pid) = pid {
            terminate_process_group(pid, STOP_GRACE_PERIOD).await;
        }
        let _ = child.wait().await;
        *state = State::Stopped;
    }

    async fn is_alive(&self) -> bool {
        let mut state = self.state.lock().await;
        let State::Running(child) = &mut *state else {
            return false;
        };

        if matches!(child.try_wait(), Ok(Some(_))) {
            *state = State::Stopped;
            return false;
        }
        drop(state);

        tokio::time::timeout(HEALTH_PROBE_TIMEOUT, self.probe_status())
            .await
            .unwrap_or(false)
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn log_path(&self) -> PathBuf {
        self.log_path.clone()
    }
}

/// Send `SIGTERM` to the process group, then `SIGKILL` if it outlives `grace`.
///
/// The child is placed in its own process group on spawn (`process_group(0)`),
/// so signalling `-pid` reaches any helpers it has forked without touching
/// unrelated processes.
async fn terminate_process_group(pid: u32, grace: Duration) {
    let group = Pid::from_raw(-(i32::try_from(pid).unwrap_or(i32::MAX)));

    if signal::kill(group, Signal::SIGTERM).is_err() {
        // ESRCH ("no such process") counts as already-stopped, not a failure.
        return;
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if signal::kill(group, None).is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let _ = signal::kill(group, Signal::SIGKILL);
}

/// In-process stand-ins for [`Backend`], for tests that should not spawn a
/// real child process.
pub mod mock {
    use std::sync::atomic::{AtomicBool, Ordering};

    use std::path::PathBuf;

    use super::{async_trait, Backend, Duration, HubError};

    /// In-process stand-in for a backend, used by registry/gateway tests
    /// that should not spawn a real child process.
    pub struct MockBackend {
        port: u16,
        alive: AtomicBool,
        fail_start: bool,
    }

    impl MockBackend {
        #[must_use]
        pub fn new(port: u16, fail_start: bool) -> Self {
            Self {
                port,
                alive: AtomicBool::new(false),
                fail_start,
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn start(&self, _timeout: Duration) -> Result<(), HubError> {
            if self.fail_start {
                return Err(HubError::BackendStartTimeout);
            }
            self.alive.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) {
            self.alive.store(false, Ordering::SeqCst);
        }

        async fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn base_url(&self) -> String {
            format!("http://127.0.0.1:{}", self.port)
        }

        fn port(&self) -> u16 {
            self.port
        }

        fn log_path(&self) -> PathBuf {
            PathBuf::from(format!("appium_server_mock_{}.log", self.port))
        }
    }
}
