use crate::process::{CommandLauncher, Launcher, ProcessHandle, SupervisorConfig};
use arcturus_core::{ArcturusError, ProcessStatus, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type HandleSlot = Option<Box<dyn ProcessHandle>>;

/// Supervises a single tileserver child process.
///
/// Every lifecycle operation holds the slot lock for its whole duration, so
/// they never overlap. `restart` is the exception by construction: it is a
/// `stop` followed by a separately locked `start`, and other callers may
/// observe the stopped state in between.
///
/// `status` never waits behind a lifecycle operation. While one is in
/// flight it answers with the status recorded when the lock was last held.
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    launcher: Arc<dyn Launcher>,
    slot: Mutex<HandleSlot>,
    // Pid from the last probe, 0 when stopped
    last_pid: AtomicU32,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_launcher(config, Arc::new(CommandLauncher))
    }

    pub fn with_launcher(config: SupervisorConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config,
            launcher,
            slot: Mutex::new(None),
            last_pid: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start the tileserver unless it is already running.
    ///
    /// Fails with `BinaryNotFound` or `ConfigNotFound` before anything is
    /// spawned, and with `SpawnFailed` if the launch itself errors.
    pub async fn start(&self) -> Result<ProcessStatus> {
        let mut slot = self.slot.lock().await;

        if let Some(handle) = slot.as_mut() {
            if handle.is_alive() {
                debug!(pid = handle.pid(), "Tileserver already running");
                return Ok(self.record(ProcessStatus::running(handle.pid())));
            }
            *slot = None;
        }

        self.ensure_binary()?;
        self.ensure_config()?;

        let handle = self
            .launcher
            .launch(&self.config.binary_path, &self.config.config_path)
            .map_err(|source| {
                error!(
                    binary = %self.config.binary_path.display(),
                    error = %source,
                    "Failed to spawn tileserver"
                );
                ArcturusError::SpawnFailed {
                    binary: self.config.binary_path.clone(),
                    source,
                }
            })?;

        info!(
            pid = handle.pid(),
            binary = %self.config.binary_path.display(),
            config = %self.config.config_path.display(),
            "Started tileserver"
        );

        *slot = Some(handle);
        Ok(self.record(probe(&mut slot)))
    }

    /// Stop the tileserver, escalating from SIGTERM to SIGKILL.
    ///
    /// Never fails. Blocks for at most the grace period plus the kill timeout.
    pub async fn stop(&self) -> ProcessStatus {
        let mut slot = self.slot.lock().await;

        // Taking the handle clears the slot on every path out of here
        let Some(mut handle) = slot.take() else {
            return self.record(ProcessStatus::stopped());
        };

        if handle.is_alive() {
            self.terminate(&mut *handle).await;
        } else {
            debug!(pid = handle.pid(), "Tileserver had already exited");
        }

        self.record(probe(&mut slot))
    }

    /// Stop then start, as two independently locked operations
    pub async fn restart(&self) -> Result<ProcessStatus> {
        self.stop().await;
        self.start().await
    }

    /// Deliver SIGHUP to the running tileserver so it reloads its config.
    /// A no-op when nothing is running.
    pub async fn reload(&self) -> ProcessStatus {
        let mut slot = self.slot.lock().await;

        match slot.as_mut() {
            Some(handle) => {
                let pid = handle.pid();
                if !handle.is_alive() {
                    debug!(pid, "Tileserver has exited, nothing to reload");
                } else if let Err(e) = handle.send_reload() {
                    warn!(
                        pid,
                        error = %e,
                        "Tileserver vanished before the reload signal was delivered"
                    );
                } else {
                    info!(pid, "Sent reload signal to tileserver");
                }
            }
            None => debug!("No running tileserver to reload"),
        }

        self.record(probe(&mut slot))
    }

    pub async fn status(&self) -> ProcessStatus {
        match self.slot.try_lock() {
            Ok(mut slot) => self.record(probe(&mut slot)),
            Err(_) => self.last_known(),
        }
    }

    /// Host shutdown hook
    pub async fn shutdown(&self) -> ProcessStatus {
        info!("Shutting down tileserver supervisor");
        self.stop().await
    }

    fn record(&self, status: ProcessStatus) -> ProcessStatus {
        self.last_pid.store(status.pid.unwrap_or(0), Ordering::SeqCst);
        status
    }

    fn last_known(&self) -> ProcessStatus {
        match self.last_pid.load(Ordering::SeqCst) {
            0 => ProcessStatus::stopped(),
            pid => ProcessStatus::running(pid),
        }
    }

    fn ensure_binary(&self) -> Result<()> {
        if !self.config.binary_path.exists() {
            return Err(ArcturusError::BinaryNotFound(self.config.binary_path.clone()));
        }
        Ok(())
    }

    fn ensure_config(&self) -> Result<()> {
        if !self.config.config_path.exists() {
            return Err(ArcturusError::ConfigNotFound(self.config.config_path.clone()));
        }
        Ok(())
    }

    async fn terminate(&self, handle: &mut dyn ProcessHandle) {
        let pid = handle.pid();

        if let Err(e) = handle.request_graceful_exit() {
            warn!(pid, error = %e, "Failed to send SIGTERM to tileserver");
        }
        if handle.await_exit(self.config.grace_period).await {
            info!(pid, "Tileserver stopped");
            return;
        }

        warn!(
            pid,
            grace_period = ?self.config.grace_period,
            "Tileserver did not exit after SIGTERM, sending SIGKILL"
        );
        if let Err(e) = handle.force_kill() {
            warn!(pid, error = %e, "Failed to send SIGKILL to tileserver");
        }
        if handle.await_exit(self.config.kill_timeout).await {
            info!(pid, "Tileserver killed");
        } else {
            error!(
                pid,
                kill_timeout = ?self.config.kill_timeout,
                "Tileserver was not reaped after SIGKILL, releasing its handle"
            );
        }
    }
}

/// Liveness as seen through the slot, derived fresh on every call
fn probe(slot: &mut HandleSlot) -> ProcessStatus {
    match slot.as_mut() {
        Some(handle) => {
            if handle.is_alive() {
                ProcessStatus::running(handle.pid())
            } else {
                ProcessStatus::stopped()
            }
        }
        None => ProcessStatus::stopped(),
    }
}
