use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// How long a stopping child gets to exit after SIGTERM
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// How long to wait for the child to be reaped after SIGKILL
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Paths and stop policy for the supervised tileserver. Fixed for the
/// lifetime of a supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub grace_period: Duration,
    pub kill_timeout: Duration,
}

impl SupervisorConfig {
    pub fn new<B: Into<PathBuf>, C: Into<PathBuf>>(binary_path: B, config_path: C) -> Self {
        Self {
            binary_path: binary_path.into(),
            config_path: config_path.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
        }
    }

    pub fn with_stop_timeouts(mut self, grace_period: Duration, kill_timeout: Duration) -> Self {
        self.grace_period = grace_period;
        self.kill_timeout = kill_timeout;
        self
    }
}

/// A started child process, owned exclusively by the supervisor.
///
/// Signalling methods are best-effort and never block. `await_exit` is the
/// only operation that waits, and it is always bounded.
#[async_trait]
pub trait ProcessHandle: Send {
    fn pid(&self) -> u32;

    /// Non-blocking liveness probe. Reaps the child if it has exited.
    fn is_alive(&mut self) -> bool;

    /// Ask the child to exit (SIGTERM)
    fn request_graceful_exit(&mut self) -> io::Result<()>;

    /// Kill the child outright (SIGKILL)
    fn force_kill(&mut self) -> io::Result<()>;

    /// Ask the child to re-read its config in place (SIGHUP)
    fn send_reload(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for the child to exit. Returns true once it has.
    async fn await_exit(&mut self, timeout: Duration) -> bool;
}

/// Starts the supervised binary as `<binary> --config <config>`
pub trait Launcher: Send + Sync {
    fn launch(&self, binary: &Path, config: &Path) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Launches real OS processes through `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, binary: &Path, config: &Path) -> io::Result<Box<dyn ProcessHandle>> {
        let child = Command::new(binary)
            .arg("--config")
            .arg(config)
            .stdin(Stdio::null())
            .spawn()?;

        Ok(Box::new(ChildProcess::new(child)?))
    }
}

/// A tokio child process
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: u32,
}

impl ChildProcess {
    pub fn new(child: Child) -> io::Result<Self> {
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("child exited before its pid was read"))?;
        Ok(Self { child, pid })
    }
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = self.pid, %status, "Tileserver has exited");
                false
            }
            Err(e) => {
                warn!(pid = self.pid, error = %e, "Failed to poll tileserver");
                false
            }
        }
    }

    fn request_graceful_exit(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            signal(self.pid, nix::sys::signal::Signal::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            self.child.start_kill()
        }
    }

    fn force_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn send_reload(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            signal(self.pid, nix::sys::signal::Signal::SIGHUP)
        }
        #[cfg(not(unix))]
        {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "reload signal is only available on unix",
            ))
        }
    }

    async fn await_exit(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid = self.pid, %status, "Tileserver exited");
                true
            }
            Ok(Err(e)) => {
                warn!(pid = self.pid, error = %e, "Failed to wait for tileserver");
                false
            }
            Err(_) => false,
        }
    }
}

// The pid cannot have been recycled here: the child is only reaped through
// `Child`, and every caller probes liveness first under the supervisor lock.
#[cfg(unix)]
fn signal(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
    use nix::unistd::Pid;

    nix::sys::signal::kill(Pid::from_raw(pid as i32), signal)?;
    debug!(pid, ?signal, "Signalled tileserver");
    Ok(())
}
