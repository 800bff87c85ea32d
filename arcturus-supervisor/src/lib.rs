mod process;
mod supervisor;

pub use process::{
    ChildProcess, CommandLauncher, Launcher, ProcessHandle, SupervisorConfig,
    DEFAULT_GRACE_PERIOD, DEFAULT_KILL_TIMEOUT,
};
pub use supervisor::ProcessSupervisor;
