//! Dedicated server process lifecycle.
//!
//! The supervisor tracks at most one child it started itself. That handle can go
//! stale (the server was started from another shell, or the console wrapper exited
//! while the server kept running), so the state has an explicit `Unknown` case and
//! killing by executable name is a separate action.

use camino::{Utf8Path, Utf8PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

/// Executables looked up in the server directory, in order of preference.
#[cfg(windows)]
pub const SERVER_EXECUTABLES: &[&str] = &["AssettoServer.exe", "acServer.exe"];

/// Executables looked up in the server directory, in order of preference.
///
/// Linux and macOS builds of AssettoServer ship without an extension.
#[cfg(not(windows))]
pub const SERVER_EXECUTABLES: &[&str] = &["AssettoServer.exe", "acServer.exe", "AssettoServer"];

/// How long `stop` waits for the tracked process to exit.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Pause between stopping and starting again on restart.
pub const RESTART_DELAY: Duration = Duration::from_millis(1500);

/// Window title of the dedicated console on Windows.
const CONSOLE_TITLE: &str = "AC Server";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No server executable found in {0}")]
    ExecutableNotFound(Utf8PathBuf),

    #[error("Server is already running ({0})")]
    AlreadyRunning(String),

    #[error("Process error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server did not exit within {0:?}")]
    Timeout(Duration),
}

/// Observable server state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServerStatus {
    #[default]
    NotStarted,
    Running {
        executable: String,
        pid: Option<u32>,
    },
    /// A process was started but its handle no longer tells us whether it runs.
    Unknown,
}

impl ServerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServerStatus::Running { .. })
    }

    pub fn label(&self) -> String {
        match self {
            ServerStatus::NotStarted => "stopped".to_string(),
            ServerStatus::Running { executable, pid: Some(pid) } => {
                format!("running ({}, pid {})", executable, pid)
            }
            ServerStatus::Running { executable, pid: None } => format!("running ({})", executable),
            ServerStatus::Unknown => "unknown (use kill to clean up)".to_string(),
        }
    }
}

struct ServerHandle {
    child: Child,
    executable: String,
    pid: Option<u32>,
}

enum ProcessState {
    NotStarted,
    Running(ServerHandle),
    Unknown,
}

/// First server executable present in `server_dir`.
pub fn find_executable(server_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    SERVER_EXECUTABLES
        .iter()
        .map(|name| server_dir.join(name))
        .find(|path| path.is_file())
}

/// Build the launch command for `executable` with `server_dir` as working directory.
///
/// On Windows the server gets its own console window (`start /wait`), so the
/// tracked child is the `cmd.exe` wrapper.
pub fn build_command(executable: &Utf8Path, server_dir: &Utf8Path) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd.exe");
        c.args(["/c", "start", CONSOLE_TITLE, "/wait"]).arg(executable);
        c
    } else {
        Command::new(executable)
    };
    cmd.current_dir(server_dir);
    cmd
}

fn kill_command(name: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("taskkill");
        c.args(["/f", "/im", name]);
        c
    } else {
        let mut c = Command::new("pkill");
        c.args(["-x", name]);
        c
    };
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    cmd
}

/// Starts, stops and polls the dedicated server.
pub struct ServerSupervisor {
    state: ProcessState,
}

impl ServerSupervisor {
    pub fn new() -> Self {
        Self {
            state: ProcessState::NotStarted,
        }
    }

    /// Current state without polling the process.
    pub fn snapshot(&self) -> ServerStatus {
        match &self.state {
            ProcessState::NotStarted => ServerStatus::NotStarted,
            ProcessState::Running(handle) => ServerStatus::Running {
                executable: handle.executable.clone(),
                pid: handle.pid,
            },
            ProcessState::Unknown => ServerStatus::Unknown,
        }
    }

    /// Poll the tracked process and return the updated state.
    pub fn status(&mut self) -> ServerStatus {
        let polled = match &mut self.state {
            ProcessState::Running(handle) => Some(handle.child.try_wait()),
            _ => None,
        };

        match polled {
            Some(Ok(Some(exit))) => {
                tracing::info!("Server process exited: {}", exit);
                self.state = ProcessState::NotStarted;
            }
            Some(Err(e)) => {
                tracing::warn!("Lost track of the server process: {}", e);
                self.state = ProcessState::Unknown;
            }
            Some(Ok(None)) | None => {}
        }

        self.snapshot()
    }

    /// Launch the server found in `server_dir`.
    ///
    /// Fails with [`ProcessError::AlreadyRunning`] while the tracked process is alive.
    pub async fn start(&mut self, server_dir: &Utf8Path) -> Result<ServerStatus, ProcessError> {
        if let ServerStatus::Running { executable, .. } = self.status() {
            return Err(ProcessError::AlreadyRunning(executable));
        }

        let executable =
            find_executable(server_dir).ok_or_else(|| ProcessError::ExecutableNotFound(server_dir.to_owned()))?;
        let child = build_command(&executable, server_dir).spawn()?;
        let pid = child.id();
        let name = executable.file_name().unwrap_or(executable.as_str()).to_string();

        tracing::info!("Started {} (pid {:?}) in {}", name, pid, server_dir);
        self.state = ProcessState::Running(ServerHandle {
            child,
            executable: name,
            pid,
        });
        Ok(self.snapshot())
    }

    /// Terminate the tracked process, waiting up to `grace` for it to exit.
    ///
    /// Returns `false` when there was no live tracked process. On timeout the state
    /// becomes [`ServerStatus::Unknown`].
    pub async fn stop(&mut self, grace: Duration) -> Result<bool, ProcessError> {
        let mut handle = match std::mem::replace(&mut self.state, ProcessState::NotStarted) {
            ProcessState::Running(handle) => handle,
            other => {
                tracing::debug!("Stop requested but no live server process is tracked");
                self.state = other;
                return Ok(false);
            }
        };

        if let Ok(Some(exit)) = handle.child.try_wait() {
            tracing::info!("Server process had already exited: {}", exit);
            return Ok(false);
        }

        if let Err(e) = handle.child.start_kill() {
            self.state = ProcessState::Unknown;
            return Err(e.into());
        }

        match timeout(grace, handle.child.wait()).await {
            Ok(Ok(exit)) => {
                tracing::info!("Stopped {} ({})", handle.executable, exit);
                Ok(true)
            }
            Ok(Err(e)) => {
                self.state = ProcessState::Unknown;
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!("{} did not exit within {:?}", handle.executable, grace);
                self.state = ProcessState::Unknown;
                Err(ProcessError::Timeout(grace))
            }
        }
    }

    /// Kill every process named like a server executable, tracked or not.
    ///
    /// Returns the executable names for which a process was killed.
    pub async fn kill_by_name(&mut self) -> Vec<&'static str> {
        let mut killed = Vec::new();

        for name in SERVER_EXECUTABLES {
            match kill_command(name).status().await {
                Ok(status) if status.success() => {
                    tracing::info!("Killed processes named {}", name);
                    killed.push(*name);
                }
                Ok(_) => tracing::debug!("No process named {}", name),
                Err(e) => tracing::warn!("Could not run kill for {}: {}", name, e),
            }
        }

        if let ServerStatus::Unknown = self.status() {
            self.state = ProcessState::NotStarted;
        }
        killed
    }

    /// Stop the tracked process, kill any leftover by name, then start again.
    pub async fn restart(&mut self, server_dir: &Utf8Path) -> Result<ServerStatus, ProcessError> {
        if let Err(e) = self.stop(STOP_GRACE).await {
            tracing::warn!("Stop before restart failed: {}", e);
        }
        self.kill_by_name().await;
        self.state = ProcessState::NotStarted;

        sleep(RESTART_DELAY).await;
        self.start(server_dir).await
    }
}

impl Default for ServerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_executable_preference() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        assert_eq!(find_executable(&dir), None);

        std::fs::write(dir.join("acServer.exe"), "").unwrap();
        assert_eq!(find_executable(&dir), Some(dir.join("acServer.exe")));

        std::fs::write(dir.join("AssettoServer.exe"), "").unwrap();
        assert_eq!(find_executable(&dir), Some(dir.join("AssettoServer.exe")));
    }

    #[test]
    fn test_extensionless_executable_only_off_windows() {
        assert_eq!(SERVER_EXECUTABLES.contains(&"AssettoServer"), cfg!(not(windows)));

        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("AssettoServer"), "").unwrap();
        let expected = cfg!(not(windows)).then(|| dir.join("AssettoServer"));
        assert_eq!(find_executable(&dir), expected);
    }

    #[test]
    fn test_build_command_uses_server_dir() {
        let dir = Utf8Path::new("/srv/ac");
        let exe = dir.join("AssettoServer");
        let cmd = build_command(&exe, dir);
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_current_dir(), Some(dir.as_std_path()));
        if cfg!(target_os = "windows") {
            let args: Vec<&str> = std_cmd.get_args().filter_map(|arg| arg.to_str()).collect();
            assert_eq!(args[..4], ["/c", "start", CONSOLE_TITLE, "/wait"]);
        } else {
            assert_eq!(std_cmd.get_program(), exe.as_std_path().as_os_str());
            assert_eq!(std_cmd.get_args().count(), 0);
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ServerStatus::NotStarted.label(), "stopped");
        let running = ServerStatus::Running {
            executable: "acServer.exe".into(),
            pid: Some(42),
        };
        assert!(running.is_running());
        assert_eq!(running.label(), "running (acServer.exe, pid 42)");
    }

    #[tokio::test]
    async fn test_start_without_executable() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let mut supervisor = ServerSupervisor::new();

        let err = supervisor.start(&dir).await.unwrap_err();
        assert!(matches!(err, ProcessError::ExecutableNotFound(_)));
        assert_eq!(supervisor.snapshot(), ServerStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_stop_when_nothing_tracked() {
        let mut supervisor = ServerSupervisor::new();
        assert!(!supervisor.stop(Duration::from_millis(10)).await.unwrap());
    }
}
