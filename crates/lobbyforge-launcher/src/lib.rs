//! Match process supervision for Lobbyforge.
//!
//! Every started room gets its own game server process, listening on a
//! port nobody else has been given. This crate owns both halves of that:
//!
//! - [`PortAllocator`]: a process-wide, monotonically increasing port
//!   counter. Ports are never reused.
//! - [`MatchLauncher`]: spawns `[interpreter] <program> <port> <players>`
//!   in the game's install directory, forwards its output to the log, and
//!   reports its exit through a [`MatchCompletion`].
//!
//! # Integration
//!
//! The lobby launches, records the [`RunningMatch`], and hands the
//! completion to a reaper task:
//!
//! ```ignore
//! let (running, completion) = launcher.launch(request)?;
//! tokio::spawn(async move {
//!     let exit = completion.wait().await;
//!     // remove the match entry, return the room to idle
//! });
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};

use lobbyforge_protocol::RoomId;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur launching a match.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The OS refused to start the process.
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every port up to 65535 has been handed out.
    #[error("no match ports left")]
    PortsExhausted,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// First port handed to a match unless configured otherwise.
pub const DEFAULT_FIRST_PORT: u16 = 44848;

/// How match processes are started.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Port given to the first match. Later matches count up from here.
    pub first_port: u16,
    /// Program used to run game programs (`python3` for `.py` packages).
    /// `None` executes the program file directly.
    pub interpreter: Option<PathBuf>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            first_port: DEFAULT_FIRST_PORT,
            interpreter: Some(PathBuf::from("python3")),
        }
    }
}

// ---------------------------------------------------------------------------
// PortAllocator
// ---------------------------------------------------------------------------

/// Hands out match ports in increasing order, each exactly once.
#[derive(Debug)]
pub struct PortAllocator {
    next: AtomicU32,
}

impl PortAllocator {
    pub fn new(first_port: u16) -> Self {
        Self {
            next: AtomicU32::new(u32::from(first_port)),
        }
    }

    /// Returns the next unused port.
    ///
    /// # Errors
    /// [`LaunchError::PortsExhausted`] once 65535 has been handed out.
    pub fn allocate(&self) -> Result<u16, LaunchError> {
        let limit = u32::from(u16::MAX);
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n <= limit).then_some(n + 1)
            })
            .ok()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or(LaunchError::PortsExhausted)
    }
}

// ---------------------------------------------------------------------------
// Launch request / result
// ---------------------------------------------------------------------------

/// What to run for one match.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub room_id: RoomId,
    /// The game version's install directory. Also the working directory.
    pub install_dir: PathBuf,
    /// Server program file name, relative to `install_dir`.
    pub program: String,
    /// Number of players the server should wait for.
    pub players: usize,
}

/// A match process that was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningMatch {
    pub room_id: RoomId,
    pub port: u16,
    /// OS process id, if the process had not already exited when asked.
    pub pid: Option<u32>,
}

/// How a match process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchExit {
    /// The process exited. `code` is `None` if it was killed by a signal.
    Exited { code: Option<i32> },
    /// Waiting on the process failed, so its fate is unknown.
    Lost(String),
}

impl MatchExit {
    pub fn is_success(&self) -> bool {
        matches!(self, MatchExit::Exited { code: Some(0) })
    }
}

/// Resolves once the match process exits.
#[derive(Debug)]
pub struct MatchCompletion {
    rx: oneshot::Receiver<MatchExit>,
}

impl MatchCompletion {
    /// Waits for the process to exit.
    pub async fn wait(self) -> MatchExit {
        self.rx.await.unwrap_or_else(|_| {
            MatchExit::Lost("process supervisor went away".into())
        })
    }
}

// ---------------------------------------------------------------------------
// MatchLauncher
// ---------------------------------------------------------------------------

/// Builds the command that runs `program` from `install_dir`.
///
/// With an interpreter: `<interpreter> <install_dir>/<program>`; without:
/// `<install_dir>/<program>`. The working directory is `install_dir`.
///
/// A relative `install_dir` is resolved against the current directory
/// first; the child would otherwise resolve it again from inside
/// `install_dir`.
pub fn program_command(
    interpreter: Option<&Path>,
    install_dir: &Path,
    program: &str,
) -> Command {
    let install_dir =
        std::path::absolute(install_dir).unwrap_or_else(|_| install_dir.to_path_buf());
    let program_path = install_dir.join(program);
    let mut cmd = match interpreter {
        Some(interpreter) => {
            let mut cmd = Command::new(interpreter);
            cmd.arg(&program_path);
            cmd
        }
        None => Command::new(&program_path),
    };
    cmd.current_dir(&install_dir);
    cmd
}

/// Starts match processes.
#[derive(Debug)]
pub struct MatchLauncher {
    config: LauncherConfig,
    ports: PortAllocator,
}

impl MatchLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        let ports = PortAllocator::new(config.first_port);
        Self { config, ports }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Allocates a port and spawns the game server on it.
    ///
    /// The process receives `<port> <players>` as positional arguments.
    /// Its stdout and stderr are forwarded line by line to the log. The
    /// returned [`MatchCompletion`] resolves when it exits, whatever the
    /// exit code.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`LaunchError::PortsExhausted`] or [`LaunchError::Spawn`]. A port
    /// taken by a failed spawn is not handed out again.
    pub fn launch(
        &self,
        request: LaunchRequest,
    ) -> Result<(RunningMatch, MatchCompletion), LaunchError> {
        let port = self.ports.allocate()?;
        let room_id = request.room_id;

        let mut cmd = program_command(
            self.config.interpreter.as_deref(),
            &request.install_dir,
            &request.program,
        );
        cmd.arg(port.to_string())
            .arg(request.players.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(%room_id, port, program = %request.program, "spawning match server");

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: request.install_dir.join(&request.program),
            source,
        })?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, room_id, port, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, room_id, port, "stderr"));
        }

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => MatchExit::Exited {
                    code: status.code(),
                },
                Err(e) => MatchExit::Lost(e.to_string()),
            };
            info!(%room_id, port, ?exit, "match server exited");
            // The receiver may already be gone; nobody to tell.
            let _ = tx.send(exit);
        });

        info!(%room_id, port, ?pid, players = request.players, "match server started");
        Ok((RunningMatch { room_id, port, pid }, MatchCompletion { rx }))
    }
}

/// Logs every line a match process writes to one of its pipes.
async fn forward_output<R>(pipe: R, room_id: RoomId, port: u16, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(%room_id, port, stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(%room_id, port, stream, error = %e, "reading match output failed");
                break;
            }
        }
    }
}
