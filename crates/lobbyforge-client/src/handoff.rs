//! Handing a player off to the downloaded game client.

use std::path::Path;
use std::process::ExitStatus;

use lobbyforge_launcher::program_command;
use lobbyforge_protocol::GameManifest;
use tracing::info;

use crate::ClientError;

/// Runs the manifest's client program from `install_dir` as
/// `[interpreter] <client_program> <host> <port>` and waits for it to exit.
///
/// Called after a `GAME_STARTING` push, with the push's `lobbyHost` and
/// `port`.
pub async fn launch_game_client(
    install_dir: &Path,
    manifest: &GameManifest,
    host: &str,
    port: u16,
    interpreter: Option<&Path>,
) -> Result<ExitStatus, ClientError> {
    let mut cmd = program_command(interpreter, install_dir, &manifest.client_program);
    cmd.arg(host).arg(port.to_string());

    info!(game = %manifest.game_ref(), host, port, "starting game client");
    let status = cmd.status().await.map_err(ClientError::Launch)?;
    info!(game = %manifest.game_ref(), ?status, "game client exited");
    Ok(status)
}
