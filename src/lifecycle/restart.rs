//! In-place restart.
//!
//! Re-executes the current binary with the same arguments, environment and
//! working directory, then waits for it. Connections and sessions of the old
//! instance are not handed over.

use std::env;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RestartError {
    #[error("cannot locate current executable: {0}")]
    Executable(std::io::Error),

    #[error("failed to spawn new instance: {0}")]
    Spawn(std::io::Error),

    #[error("failed waiting for new instance: {0}")]
    Wait(std::io::Error),
}

/// Start a fresh copy of this process and wait for it to exit.
pub async fn respawn() -> Result<ExitStatus, RestartError> {
    let executable = env::current_exe().map_err(RestartError::Executable)?;
    let mut command = Command::new(&executable);
    command
        .args(env::args_os().skip(1))
        .envs(env::vars_os())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Ok(dir) = env::current_dir() {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(RestartError::Spawn)?;
    tracing::info!(
        executable = %executable.display(),
        pid = child.id().unwrap_or_default(),
        "New instance started"
    );

    child.wait().await.map_err(RestartError::Wait)
}
