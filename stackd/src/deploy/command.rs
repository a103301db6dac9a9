//! External command execution for the git and docker control paths

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} did not complete within {after:?}")]
    Timeout { program: String, after: Duration },
}

impl CommandError {
    /// The program could not be started at all
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, CommandError::Spawn { .. })
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Run `command` to completion, optionally feeding `stdin`, and fail on a non-zero exit.
/// The child is killed when the timeout elapses.
pub async fn run(
    mut command: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<String, CommandError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let execution = async {
        let mut child = command.spawn()?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            // closing stdin lets `--password-stdin` readers finish
            drop(pipe);
        }
        child.wait_with_output().await
    };

    let output = match tokio::time::timeout(timeout, execution).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(CommandError::Spawn { program, source }),
        Err(_) => {
            return Err(CommandError::Timeout {
                program,
                after: timeout,
            })
        }
    };

    if !output.status.success() {
        return Err(CommandError::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("{} completed ({} bytes of output)", program, stdout.len());
    Ok(stdout)
}
