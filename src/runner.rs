//! Command runner: external tool execution with checkpoint semantics.
//!
//! The contract mirrors a checkpointing pipeline manager: a command
//! sequence is skipped wholesale when its target marker already exists, so
//! re-invoking a build after an interruption is safe.

use crate::error::{GenoregError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Executes command sequences against a completion target.
pub trait CommandRunner {
    /// Run `commands` in order unless `target` already exists, in which
    /// case the whole sequence is skipped. When `container` is given,
    /// commands run inside that container.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on the first non-zero exit.
    fn run(&self, commands: &[String], target: &Path, container: Option<&str>) -> Result<()>;

    /// Run one command and capture its stdout.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` on non-zero exit.
    fn checkprint(&self, command: &str) -> Result<String>;

    /// Start a detached container from `image` with `volumes` bind-mounted,
    /// returning the container id.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if the container cannot be started.
    fn get_container(&self, image: &str, volumes: &[PathBuf]) -> Result<String>;

    /// Stop and remove a container started by
    /// [`CommandRunner::get_container`].
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if the container cannot be removed.
    fn remove_container(&self, container: &str) -> Result<()>;
}

/// Production runner: `sh -c` for each command, `docker exec` when a
/// container is in play. Blocking, sequential, no timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    fn execute(command: &str, container: Option<&str>) -> Result<()> {
        debug!(command, "running");
        let status = match container {
            Some(id) => Command::new("docker")
                .args(["exec", id, "/bin/sh", "-c", command])
                .status()?,
            None => Command::new("/bin/sh").args(["-c", command]).status()?,
        };
        if status.success() {
            Ok(())
        } else {
            Err(GenoregError::CommandFailed {
                command: command.to_string(),
                status: status.code().unwrap_or(-1),
            })
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, commands: &[String], target: &Path, container: Option<&str>) -> Result<()> {
        if target.exists() {
            info!(target = %target.display(), "target exists, skipping command sequence");
            return Ok(());
        }
        for command in commands {
            Self::execute(command, container)?;
        }
        Ok(())
    }

    fn checkprint(&self, command: &str) -> Result<String> {
        debug!(command, "running for output");
        let output = Command::new("/bin/sh").args(["-c", command]).output()?;
        if !output.status.success() {
            return Err(GenoregError::CommandFailed {
                command: command.to_string(),
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn get_container(&self, image: &str, volumes: &[PathBuf]) -> Result<String> {
        let mut command = String::from("docker run -itd");
        for volume in volumes {
            let v = volume.display();
            command.push_str(&format!(" -v {v}:{v}"));
        }
        command.push(' ');
        command.push_str(image);
        Ok(self.checkprint(&command)?.trim().to_string())
    }

    fn remove_container(&self, container: &str) -> Result<()> {
        Self::execute(&format!("docker rm -f {container}"), None)
    }
}
