use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use nightshift_scheduler::{Completion, TaskError, TaskUnit};

/// Unit of work backed by a shell command.
///
/// Non-empty stdout means new data, empty stdout means none, and a non-zero
/// exit is a failure. The child is killed if the scheduler abandons it.
#[derive(Debug, Clone)]
pub struct CommandTask {
    command: String,
}

impl CommandTask {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TaskUnit for CommandTask {
    async fn run(&self, completion: Completion) -> Result<(), TaskError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TaskError::Failed(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        debug!(command = %self.command, stdout_bytes = output.stdout.len(), "command finished");
        if output.stdout.iter().any(|b| !b.is_ascii_whitespace()) {
            completion.new_data();
        } else {
            completion.no_data();
        }
        Ok(())
    }
}
