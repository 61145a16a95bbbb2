//! Filesystem extension after the volume has grown.

use crate::command::{CommandResult, RemoteCommand};
use crate::error::{RemediationError, Result};

/// Extends an ext filesystem to fill its device.
pub struct FilesystemGrower {
    runner: RemoteCommand,
}

impl FilesystemGrower {
    pub fn new(runner: RemoteCommand) -> Self {
        Self { runner }
    }

    pub async fn grow(&self, instance_id: &str, device: &str) -> Result<()> {
        let command = format!("sudo resize2fs {device}");

        match self.runner.run(instance_id, &command).await? {
            CommandResult::Succeeded(_) => Ok(()),
            CommandResult::Unfinished { command_id, status } => {
                Err(RemediationError::GrowTimeout {
                    instance_id: instance_id.to_string(),
                    command_id,
                    status,
                    timeout: self.runner.policy().timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollPolicy;
    use cloud::{CommandInvocation, CommandStatus, MockCommandService};
    use std::sync::Arc;

    fn grower(status: CommandStatus) -> FilesystemGrower {
        let mut commands = MockCommandService::new();
        commands
            .expect_send_shell_command()
            .withf(|_, command| command == "sudo resize2fs /dev/sdf")
            .times(1)
            .returning(|_, _| Ok("cmd-grow".to_string()));
        commands
            .expect_get_invocation()
            .returning(move |command_id, instance_id| {
                Ok(CommandInvocation {
                    command_id: command_id.to_string(),
                    instance_id: instance_id.to_string(),
                    status,
                    output: String::new(),
                })
            });
        FilesystemGrower::new(RemoteCommand::new(Arc::new(commands), PollPolicy::command()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_grow_succeeds() {
        grower(CommandStatus::Success)
            .grow("i-0abc", "/dev/sdf")
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_grow_times_out() {
        let err = grower(CommandStatus::InProgress)
            .grow("i-0abc", "/dev/sdf")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RemediationError::GrowTimeout { ref command_id, .. } if command_id == "cmd-grow"
        ));
    }
}
