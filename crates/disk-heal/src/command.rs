//! Dispatch a shell command on an instance and wait for it to finish.

use std::sync::Arc;

use cloud::{CommandInvocation, CommandService, CommandStatus};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::PollPolicy;
use crate::error::Result;

/// How a remote command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The command reported `Success`.
    Succeeded(CommandInvocation),
    /// The command failed or the poll ran out of time.
    Unfinished {
        command_id: String,
        status: CommandStatus,
    },
}

/// Runs one command per call and polls it with a [`PollPolicy`].
pub struct RemoteCommand {
    commands: Arc<dyn CommandService>,
    policy: PollPolicy,
}

impl RemoteCommand {
    pub fn new(commands: Arc<dyn CommandService>, policy: PollPolicy) -> Self {
        Self { commands, policy }
    }

    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Dispatch `command` and wait for a terminal status.
    ///
    /// Stops early on a terminal non-success status. No status read happens
    /// after the timeout has passed.
    pub async fn run(&self, instance_id: &str, command: &str) -> Result<CommandResult> {
        let started = Instant::now();
        let command_id = self
            .commands
            .send_shell_command(instance_id, command)
            .await?;

        debug!(
            instance_id = %instance_id,
            command_id = %command_id,
            command = %command,
            "Dispatched remote command"
        );

        sleep(self.policy.initial_delay).await;

        loop {
            let invocation = self.commands.get_invocation(&command_id, instance_id).await?;
            let status = invocation.status;

            if status == CommandStatus::Success {
                return Ok(CommandResult::Succeeded(invocation));
            }
            if status.is_terminal() {
                warn!(
                    instance_id = %instance_id,
                    command_id = %command_id,
                    status = %status,
                    "Remote command did not succeed"
                );
                return Ok(CommandResult::Unfinished { command_id, status });
            }
            if started.elapsed() + self.policy.interval > self.policy.timeout {
                warn!(
                    instance_id = %instance_id,
                    command_id = %command_id,
                    status = %status,
                    "Remote command timed out"
                );
                return Ok(CommandResult::Unfinished { command_id, status });
            }

            debug!(command_id = %command_id, status = %status, "Waiting for remote command");
            sleep(self.policy.interval).await;
        }
    }
}
