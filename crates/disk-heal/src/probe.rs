//! Disk usage measurement on the instance.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::command::{CommandResult, RemoteCommand};
use crate::error::{RemediationError, Result};

static FIRST_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// One usage reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSample {
    /// Used space, 0-100.
    pub percentage: u8,
    pub taken_at: DateTime<Utc>,
}

/// Reads the usage percentage of a device with `df`.
pub struct UsageProbe {
    runner: RemoteCommand,
}

impl UsageProbe {
    pub fn new(runner: RemoteCommand) -> Self {
        Self { runner }
    }

    pub async fn measure(&self, instance_id: &str, device: &str) -> Result<UsageSample> {
        let command = format!("df --output=pcent -h {device} | tail -n 1");

        match self.runner.run(instance_id, &command).await? {
            CommandResult::Succeeded(invocation) => Ok(UsageSample {
                percentage: parse_usage(&invocation.output)?,
                taken_at: Utc::now(),
            }),
            CommandResult::Unfinished { command_id, status } => {
                Err(RemediationError::ProbeTimeout {
                    instance_id: instance_id.to_string(),
                    command_id,
                    status,
                    timeout: self.runner.policy().timeout,
                })
            }
        }
    }
}

/// First integer in `df` output, e.g. ` 92%` gives 92.
pub fn parse_usage(output: &str) -> Result<u8> {
    FIRST_INTEGER
        .find(output)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| RemediationError::ProbeOutputUnparseable {
            output: output.to_string(),
        })
}
