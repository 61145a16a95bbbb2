//! Remediation events and their chat rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How urgently an undelivered event needs a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress report; losing it is tolerable.
    Info,
    /// The remediation failed; an operator must look.
    Critical,
}

/// Events posted to chat during one remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationEvent {
    /// Remediation is starting; opens the thread.
    Started {
        account: String,
        region: String,
        instance_id: String,
        usage_percent: u8,
        increase_gib: u32,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// Volume and filesystem were grown.
    Succeeded {
        new_size_gib: i32,
        usage_percent: u8,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// Remediation stopped on an error.
    Failed {
        reason: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl RemediationEvent {
    /// Get a short title for this event type.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Started { .. } => "EBS volume increase started",
            Self::Succeeded { .. } => "EBS volume increase succeeded",
            Self::Failed { .. } => "EBS volume increase failed",
        }
    }

    /// Get the severity for this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Started { .. } | Self::Succeeded { .. } => Severity::Info,
            Self::Failed { .. } => Severity::Critical,
        }
    }

    /// Render the chat message body.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Started {
                account,
                region,
                instance_id,
                usage_percent,
                increase_gib,
                ..
            } => format!(
                "Automated EBS volume increase and file system resize was started :progress:\n\n\
                 Account: {account}\n\
                 Region: {region}\n\
                 InstanceId: {instance_id}\n\
                 Current disk usage: {usage_percent}%\n\
                 Size increase: {increase_gib}GB"
            ),

            Self::Succeeded {
                new_size_gib,
                usage_percent,
                ..
            } => format!(
                "Increase SUCCESSFUL :white_check_mark:\n\n\
                 New disk size: {new_size_gib}GB\n\
                 New disk usage: {usage_percent}%"
            ),

            Self::Failed { reason, .. } => format!(
                "Increase FAILED :no_entry: {reason}\n\
                 Check the remediation logs for more details."
            ),
        }
    }
}
