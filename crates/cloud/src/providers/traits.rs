//! Cloud service traits and common types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during cloud provider operations.
#[derive(Error, Debug)]
pub enum CloudProviderError {
    /// API returned an error response.
    #[error("API error in {operation}: {code} - {message}")]
    Api {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Authentication or authorization error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A response lacked a field the caller depends on.
    #[error("Malformed {operation} response: missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// ============================================================================
// Identity types
// ============================================================================

/// Request for delegated credentials in another account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// Role to assume.
    pub role_arn: String,
    /// Session name recorded by the identity service.
    pub session_name: String,
    /// Requested lifetime of the credentials.
    pub duration_secs: i32,
}

/// Short-lived credentials returned by a role delegation.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// When the credentials stop working.
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

// ============================================================================
// Compute types
// ============================================================================

/// A block device mapping on an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    /// Device name as exposed to the instance (e.g. `/dev/sdf`).
    pub device_name: String,
    /// Attached volume, absent for non-EBS devices.
    pub volume_id: Option<String>,
}

/// A compute instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Unique instance identifier.
    pub id: String,
    /// Attached block devices.
    pub block_devices: Vec<BlockDevice>,
}

/// A block storage volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Unique volume identifier.
    pub id: String,
    /// Current size in GiB.
    pub size_gib: i32,
}

/// Lifecycle of a volume modification as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationState {
    /// The change is being applied.
    Modifying,
    /// The new size is usable, performance is still being tuned.
    Optimizing,
    /// The change is fully applied.
    Completed,
    /// The change failed.
    Failed,
    /// Unknown state.
    #[serde(other)]
    Unknown,
}

impl ModificationState {
    /// Map the control plane's state label.
    #[must_use]
    pub fn from_api(value: &str) -> Self {
        match value {
            "modifying" => Self::Modifying,
            "optimizing" => Self::Optimizing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ModificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modifying => write!(f, "modifying"),
            Self::Optimizing => write!(f, "optimizing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A volume modification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeModification {
    pub volume_id: String,
    pub state: ModificationState,
    /// Size the modification is moving to, in GiB.
    pub target_size_gib: Option<i32>,
}

// ============================================================================
// Remote command types
// ============================================================================

/// Status of a remote command on one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Pending,
    InProgress,
    Delayed,
    Success,
    Cancelling,
    Cancelled,
    TimedOut,
    Failed,
    /// Unknown status.
    #[serde(other)]
    Unknown,
}

impl CommandStatus {
    /// Map the command service's status label.
    #[must_use]
    pub fn from_api(value: &str) -> Self {
        match value {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Delayed" => Self::Delayed,
            "Success" => Self::Success,
            "Cancelling" => Self::Cancelling,
            "Cancelled" => Self::Cancelled,
            "TimedOut" => Self::TimedOut,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether the command will not change status again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Cancelled | Self::TimedOut | Self::Failed
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Delayed => "Delayed",
            Self::Success => "Success",
            Self::Cancelling => "Cancelling",
            Self::Cancelled => "Cancelled",
            Self::TimedOut => "TimedOut",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Snapshot of a remote command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub command_id: String,
    pub instance_id: String,
    pub status: CommandStatus,
    /// Captured standard output so far.
    pub output: String,
}

// ============================================================================
// Service traits
// ============================================================================

/// Role delegation.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Exchange the caller's identity for credentials of another role.
    async fn assume_role(&self, req: AssumeRoleRequest)
        -> Result<Credentials, CloudProviderError>;
}

/// Instance and volume control plane.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Find instances whose `filter` attribute equals `address`.
    async fn find_instances(
        &self,
        filter: &str,
        address: &str,
    ) -> Result<Vec<Instance>, CloudProviderError>;

    /// Get a volume by ID.
    async fn get_volume(&self, volume_id: &str) -> Result<Volume, CloudProviderError>;

    /// Request a new size for a volume.
    async fn modify_volume_size(
        &self,
        volume_id: &str,
        size_gib: i32,
    ) -> Result<(), CloudProviderError>;

    /// List modifications of a volume towards `target_size_gib`.
    async fn volume_modifications(
        &self,
        volume_id: &str,
        target_size_gib: i32,
    ) -> Result<Vec<VolumeModification>, CloudProviderError>;
}

/// Remote shell command execution.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait CommandService: Send + Sync {
    /// Dispatch a shell command, returning the command ID.
    async fn send_shell_command(
        &self,
        instance_id: &str,
        command: &str,
    ) -> Result<String, CloudProviderError>;

    /// Get the current state of a dispatched command.
    async fn get_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<CommandInvocation, CloudProviderError>;
}

/// Fan-out notification topic.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TopicService: Send + Sync {
    /// Publish a message, returning the message ID.
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        message: &str,
    ) -> Result<String, CloudProviderError>;
}

/// Compute and command clients bound to one set of delegated credentials.
#[derive(Clone)]
pub struct ScopedClients {
    pub compute: Arc<dyn ComputeService>,
    pub commands: Arc<dyn CommandService>,
}

/// Builds [`ScopedClients`] from delegated credentials.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<ScopedClients, CloudProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modification_state_mapping() {
        assert_eq!(
            ModificationState::from_api("modifying"),
            ModificationState::Modifying
        );
        assert_eq!(
            ModificationState::from_api("optimizing"),
            ModificationState::Optimizing
        );
        assert_eq!(
            ModificationState::from_api("completed"),
            ModificationState::Completed
        );
        assert_eq!(ModificationState::from_api("failed"), ModificationState::Failed);
        assert_eq!(ModificationState::from_api("bogus"), ModificationState::Unknown);
    }

    #[test]
    fn test_command_status_terminal() {
        for status in ["Pending", "InProgress", "Delayed", "Cancelling"] {
            assert!(!CommandStatus::from_api(status).is_terminal(), "{status}");
        }
        for status in ["Success", "Cancelled", "TimedOut", "Failed"] {
            assert!(CommandStatus::from_api(status).is_terminal(), "{status}");
        }
        assert_eq!(CommandStatus::from_api("InProgress").to_string(), "InProgress");
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "very-secret".to_string(),
            session_token: "token-value".to_string(),
            expiration: Utc::now(),
        };

        let debug = format!("{creds:?}");
        assert!(debug.contains("ASIAEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token-value"));
    }
}
