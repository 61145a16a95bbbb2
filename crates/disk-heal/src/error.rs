//! Error taxonomy for a remediation invocation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use cloud::{CloudProviderError, CommandStatus, ModificationState};
use thiserror::Error;

/// Errors that end (or, for notifications, annotate) a remediation.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// The alert did not carry the fields needed to act on it.
    #[error("malformed alert: {0}")]
    MalformedAlert(String),

    /// Delegated credentials could not be obtained.
    #[error("identity denied: {0}")]
    IdentityDenied(String),

    /// No instance has the alerting address.
    #[error("no instance found with address {address}")]
    InstanceNotFound { address: String },

    /// A lookup that must match exactly one resource matched several.
    #[error("{count} {kind} matched {key}, expected exactly one")]
    AmbiguousMatch {
        kind: &'static str,
        key: String,
        count: usize,
    },

    /// The configured device is not attached to the instance.
    #[error("device {device} is not attached to instance {instance_id}")]
    DeviceNotAttached { instance_id: String, device: String },

    /// The usage probe did not succeed in time.
    #[error("disk usage probe {command_id} on {instance_id} not done in {timeout:?}: {status}")]
    ProbeTimeout {
        instance_id: String,
        command_id: String,
        status: CommandStatus,
        timeout: Duration,
    },

    /// The usage probe output had no usable percentage.
    #[error("could not read a usage percentage from probe output {output:?}")]
    ProbeOutputUnparseable { output: String },

    /// The capacity change was refused, or its target is not a valid size.
    #[error(
        "resizing {volume_id} from {current_size_gib}GB by {increase_gib}GB rejected: {reason}"
    )]
    ResizeRejected {
        volume_id: String,
        current_size_gib: i32,
        increase_gib: u32,
        reason: String,
    },

    /// The capacity change did not apply within the poll bound.
    #[error("resize of volume {volume_id} still {state} after {waited:?}")]
    ResizeTimeout {
        volume_id: String,
        state: ModificationState,
        waited: Duration,
    },

    /// The filesystem extension did not succeed in time.
    #[error("filesystem grow {command_id} on {instance_id} not done in {timeout:?}: {status}")]
    GrowTimeout {
        instance_id: String,
        command_id: String,
        status: CommandStatus,
        timeout: Duration,
    },

    /// The delegated session ran out before the invocation finished.
    #[error("delegated session expired at {expired_at}")]
    SessionExpired { expired_at: DateTime<Utc> },

    /// Any other cloud failure.
    #[error("cloud request failed: {0}")]
    Cloud(#[from] CloudProviderError),

    /// Chat or escalation delivery failed. Never fatal.
    #[error("notification failed: {0}")]
    NotificationFailure(String),
}

impl RemediationError {
    /// Short stable name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedAlert(_) => "MalformedAlert",
            Self::IdentityDenied(_) => "IdentityDenied",
            Self::InstanceNotFound { .. } => "InstanceNotFound",
            Self::AmbiguousMatch { .. } => "AmbiguousMatch",
            Self::DeviceNotAttached { .. } => "DeviceNotAttached",
            Self::ProbeTimeout { .. } => "ProbeTimeout",
            Self::ProbeOutputUnparseable { .. } => "ProbeOutputUnparseable",
            Self::ResizeRejected { .. } => "ResizeRejected",
            Self::ResizeTimeout { .. } => "ResizeTimeout",
            Self::GrowTimeout { .. } => "GrowTimeout",
            Self::SessionExpired { .. } => "SessionExpired",
            Self::Cloud(_) => "Cloud",
            Self::NotificationFailure(_) => "NotificationFailure",
        }
    }
}

/// Result alias for remediation steps.
pub type Result<T, E = RemediationError> = std::result::Result<T, E>;
