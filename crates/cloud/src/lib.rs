//! Cloud collaborators for automated disk remediation.
//!
//! The remediation workflow talks to four external services, each behind a
//! trait so it can be substituted in tests:
//!
//! - **Identity** - role delegation for short-lived credentials ([`IdentityService`])
//! - **Compute** - instance and volume lookups, volume modification ([`ComputeService`])
//! - **Commands** - remote shell commands on an instance ([`CommandService`])
//! - **Topics** - fan-out escalation messages ([`TopicService`])
//!
//! ## Providers
//!
//! - **AWS** - STS, EC2, SSM and SNS through the official SDK ([`aws::Aws`])
//!
//! Per-account clients are built by a [`Connector`] from delegated
//! [`Credentials`], so nothing credential-bearing outlives one invocation.

pub mod providers;

pub use providers::{
    aws, AssumeRoleRequest, BlockDevice, CloudProviderError, CommandInvocation, CommandService,
    CommandStatus, ComputeService, Connector, Credentials, IdentityService, Instance,
    ModificationState, ScopedClients, TopicService, Volume, VolumeModification,
};

#[cfg(any(test, feature = "mocks"))]
pub use providers::{
    MockCommandService, MockComputeService, MockConnector, MockIdentityService, MockTopicService,
};
