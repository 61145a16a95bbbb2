//! Cloud provider abstractions.
//!
//! This module defines the common traits and types for cloud providers.

pub mod aws;
mod traits;

pub use traits::{
    AssumeRoleRequest, BlockDevice, CloudProviderError, CommandInvocation, CommandService,
    CommandStatus, ComputeService, Connector, Credentials, IdentityService, Instance,
    ModificationState, ScopedClients, TopicService, Volume, VolumeModification,
};

#[cfg(any(test, feature = "mocks"))]
pub use traits::{
    MockCommandService, MockComputeService, MockConnector, MockIdentityService, MockTopicService,
};

// Re-export provider clients
pub use aws::Aws;
