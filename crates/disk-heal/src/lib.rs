//! Automated remediation of low disk space alerts.
//!
//! An alert names an instance address and a device. The [`workflow::Remediator`]
//! assumes a role in the instance's account, finds the volume behind the
//! device, measures usage and, when it is at or above the threshold, grows the
//! volume and then the filesystem. Progress goes to a chat thread; failures
//! and residual breaches go to an escalation topic.
//!
//! # Modules
//!
//! - [`alert`] - webhook payload and request extraction
//! - [`identity`] - delegated credentials
//! - [`locator`] - instance and volume lookup
//! - [`command`] - remote command dispatch and polling
//! - [`probe`] - disk usage measurement
//! - [`expander`] - volume capacity increase
//! - [`grower`] - filesystem extension
//! - [`reporter`] - chat thread and escalations
//! - [`workflow`] - the state machine tying it together
//! - [`server`] - HTTP trigger

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod command;
pub mod config;
pub mod error;
pub mod expander;
pub mod grower;
pub mod identity;
pub mod locator;
pub mod probe;
pub mod reporter;
pub mod server;
pub mod workflow;

pub use config::{PollPolicy, RemediationConfig};
pub use error::RemediationError;
pub use workflow::{InvocationReport, InvocationState, Outcome, Remediator};
