//! AWS (Amazon Web Services) cloud provider.
//!
//! Implements the service traits on top of the official AWS SDK.
//!
//! ## Services
//!
//! - **STS** (Security Token Service) - `AssumeRole` for delegated credentials
//! - **EC2** (Elastic Compute Cloud) - instance lookup and EBS volume modification
//! - **SSM** (Systems Manager) - `AWS-RunShellScript` remote commands
//! - **SNS** (Simple Notification Service) - escalation topics
//!
//! ## Credentials
//!
//! [`Aws::from_env`] uses the default provider chain (the function's own
//! role). [`AwsConnector`] builds clients from delegated credentials for a
//! target account and region.

mod client;
mod models;

pub use client::{Aws, AwsConnector};
