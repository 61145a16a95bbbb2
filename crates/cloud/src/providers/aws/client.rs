//! AWS SDK client implementation.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ec2::types::Filter;
use tracing::{debug, info, warn};

use super::models::{to_credentials, to_instance, to_invocation, to_modification, to_volume};
use crate::providers::traits::{
    AssumeRoleRequest, CloudProviderError, CommandInvocation, CommandService, CommandStatus,
    ComputeService, Connector, Credentials, IdentityService, Instance, ScopedClients,
    TopicService, Volume, VolumeModification,
};

/// SSM document used for shell commands.
const RUN_SHELL_DOCUMENT: &str = "AWS-RunShellScript";

/// Provider name attached to delegated credentials.
const DELEGATED_PROVIDER_NAME: &str = "disk-heal-delegated";

/// SSM error code returned while an invocation is not yet registered.
const INVOCATION_NOT_REGISTERED: &str = "InvocationDoesNotExist";

/// AWS cloud provider.
#[derive(Clone, Debug)]
pub struct Aws {
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
    sts: aws_sdk_sts::Client,
    sns: aws_sdk_sns::Client,
}

impl Aws {
    /// Create a provider using the default credential chain and region.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::from_config(&config)
    }

    /// Create a provider bound to delegated credentials in `region`.
    pub async fn with_credentials(credentials: &Credentials, region: &str) -> Self {
        let provider = aws_credential_types::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            Some(SystemTime::from(credentials.expiration)),
            DELEGATED_PROVIDER_NAME,
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(provider)
            .load()
            .await;

        Self::from_config(&config)
    }

    /// Create a provider from an already loaded SDK configuration.
    #[must_use]
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            ec2: aws_sdk_ec2::Client::new(config),
            ssm: aws_sdk_ssm::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
            sns: aws_sdk_sns::Client::new(config),
        }
    }
}

/// Map an SDK error onto [`CloudProviderError`] using its error code.
fn sdk_error<E>(operation: &'static str, err: &E) -> CloudProviderError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(err).to_string(), ToString::to_string);

    warn!(operation, code = %code, message = %message, "AWS request failed");

    if code.ends_with("NotFound") {
        CloudProviderError::NotFound(format!("{operation}: {message}"))
    } else if matches!(
        code.as_str(),
        "AccessDenied" | "UnauthorizedOperation" | "AuthFailure" | "ExpiredToken"
            | "InvalidClientTokenId"
    ) {
        CloudProviderError::Auth(format!("{operation}: {message}"))
    } else {
        CloudProviderError::Api {
            operation,
            code,
            message,
        }
    }
}

fn filter(name: &str, value: impl Into<String>) -> Filter {
    Filter::builder().name(name).values(value).build()
}

#[async_trait]
impl IdentityService for Aws {
    async fn assume_role(
        &self,
        req: AssumeRoleRequest,
    ) -> Result<Credentials, CloudProviderError> {
        info!(
            role_arn = %req.role_arn,
            duration_secs = req.duration_secs,
            "Assuming role"
        );

        let response = self
            .sts
            .assume_role()
            .role_arn(&req.role_arn)
            .role_session_name(&req.session_name)
            .duration_seconds(req.duration_secs)
            .send()
            .await
            .map_err(|e| sdk_error("AssumeRole", &e))?;

        let credentials = response
            .credentials()
            .ok_or(CloudProviderError::MissingField {
                operation: "AssumeRole",
                field: "Credentials",
            })?;

        to_credentials(credentials)
    }
}

#[async_trait]
impl ComputeService for Aws {
    async fn find_instances(
        &self,
        filter_name: &str,
        address: &str,
    ) -> Result<Vec<Instance>, CloudProviderError> {
        debug!(filter = filter_name, address, "Describing instances");

        let response = self
            .ec2
            .describe_instances()
            .filters(filter(filter_name, address))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeInstances", &e))?;

        Ok(response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .filter_map(to_instance)
            .collect())
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume, CloudProviderError> {
        let response = self
            .ec2
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .map_err(|e| sdk_error("DescribeVolumes", &e))?;

        match response.volumes() {
            [volume] => to_volume(volume),
            [] => Err(CloudProviderError::NotFound(format!(
                "Volume not found: {volume_id}"
            ))),
            volumes => Err(CloudProviderError::Api {
                operation: "DescribeVolumes",
                code: "UnexpectedCardinality".to_string(),
                message: format!("{} volumes returned for {volume_id}", volumes.len()),
            }),
        }
    }

    async fn modify_volume_size(
        &self,
        volume_id: &str,
        size_gib: i32,
    ) -> Result<(), CloudProviderError> {
        info!(volume_id, size_gib, "Modifying EBS volume");

        let response = self
            .ec2
            .modify_volume()
            .volume_id(volume_id)
            .size(size_gib)
            .send()
            .await
            .map_err(|e| sdk_error("ModifyVolume", &e))?;

        if let Some(modification) = response.volume_modification() {
            debug!(
                volume_id,
                state = ?modification.modification_state(),
                "Volume modification accepted"
            );
        }

        Ok(())
    }

    async fn volume_modifications(
        &self,
        volume_id: &str,
        target_size_gib: i32,
    ) -> Result<Vec<VolumeModification>, CloudProviderError> {
        let response = self
            .ec2
            .describe_volumes_modifications()
            .filters(filter("volume-id", volume_id))
            .filters(filter("target-size", target_size_gib.to_string()))
            .send()
            .await
            .map_err(|e| sdk_error("DescribeVolumesModifications", &e))?;

        Ok(response
            .volumes_modifications()
            .iter()
            .map(to_modification)
            .collect())
    }
}

#[async_trait]
impl CommandService for Aws {
    async fn send_shell_command(
        &self,
        instance_id: &str,
        command: &str,
    ) -> Result<String, CloudProviderError> {
        debug!(instance_id, command, "Sending shell command");

        let response = self
            .ssm
            .send_command()
            .document_name(RUN_SHELL_DOCUMENT)
            .instance_ids(instance_id)
            .parameters("commands", vec![command.to_string()])
            .send()
            .await
            .map_err(|e| sdk_error("SendCommand", &e))?;

        response
            .command()
            .and_then(|c| c.command_id())
            .map(ToString::to_string)
            .ok_or(CloudProviderError::MissingField {
                operation: "SendCommand",
                field: "CommandId",
            })
    }

    async fn get_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<CommandInvocation, CloudProviderError> {
        let result = self
            .ssm
            .get_command_invocation()
            .command_id(command_id)
            .instance_id(instance_id)
            .send()
            .await;

        match result {
            Ok(output) => Ok(to_invocation(command_id, instance_id, &output)),
            // The invocation shows up shortly after dispatch.
            Err(e) if e.code() == Some(INVOCATION_NOT_REGISTERED) => Ok(CommandInvocation {
                command_id: command_id.to_string(),
                instance_id: instance_id.to_string(),
                status: CommandStatus::Pending,
                output: String::new(),
            }),
            Err(e) => Err(sdk_error("GetCommandInvocation", &e)),
        }
    }
}

#[async_trait]
impl TopicService for Aws {
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        message: &str,
    ) -> Result<String, CloudProviderError> {
        let response = self
            .sns
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| sdk_error("Publish", &e))?;

        Ok(response.message_id().unwrap_or_default().to_string())
    }
}

/// Builds AWS clients from delegated credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsConnector;

#[async_trait]
impl Connector for AwsConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<ScopedClients, CloudProviderError> {
        if region.is_empty() {
            return Err(CloudProviderError::Config(
                "region is required for delegated clients".to_string(),
            ));
        }

        let aws = Arc::new(Aws::with_credentials(credentials, region).await);
        Ok(ScopedClients {
            compute: aws.clone(),
            commands: aws,
        })
    }
}
