//! Conversions from AWS SDK shapes to provider-neutral types.

use aws_sdk_ec2::types as ec2;
use chrono::{DateTime, Utc};

use crate::providers::traits::{
    BlockDevice, CloudProviderError, CommandInvocation, CommandStatus, Credentials, Instance,
    ModificationState, Volume, VolumeModification,
};

/// Convert an EC2 instance. Instances without an ID are skipped.
pub(super) fn to_instance(instance: &ec2::Instance) -> Option<Instance> {
    let id = instance.instance_id()?.to_string();

    let block_devices = instance
        .block_device_mappings()
        .iter()
        .filter_map(|mapping| {
            Some(BlockDevice {
                device_name: mapping.device_name()?.to_string(),
                volume_id: mapping
                    .ebs()
                    .and_then(|ebs| ebs.volume_id())
                    .map(ToString::to_string),
            })
        })
        .collect();

    Some(Instance { id, block_devices })
}

/// Convert an EBS volume.
pub(super) fn to_volume(volume: &ec2::Volume) -> Result<Volume, CloudProviderError> {
    let id = volume.volume_id().ok_or(CloudProviderError::MissingField {
        operation: "DescribeVolumes",
        field: "VolumeId",
    })?;
    let size_gib = volume.size().ok_or(CloudProviderError::MissingField {
        operation: "DescribeVolumes",
        field: "Size",
    })?;

    Ok(Volume {
        id: id.to_string(),
        size_gib,
    })
}

/// Convert an EBS volume modification.
pub(super) fn to_modification(modification: &ec2::VolumeModification) -> VolumeModification {
    VolumeModification {
        volume_id: modification.volume_id().unwrap_or_default().to_string(),
        state: modification
            .modification_state()
            .map_or(ModificationState::Unknown, |s| {
                ModificationState::from_api(s.as_str())
            }),
        target_size_gib: modification.target_size(),
    }
}

/// Convert an SSM command invocation.
pub(super) fn to_invocation(
    command_id: &str,
    instance_id: &str,
    output: &aws_sdk_ssm::operation::get_command_invocation::GetCommandInvocationOutput,
) -> CommandInvocation {
    CommandInvocation {
        command_id: command_id.to_string(),
        instance_id: instance_id.to_string(),
        status: output
            .status()
            .map_or(CommandStatus::Unknown, |s| CommandStatus::from_api(s.as_str())),
        output: output
            .standard_output_content()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Convert STS credentials.
pub(super) fn to_credentials(
    credentials: &aws_sdk_sts::types::Credentials,
) -> Result<Credentials, CloudProviderError> {
    let expiration = credentials.expiration();
    let expiration: DateTime<Utc> =
        DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos()).ok_or(
            CloudProviderError::MissingField {
                operation: "AssumeRole",
                field: "Expiration",
            },
        )?;

    Ok(Credentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration,
    })
}
