//! Delegated identity for the alerting account.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloud::{AssumeRoleRequest, CloudProviderError, Credentials, IdentityService};
use tracing::{debug, warn};

use crate::alert::RemediationRequest;
use crate::config::RemediationConfig;
use crate::error::{RemediationError, Result};

/// Short-lived credentials for one invocation. Never cached.
#[derive(Debug, Clone)]
pub struct DelegatedSession {
    pub credentials: Credentials,
    /// Region code, e.g. `us-east-1`.
    pub region: String,
    pub account_id: String,
}

impl DelegatedSession {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.credentials.expiration
    }

    /// Fail with `SessionExpired` once the credentials have run out.
    pub fn ensure_valid(&self, now: DateTime<Utc>) -> Result<()> {
        if now >= self.expires_at() {
            return Err(RemediationError::SessionExpired {
                expired_at: self.expires_at(),
            });
        }
        Ok(())
    }
}

/// Exchanges an account key for delegated credentials.
pub struct IdentityBroker {
    identity: Arc<dyn IdentityService>,
    config: Arc<RemediationConfig>,
}

impl IdentityBroker {
    pub fn new(identity: Arc<dyn IdentityService>, config: Arc<RemediationConfig>) -> Self {
        Self { identity, config }
    }

    /// Assume the remediation role in the request's account.
    pub async fn delegate(&self, request: &RemediationRequest) -> Result<DelegatedSession> {
        let account_id = self
            .config
            .account_id(&request.account_key)
            .ok_or_else(|| {
                RemediationError::IdentityDenied(format!(
                    "unknown account {}",
                    request.account_key
                ))
            })?
            .to_string();
        let region = self
            .config
            .region_code(&request.region)
            .ok_or_else(|| {
                RemediationError::IdentityDenied(format!("unknown region {}", request.region))
            })?
            .to_string();

        let role_arn = self.config.role_arn(&account_id);
        debug!(role_arn = %role_arn, region = %region, "Assuming delegated role");

        let credentials = self
            .identity
            .assume_role(AssumeRoleRequest {
                role_arn: role_arn.clone(),
                session_name: self.config.role_name.clone(),
                duration_secs: self.config.session_duration_secs,
            })
            .await
            .map_err(|e| {
                warn!(role_arn = %role_arn, error = %e, "Role delegation rejected");
                match e {
                    CloudProviderError::Auth(msg) => RemediationError::IdentityDenied(msg),
                    other => RemediationError::IdentityDenied(other.to_string()),
                }
            })?;

        Ok(DelegatedSession {
            credentials,
            region,
            account_id,
        })
    }
}
