//! Configuration for disk remediation.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};

/// Default alert name that triggers remediation.
pub const DEFAULT_EXPECTED_ALERT_NAME: &str = "Disk Usage";

/// Default account key table.
pub const DEFAULT_ACCOUNT_IDS: &str =
    "account1=111111111111,account2=222222222222,account3=333333333333";

/// Default region shorthand table.
pub const DEFAULT_REGION_CODES: &str = "us=us-east-1,eu=eu-west-1,ap=ap-southeast-1";

/// Default role assumed in the target account.
pub const DEFAULT_ROLE_NAME: &str = "EBSDiskManagement";

/// Default EC2 filter used to find the alerting instance.
pub const DEFAULT_ADDRESS_FILTER: &str = "ip-address";

/// Default bound on the volume modification poll.
pub const DEFAULT_RESIZE_TIMEOUT_SECS: u64 = 600;

/// Lifetime of delegated credentials.
pub const SESSION_DURATION_SECS: i32 = 900;

/// How a polling loop waits for a remote state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before the first status read.
    pub initial_delay: Duration,
    /// Wait between status reads.
    pub interval: Duration,
    /// Give up once this much time has passed since dispatch.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Remote command polling: 1s settle, every 2s, 10s bound.
    #[must_use]
    pub const fn command() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
        }
    }

    /// Volume modification polling: every 5s up to `timeout`.
    #[must_use]
    pub const fn resize(timeout: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            interval: Duration::from_secs(5),
            timeout,
        }
    }
}

/// Static configuration shared by every invocation.
#[derive(Debug, Clone)]
pub struct RemediationConfig {
    /// Alert name that triggers remediation (exact match).
    pub expected_alert_name: String,
    /// Account key to account ID.
    pub accounts: BTreeMap<String, String>,
    /// Region shorthand to region code.
    pub regions: BTreeMap<String, String>,
    /// Role assumed in the target account; also the session name.
    pub role_name: String,
    pub session_duration_secs: i32,
    /// Block device mapping name to resize.
    pub target_device: String,
    /// EC2 filter matched against the instance address.
    pub address_filter: String,
    /// Remediate when usage is at or above this percentage.
    pub threshold_percent: u8,
    /// Size increase in GiB.
    pub increase_gib: u32,
    /// Chat channel ID.
    pub chat_channel: String,
    /// Topic escalations are published to.
    pub escalation_topic_arn: String,
    pub command_poll: PollPolicy,
    pub resize_poll: PollPolicy,
    /// Pause between the filesystem grow and the second usage probe.
    pub settle_delay: Duration,
}

impl RemediationConfig {
    /// Create configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `TARGET_DEVICE_NAME`: device mapping to resize, e.g. `/dev/sdf`
    /// - `USAGE_THRESHOLD_PERCENT`: inclusive threshold, 1-100
    /// - `VOLUME_INCREASE_GB`: size increase in GiB
    /// - `SLACK_CHANNEL`: chat channel ID
    /// - `ESCALATION_TOPIC_ARN`: SNS topic for escalations
    ///
    /// # Optional Environment Variables
    /// - `EXPECTED_ALERT_NAME` (default: `Disk Usage`)
    /// - `ACCOUNT_IDS` (default: three sample accounts)
    /// - `REGION_CODES` (default: `us`, `eu`, `ap`)
    /// - `DELEGATED_ROLE_NAME` (default: `EBSDiskManagement`)
    /// - `INSTANCE_ADDRESS_FILTER` (default: `ip-address`)
    /// - `RESIZE_TIMEOUT_SECS` (default: 600)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} environment variable not set"))
        };
        let optional =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let threshold_percent = required("USAGE_THRESHOLD_PERCENT")?
            .trim()
            .parse()
            .context("USAGE_THRESHOLD_PERCENT must be an integer percentage")?;

        let increase_gib = required("VOLUME_INCREASE_GB")?
            .trim()
            .parse()
            .context("VOLUME_INCREASE_GB must be a whole number of GiB")?;

        let resize_timeout_secs = match lookup("RESIZE_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse()
                .context("RESIZE_TIMEOUT_SECS must be a number of seconds")?,
            None => DEFAULT_RESIZE_TIMEOUT_SECS,
        };

        let accounts = parse_table(&optional("ACCOUNT_IDS", DEFAULT_ACCOUNT_IDS))
            .context("invalid ACCOUNT_IDS")?;
        let regions = parse_table(&optional("REGION_CODES", DEFAULT_REGION_CODES))
            .context("invalid REGION_CODES")?;

        let config = Self {
            expected_alert_name: optional("EXPECTED_ALERT_NAME", DEFAULT_EXPECTED_ALERT_NAME),
            accounts,
            regions,
            role_name: optional("DELEGATED_ROLE_NAME", DEFAULT_ROLE_NAME),
            session_duration_secs: SESSION_DURATION_SECS,
            target_device: required("TARGET_DEVICE_NAME")?,
            address_filter: optional("INSTANCE_ADDRESS_FILTER", DEFAULT_ADDRESS_FILTER),
            threshold_percent,
            increase_gib,
            chat_channel: required("SLACK_CHANNEL")?,
            escalation_topic_arn: required("ESCALATION_TOPIC_ARN")?,
            command_poll: PollPolicy::command(),
            resize_poll: PollPolicy::resize(Duration::from_secs(resize_timeout_secs)),
            settle_delay: Duration::from_secs(1),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no invocation could succeed with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=100).contains(&self.threshold_percent),
            "USAGE_THRESHOLD_PERCENT must be between 1 and 100, got {}",
            self.threshold_percent
        );
        ensure!(self.increase_gib > 0, "VOLUME_INCREASE_GB must be positive");
        ensure!(!self.accounts.is_empty(), "ACCOUNT_IDS must not be empty");
        ensure!(!self.regions.is_empty(), "REGION_CODES must not be empty");
        ensure!(!self.role_name.is_empty(), "DELEGATED_ROLE_NAME must not be empty");
        ensure!(
            self.target_device.starts_with("/dev/"),
            "TARGET_DEVICE_NAME must be a /dev path, got {}",
            self.target_device
        );
        ensure!(
            !self.resize_poll.timeout.is_zero(),
            "RESIZE_TIMEOUT_SECS must be positive"
        );
        // The resize wait runs on the delegated session and must end inside it.
        let session = Duration::from_secs(u64::from(self.session_duration_secs.unsigned_abs()));
        ensure!(
            self.resize_poll.timeout < session,
            "RESIZE_TIMEOUT_SECS must be below the {}s session duration, got {}",
            self.session_duration_secs,
            self.resize_poll.timeout.as_secs()
        );
        Ok(())
    }

    /// Account ID for an account key.
    #[must_use]
    pub fn account_id(&self, key: &str) -> Option<&str> {
        self.accounts.get(key).map(String::as_str)
    }

    /// Region code for a region shorthand.
    #[must_use]
    pub fn region_code(&self, shorthand: &str) -> Option<&str> {
        self.regions.get(shorthand).map(String::as_str)
    }

    /// Role ARN to assume in `account_id`.
    #[must_use]
    pub fn role_arn(&self, account_id: &str) -> String {
        format!("arn:aws:iam::{account_id}:role/{}", self.role_name)
    }
}

#[cfg(test)]
impl RemediationConfig {
    /// Defaults with fast polling for unit tests.
    pub(crate) fn sample() -> Self {
        Self {
            expected_alert_name: DEFAULT_EXPECTED_ALERT_NAME.to_string(),
            accounts: parse_table(DEFAULT_ACCOUNT_IDS).unwrap(),
            regions: parse_table(DEFAULT_REGION_CODES).unwrap(),
            role_name: DEFAULT_ROLE_NAME.to_string(),
            session_duration_secs: SESSION_DURATION_SECS,
            target_device: "/dev/sdf".to_string(),
            address_filter: DEFAULT_ADDRESS_FILTER.to_string(),
            threshold_percent: 90,
            increase_gib: 20,
            chat_channel: "C0123".to_string(),
            escalation_topic_arn: "arn:aws:sns:us-east-1:111111111111:disk".to_string(),
            command_poll: PollPolicy::command(),
            resize_poll: PollPolicy::resize(Duration::from_secs(DEFAULT_RESIZE_TIMEOUT_SECS)),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Parse a `key=value,key=value` table.
pub fn parse_table(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut table = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("entry {entry:?} is not key=value");
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            bail!("entry {entry:?} has an empty key or value");
        }
        table.insert(key.to_string(), value.to_string());
    }
    Ok(table)
}
