//! Alert payload types and extraction of the remediation request.
//!
//! Alerts arrive as Grafana/Alertmanager style webhooks. The useful fields
//! live inside the free-form `valueString`, which looks like
//!
//! ```text
//! [ var='B0' labels={account=account1, device=/dev/sdf, instance=10.0.0.5:9100, region=us} value=92.4 ]
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RemediationError, Result};

/// Device paths that are safe to interpolate into a shell command.
static DEVICE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/dev/[A-Za-z0-9/_.-]+$").unwrap());

/// Webhook body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
}

/// A single alert.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub value_string: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Alert {
    /// The `alertname` label, empty when absent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map_or("", String::as_str)
    }
}

/// What to remediate. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationRequest {
    /// Region shorthand, e.g. `us`.
    pub region: String,
    /// Account key, e.g. `account1`.
    pub account_key: String,
    /// Instance network address without port.
    pub instance_address: String,
    /// Device the alert fired for.
    pub device_path: String,
}

/// Turns alerts into remediation requests.
#[derive(Debug, Clone)]
pub struct AlertParser {
    expected_name: String,
}

impl AlertParser {
    #[must_use]
    pub fn new(expected_name: impl Into<String>) -> Self {
        Self {
            expected_name: expected_name.into(),
        }
    }

    /// Parse an alert.
    ///
    /// Returns `Ok(None)` when the alert name is not the expected one.
    pub fn parse_alert(&self, alert: &Alert) -> Result<Option<RemediationRequest>> {
        self.parse(alert.name(), &alert.value_string)
    }

    /// Parse an alert name and value string.
    pub fn parse(&self, alert_name: &str, value: &str) -> Result<Option<RemediationRequest>> {
        if alert_name != self.expected_name {
            return Ok(None);
        }

        let region = required(value, "region", &[',', '}'])?;
        let account_key = required(value, "account", &[',', '}'])?;
        let instance_address = required(value, "instance", &[':', ',', '}'])?;
        let device_path = required(value, "device", &[',', '}'])?;

        if !DEVICE_PATH.is_match(&device_path) {
            return Err(RemediationError::MalformedAlert(format!(
                "device {device_path:?} is not a device path"
            )));
        }

        Ok(Some(RemediationRequest {
            region,
            account_key,
            instance_address,
            device_path,
        }))
    }
}

fn required(value: &str, key: &str, delimiters: &[char]) -> Result<String> {
    extract_value(value, key, delimiters)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RemediationError::MalformedAlert(format!("missing {key}")))
}

/// Value of the first `key=`, up to the first delimiter.
///
/// A match glued to a longer identifier (`subregion=` for `region`) is skipped.
fn extract_value<'a>(value: &'a str, key: &str, delimiters: &[char]) -> Option<&'a str> {
    let needle = format!("{key}=");
    let start = value.match_indices(&needle).find_map(|(idx, _)| {
        let inside_word = value[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        (!inside_word).then_some(idx + needle.len())
    })?;

    let rest = &value[start..];
    let end = rest.find(delimiters).unwrap_or(rest.len());
    Some(rest[..end].trim())
}
