//! The remediation state machine.
//!
//! ```text
//! Idle -> Parsed -> Authorized -> Located -> MeasuredBefore -> GateChecked
//!      -> Skipped -> Done
//!      -> Remediating -> Resized -> FilesystemGrown -> MeasuredAfter -> Reported -> Done
//! Idle -> Irrelevant -> Done
//! any step from Authorized onward -> Failed
//! ```
//!
//! Parse and identity failures are only logged. Every later failure is
//! escalated to the topic and, when a chat thread exists, reported into it.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use cloud::{Connector, IdentityService, ScopedClients, TopicService};
use notify::{ChatChannel, ThreadHandle};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::alert::{Alert, AlertParser, AlertPayload, RemediationRequest};
use crate::command::RemoteCommand;
use crate::config::RemediationConfig;
use crate::error::{RemediationError, Result};
use crate::expander::{VolumeExpander, VolumeResizeOperation};
use crate::grower::FilesystemGrower;
use crate::identity::{DelegatedSession, IdentityBroker};
use crate::locator::{DeviceLocator, TargetResource};
use crate::probe::{UsageProbe, UsageSample};
use crate::reporter::{NotificationReporter, StartContext, SUBJECT_BELOW_LIMIT, SUBJECT_FAILED};

/// States an invocation passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    Irrelevant,
    Parsed,
    Authorized,
    Located,
    MeasuredBefore,
    GateChecked,
    Skipped,
    Remediating,
    Resized,
    FilesystemGrown,
    MeasuredAfter,
    Reported,
    Done,
    Failed,
}

impl InvocationState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Not the alert this service handles.
    Irrelevant,
    /// Usage was below the threshold.
    Skipped,
    /// Grown and back under the threshold.
    Resolved,
    /// Grown but still at or above the threshold; escalated.
    ResidualBreach,
    Failed,
}

/// Everything one invocation did. Used for logs and tests only.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub path: Vec<InvocationState>,
    pub outcome: Outcome,
    pub request: Option<RemediationRequest>,
    pub target: Option<TargetResource>,
    pub before: Option<UsageSample>,
    pub after: Option<UsageSample>,
    pub resize: Option<VolumeResizeOperation>,
    pub thread: Option<ThreadHandle>,
    pub error: Option<String>,
    pub escalated: bool,
}

impl InvocationReport {
    fn new() -> Self {
        Self {
            path: vec![InvocationState::Idle],
            outcome: Outcome::Failed,
            request: None,
            target: None,
            before: None,
            after: None,
            resize: None,
            thread: None,
            error: None,
            escalated: false,
        }
    }

    fn enter(&mut self, state: InvocationState) {
        debug!(state = %state, "State transition");
        self.path.push(state);
    }

    fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        let terminal = if outcome == Outcome::Failed {
            InvocationState::Failed
        } else {
            InvocationState::Done
        };
        self.enter(terminal);
        self
    }

    /// Last state reached.
    #[must_use]
    pub fn final_state(&self) -> InvocationState {
        self.path.last().copied().unwrap_or(InvocationState::Idle)
    }
}

/// Runs remediations.
pub struct Remediator {
    config: Arc<RemediationConfig>,
    parser: AlertParser,
    broker: IdentityBroker,
    connector: Arc<dyn Connector>,
    reporter: NotificationReporter,
}

impl Remediator {
    pub fn new(
        config: Arc<RemediationConfig>,
        identity: Arc<dyn IdentityService>,
        connector: Arc<dyn Connector>,
        chat: Arc<dyn ChatChannel>,
        topics: Arc<dyn TopicService>,
    ) -> Self {
        Self {
            parser: AlertParser::new(config.expected_alert_name.clone()),
            broker: IdentityBroker::new(identity, config.clone()),
            reporter: NotificationReporter::new(
                chat,
                topics,
                config.escalation_topic_arn.clone(),
            ),
            connector,
            config,
        }
    }

    /// Handle every alert of a webhook payload, one after the other.
    pub async fn handle_payload(&self, payload: &AlertPayload) -> Vec<InvocationReport> {
        if payload.alerts.is_empty() {
            let error = RemediationError::MalformedAlert("payload has no alerts".to_string());
            warn!(error = %error, "Ignoring payload");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(payload.alerts.len());
        for alert in &payload.alerts {
            reports.push(self.handle_alert(alert).await);
        }
        reports
    }

    /// Handle one alert to a terminal state.
    #[instrument(skip(self, alert), fields(alert = %alert.name()))]
    pub async fn handle_alert(&self, alert: &Alert) -> InvocationReport {
        let mut report = InvocationReport::new();

        let request = match self.parser.parse_alert(alert) {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Alert is not a disk usage alert");
                report.enter(InvocationState::Irrelevant);
                return report.finish(Outcome::Irrelevant);
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Could not parse alert");
                report.error = Some(e.to_string());
                return report.finish(Outcome::Failed);
            }
        };
        report.request = Some(request.clone());
        report.enter(InvocationState::Parsed);

        let session = match self.broker.delegate(&request).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    account = %request.account_key,
                    region = %request.region,
                    error = %e,
                    kind = e.kind(),
                    "Could not obtain delegated credentials"
                );
                report.error = Some(e.to_string());
                return report.finish(Outcome::Failed);
            }
        };
        report.enter(InvocationState::Authorized);

        match self.remediate(&request, &session, &mut report).await {
            Ok(outcome) => {
                info!(
                    outcome = ?outcome,
                    instance_address = %request.instance_address,
                    "Remediation finished"
                );
                report.finish(outcome)
            }
            Err(e) => {
                error!(
                    error = %e,
                    kind = e.kind(),
                    instance_address = %request.instance_address,
                    "Remediation failed"
                );
                let message = failure_message(&request, report.target.as_ref(), &e);
                report.escalated = self.reporter.escalate(&message, SUBJECT_FAILED).await;
                // Failures before the start message stay out of chat.
                if report.path.contains(&InvocationState::Remediating) {
                    self.reporter.report_failure(report.thread.as_ref(), &e).await;
                }
                report.error = Some(e.to_string());
                report.finish(Outcome::Failed)
            }
        }
    }

    async fn remediate(
        &self,
        request: &RemediationRequest,
        session: &DelegatedSession,
        report: &mut InvocationReport,
    ) -> Result<Outcome> {
        let clients: ScopedClients = self
            .connector
            .connect(&session.credentials, &session.region)
            .await?;
        let config = &self.config;

        session.ensure_valid(Utc::now())?;
        let target = DeviceLocator::new(
            clients.compute.clone(),
            config.address_filter.clone(),
            config.target_device.clone(),
        )
        .locate(&request.instance_address)
        .await?;
        report.target = Some(target.clone());
        report.enter(InvocationState::Located);

        let probe = UsageProbe::new(RemoteCommand::new(
            clients.commands.clone(),
            config.command_poll,
        ));

        session.ensure_valid(Utc::now())?;
        let before = probe
            .measure(&target.instance_id, &request.device_path)
            .await?;
        report.before = Some(before);
        report.enter(InvocationState::MeasuredBefore);

        report.enter(InvocationState::GateChecked);
        if before.percentage < config.threshold_percent {
            info!(
                instance_id = %target.instance_id,
                usage = before.percentage,
                threshold = config.threshold_percent,
                "Usage below threshold, nothing to do"
            );
            report.enter(InvocationState::Skipped);
            return Ok(Outcome::Skipped);
        }

        report.enter(InvocationState::Remediating);
        report.thread = self
            .reporter
            .report_start(&StartContext {
                account: &request.account_key,
                region: &request.region,
                instance_id: &target.instance_id,
                usage_percent: before.percentage,
                increase_gib: config.increase_gib,
            })
            .await;

        session.ensure_valid(Utc::now())?;
        let resize = VolumeExpander::new(
            clients.compute.clone(),
            config.increase_gib,
            config.resize_poll,
        )
        .expand(&target.volume_id)
        .await?;
        report.resize = Some(resize.clone());
        report.enter(InvocationState::Resized);

        session.ensure_valid(Utc::now())?;
        FilesystemGrower::new(RemoteCommand::new(
            clients.commands.clone(),
            config.command_poll,
        ))
        .grow(&target.instance_id, &request.device_path)
        .await?;
        report.enter(InvocationState::FilesystemGrown);

        tokio::time::sleep(config.settle_delay).await;

        session.ensure_valid(Utc::now())?;
        let after = probe
            .measure(&target.instance_id, &request.device_path)
            .await?;
        report.after = Some(after);
        report.enter(InvocationState::MeasuredAfter);

        self.reporter
            .report_success(
                report.thread.as_ref(),
                resize.target_size_gib,
                after.percentage,
            )
            .await;
        report.enter(InvocationState::Reported);

        if after.percentage >= config.threshold_percent {
            warn!(
                instance_id = %target.instance_id,
                usage = after.percentage,
                threshold = config.threshold_percent,
                "Usage still at or above threshold after resize"
            );
            let message = format!(
                "Volume {} on instance {} was increased to {}GB \
                 but disk usage is still {}% (threshold {}%).\n\n\
                 Account: {}\nRegion: {}",
                target.volume_id,
                target.instance_id,
                resize.target_size_gib,
                after.percentage,
                config.threshold_percent,
                request.account_key,
                request.region,
            );
            report.escalated = self.reporter.escalate(&message, SUBJECT_BELOW_LIMIT).await;
            return Ok(Outcome::ResidualBreach);
        }

        Ok(Outcome::Resolved)
    }
}

fn failure_message(
    request: &RemediationRequest,
    target: Option<&TargetResource>,
    error: &RemediationError,
) -> String {
    let instance = target.map_or("unknown", |t| t.instance_id.as_str());
    format!(
        "Automated EBS volume increase failed.\n\n\
         Account: {}\nRegion: {}\nInstance address: {}\nInstanceId: {}\nDevice: {}\n\
         Error ({}): {}",
        request.account_key,
        request.region,
        request.instance_address,
        instance,
        request.device_path,
        error.kind(),
        error,
    )
}
