//! Chat thread and escalation reporting.
//!
//! Delivery failures are logged and swallowed: a remediation never stops
//! because a notification could not be sent.

use std::sync::Arc;

use chrono::Utc;
use cloud::TopicService;
use notify::{ChatChannel, RemediationEvent, Severity, ThreadHandle};
use tracing::{error, info, warn};

use crate::error::RemediationError;

/// Subject of an escalation after a hard failure.
pub const SUBJECT_FAILED: &str = "Failed to increase EBS volume";

/// Subject of an escalation when usage is still at or above the threshold.
pub const SUBJECT_BELOW_LIMIT: &str = "EBS volume size below acceptable limit";

/// What the start message announces.
#[derive(Debug, Clone)]
pub struct StartContext<'a> {
    pub account: &'a str,
    pub region: &'a str,
    pub instance_id: &'a str,
    pub usage_percent: u8,
    pub increase_gib: u32,
}

/// Posts to the chat thread and publishes escalations.
pub struct NotificationReporter {
    chat: Arc<dyn ChatChannel>,
    topics: Arc<dyn TopicService>,
    topic_arn: String,
}

impl NotificationReporter {
    pub fn new(
        chat: Arc<dyn ChatChannel>,
        topics: Arc<dyn TopicService>,
        topic_arn: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            topics,
            topic_arn: topic_arn.into(),
        }
    }

    /// Open the thread for this remediation.
    pub async fn report_start(&self, ctx: &StartContext<'_>) -> Option<ThreadHandle> {
        let event = RemediationEvent::Started {
            account: ctx.account.to_string(),
            region: ctx.region.to_string(),
            instance_id: ctx.instance_id.to_string(),
            usage_percent: ctx.usage_percent,
            increase_gib: ctx.increase_gib,
            timestamp: Utc::now(),
        };
        self.post(&event, None).await
    }

    pub async fn report_success(
        &self,
        thread: Option<&ThreadHandle>,
        new_size_gib: i32,
        usage_percent: u8,
    ) {
        let event = RemediationEvent::Succeeded {
            new_size_gib,
            usage_percent,
            timestamp: Utc::now(),
        };
        self.post(&event, thread).await;
    }

    pub async fn report_failure(&self, thread: Option<&ThreadHandle>, error: &RemediationError) {
        let event = RemediationEvent::Failed {
            reason: error.to_string(),
            timestamp: Utc::now(),
        };
        self.post(&event, thread).await;
    }

    /// Publish to the escalation topic. Returns whether it was accepted.
    pub async fn escalate(&self, message: &str, subject: &str) -> bool {
        match self.topics.publish(&self.topic_arn, subject, message).await {
            Ok(message_id) => {
                info!(subject = %subject, message_id = %message_id, "Published escalation");
                true
            }
            Err(e) => {
                let error = RemediationError::NotificationFailure(e.to_string());
                warn!(subject = %subject, error = %error, "Failed to publish escalation");
                false
            }
        }
    }

    async fn post(
        &self,
        event: &RemediationEvent,
        thread: Option<&ThreadHandle>,
    ) -> Option<ThreadHandle> {
        if !self.chat.enabled() {
            undelivered(event, self.chat.name(), "Chat channel not configured, message dropped");
            return None;
        }

        match self.chat.post(&event.text(), thread).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                let error = RemediationError::NotificationFailure(e.to_string());
                undelivered(event, self.chat.name(), &error.to_string());
                None
            }
        }
    }
}

/// Log a dropped chat message. A lost failure report is an error.
fn undelivered(event: &RemediationEvent, channel: &str, reason: &str) {
    match event.severity() {
        Severity::Info => {
            warn!(channel, event = event.title(), reason, "Chat message not delivered");
        }
        Severity::Critical => {
            error!(channel, event = event.title(), reason, "Chat message not delivered");
        }
    }
}
