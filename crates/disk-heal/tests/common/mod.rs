//! Scripted fakes for end-to-end remediation tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloud::{
    AssumeRoleRequest, BlockDevice, CloudProviderError, CommandInvocation, CommandService,
    CommandStatus, ComputeService, Connector, Credentials, IdentityService, Instance,
    ModificationState, ScopedClients, TopicService, Volume, VolumeModification,
};
use disk_heal::alert::Alert;
use disk_heal::{RemediationConfig, Remediator};
use notify::{ChannelError, ChatChannel, ThreadHandle};

pub const THREAD_TS: &str = "1700000000.000100";

// =============================================================================
// Identity
// =============================================================================

pub struct FakeIdentity {
    pub expiration: DateTime<Utc>,
    pub deny: bool,
    pub requests: Mutex<Vec<AssumeRoleRequest>>,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self {
            expiration: Utc::now() + chrono::Duration::minutes(15),
            deny: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn assume_role(&self, req: AssumeRoleRequest) -> Result<Credentials, CloudProviderError> {
        self.requests.lock().unwrap().push(req);
        if self.deny {
            return Err(CloudProviderError::Auth("AccessDenied".to_string()));
        }
        Ok(Credentials {
            access_key_id: "ASIAFAKE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: self.expiration,
        })
    }
}

// =============================================================================
// Compute and commands
// =============================================================================

/// One account's worth of instances, volumes and command results.
pub struct FakeCloud {
    pub instances: Vec<Instance>,
    pub volume_size_gib: Mutex<i32>,
    pub reject_modify: bool,
    /// Modification states returned by successive polls; the last one repeats.
    pub modification_states: Mutex<VecDeque<ModificationState>>,
    /// `df` outputs returned by successive probes.
    pub usage_outputs: Mutex<VecDeque<String>>,
    pub grow_status: CommandStatus,
    pub modify_calls: Mutex<Vec<(String, i32)>>,
    pub commands_sent: Mutex<Vec<String>>,
    dispatched: Mutex<HashMap<String, (CommandStatus, String)>>,
}

impl FakeCloud {
    /// One instance at 10.0.0.5 with `/dev/sdf` backed by a 100GB volume.
    pub fn new(usage: &[u8]) -> Self {
        Self {
            instances: vec![Instance {
                id: "i-0abc".to_string(),
                block_devices: vec![
                    BlockDevice {
                        device_name: "/dev/xvda".to_string(),
                        volume_id: Some("vol-root".to_string()),
                    },
                    BlockDevice {
                        device_name: "/dev/sdf".to_string(),
                        volume_id: Some("vol-data".to_string()),
                    },
                ],
            }],
            volume_size_gib: Mutex::new(100),
            reject_modify: false,
            modification_states: Mutex::new(VecDeque::from([
                ModificationState::Modifying,
                ModificationState::Optimizing,
            ])),
            usage_outputs: Mutex::new(usage.iter().map(|pct| format!(" {pct}%\n")).collect()),
            grow_status: CommandStatus::Success,
            modify_calls: Mutex::new(Vec::new()),
            commands_sent: Mutex::new(Vec::new()),
            dispatched: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_modification_states(self, states: &[ModificationState]) -> Self {
        *self.modification_states.lock().unwrap() = states.iter().copied().collect();
        self
    }
}

#[async_trait]
impl ComputeService for FakeCloud {
    async fn find_instances(
        &self,
        filter: &str,
        address: &str,
    ) -> Result<Vec<Instance>, CloudProviderError> {
        assert_eq!(filter, "ip-address");
        if address == "10.0.0.5" {
            Ok(self.instances.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume, CloudProviderError> {
        Ok(Volume {
            id: volume_id.to_string(),
            size_gib: *self.volume_size_gib.lock().unwrap(),
        })
    }

    async fn modify_volume_size(
        &self,
        volume_id: &str,
        size_gib: i32,
    ) -> Result<(), CloudProviderError> {
        self.modify_calls
            .lock()
            .unwrap()
            .push((volume_id.to_string(), size_gib));
        if self.reject_modify {
            return Err(CloudProviderError::Api {
                operation: "ModifyVolume",
                code: "VolumeModificationRateExceeded".to_string(),
                message: "modification rate exceeded".to_string(),
            });
        }
        Ok(())
    }

    async fn volume_modifications(
        &self,
        volume_id: &str,
        target_size_gib: i32,
    ) -> Result<Vec<VolumeModification>, CloudProviderError> {
        let mut states = self.modification_states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or(ModificationState::Unknown)
        } else {
            states.front().copied().unwrap_or(ModificationState::Unknown)
        };
        if matches!(
            state,
            ModificationState::Optimizing | ModificationState::Completed
        ) {
            *self.volume_size_gib.lock().unwrap() = target_size_gib;
        }
        Ok(vec![VolumeModification {
            volume_id: volume_id.to_string(),
            state,
            target_size_gib: Some(target_size_gib),
        }])
    }
}

#[async_trait]
impl CommandService for FakeCloud {
    async fn send_shell_command(
        &self,
        _instance_id: &str,
        command: &str,
    ) -> Result<String, CloudProviderError> {
        let mut sent = self.commands_sent.lock().unwrap();
        sent.push(command.to_string());
        let command_id = format!("cmd-{}", sent.len());

        let result = if command.starts_with("df ") {
            let output = self
                .usage_outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default();
            (CommandStatus::Success, output)
        } else {
            (self.grow_status, String::new())
        };
        self.dispatched
            .lock()
            .unwrap()
            .insert(command_id.clone(), result);
        Ok(command_id)
    }

    async fn get_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<CommandInvocation, CloudProviderError> {
        let (status, output) = self
            .dispatched
            .lock()
            .unwrap()
            .get(command_id)
            .cloned()
            .ok_or_else(|| CloudProviderError::NotFound(command_id.to_string()))?;
        Ok(CommandInvocation {
            command_id: command_id.to_string(),
            instance_id: instance_id.to_string(),
            status,
            output,
        })
    }
}

pub struct FakeConnector {
    pub cloud: Arc<FakeCloud>,
    pub regions: Mutex<Vec<String>>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _credentials: &Credentials,
        region: &str,
    ) -> Result<ScopedClients, CloudProviderError> {
        self.regions.lock().unwrap().push(region.to_string());
        Ok(ScopedClients {
            compute: self.cloud.clone(),
            commands: self.cloud.clone(),
        })
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPost {
    pub text: String,
    pub thread: Option<ThreadHandle>,
}

#[derive(Default)]
pub struct RecordingChat {
    /// Fail the top-level start post.
    pub fail_start: bool,
    pub posts: Mutex<Vec<ChatPost>>,
}

#[async_trait]
impl ChatChannel for RecordingChat {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn post(
        &self,
        text: &str,
        thread: Option<&ThreadHandle>,
    ) -> Result<ThreadHandle, ChannelError> {
        if self.fail_start && text.starts_with("Automated EBS volume increase") {
            return Err(ChannelError::Api("not_in_channel".to_string()));
        }
        self.posts.lock().unwrap().push(ChatPost {
            text: text.to_string(),
            thread: thread.cloned(),
        });
        Ok(thread
            .cloned()
            .unwrap_or_else(|| ThreadHandle(THREAD_TS.to_string())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic_arn: String,
    pub subject: String,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingTopics {
    /// Reject every publish.
    pub fail: bool,
    pub published: Mutex<Vec<Publication>>,
}

#[async_trait]
impl TopicService for RecordingTopics {
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        message: &str,
    ) -> Result<String, CloudProviderError> {
        if self.fail {
            return Err(CloudProviderError::Auth(format!(
                "not authorized to publish to {topic_arn}"
            )));
        }
        let mut published = self.published.lock().unwrap();
        published.push(Publication {
            topic_arn: topic_arn.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(format!("msg-{}", published.len()))
    }
}

// =============================================================================
// Harness
// =============================================================================

pub fn config() -> RemediationConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("TARGET_DEVICE_NAME", "/dev/sdf"),
        ("USAGE_THRESHOLD_PERCENT", "90"),
        ("VOLUME_INCREASE_GB", "20"),
        ("SLACK_CHANNEL", "C0123"),
        ("ESCALATION_TOPIC_ARN", "arn:aws:sns:us-east-1:111111111111:disk"),
        ("RESIZE_TIMEOUT_SECS", "60"),
    ]);
    RemediationConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap()
}

pub struct Harness {
    pub config: RemediationConfig,
    pub identity: Arc<FakeIdentity>,
    pub cloud: Arc<FakeCloud>,
    pub connector: Arc<FakeConnector>,
    pub chat: Arc<RecordingChat>,
    pub topics: Arc<RecordingTopics>,
}

impl Harness {
    pub fn new(cloud: FakeCloud) -> Self {
        let cloud = Arc::new(cloud);
        Self {
            config: config(),
            identity: Arc::new(FakeIdentity::default()),
            connector: Arc::new(FakeConnector {
                cloud: cloud.clone(),
                regions: Mutex::new(Vec::new()),
            }),
            cloud,
            chat: Arc::new(RecordingChat::default()),
            topics: Arc::new(RecordingTopics::default()),
        }
    }

    pub fn with_chat(mut self, chat: RecordingChat) -> Self {
        self.chat = Arc::new(chat);
        self
    }

    pub fn with_topics(mut self, topics: RecordingTopics) -> Self {
        self.topics = Arc::new(topics);
        self
    }

    pub fn with_identity(mut self, identity: FakeIdentity) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    pub fn with_resize_timeout(mut self, timeout: Duration) -> Self {
        self.config.resize_poll.timeout = timeout;
        self
    }

    pub fn remediator(&self) -> Remediator {
        Remediator::new(
            Arc::new(self.config.clone()),
            self.identity.clone(),
            self.connector.clone(),
            self.chat.clone(),
            self.topics.clone(),
        )
    }

    pub fn posts(&self) -> Vec<ChatPost> {
        self.chat.posts.lock().unwrap().clone()
    }

    pub fn publications(&self) -> Vec<Publication> {
        self.topics.published.lock().unwrap().clone()
    }

    pub fn modify_calls(&self) -> Vec<(String, i32)> {
        self.cloud.modify_calls.lock().unwrap().clone()
    }
}

pub fn disk_alert(value: &str) -> Alert {
    Alert {
        labels: HashMap::from([("alertname".to_string(), "Disk Usage".to_string())]),
        value_string: value.to_string(),
        ..Default::default()
    }
}

pub const ALERT_VALUE: &str = concat!(
    "[ var='B0' labels={account=account1, device=/dev/sdf, ",
    "instance=10.0.0.5:9100, region=us} value=92 ]"
);
