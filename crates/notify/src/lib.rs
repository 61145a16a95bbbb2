//! Threaded chat notifications for disk remediation.
//!
//! Every remediation opens one chat thread with a start message and replies
//! into it with the outcome, so the whole run reads as a single conversation.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{ChatChannel, RemediationEvent, SlackChannel};
//!
//! # async fn example() -> Result<(), notify::ChannelError> {
//! let slack = SlackChannel::new(Some("xoxb-...".to_string()), "C0123456789");
//!
//! let started = RemediationEvent::Started {
//!     account: "account1".to_string(),
//!     region: "us".to_string(),
//!     instance_id: "i-0abc".to_string(),
//!     usage_percent: 92,
//!     increase_gib: 20,
//!     timestamp: chrono::Utc::now(),
//! };
//! let thread = slack.post(&started.text(), None).await?;
//!
//! let done = RemediationEvent::Succeeded {
//!     new_size_gib: 120,
//!     usage_percent: 45,
//!     timestamp: chrono::Utc::now(),
//! };
//! slack.post(&done.text(), Some(&thread)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! The caller supplies the bot token (needs `chat:write`) and the channel
//! ID. Posting through a channel without either fails with
//! [`ChannelError::NotConfigured`] naming `SLACK_BOT_TOKEN` or
//! `SLACK_CHANNEL`.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::slack::SlackChannel;
pub use channels::{ChatChannel, ThreadHandle};
pub use error::ChannelError;
pub use events::{RemediationEvent, Severity};
