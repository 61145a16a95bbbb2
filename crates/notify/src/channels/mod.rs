//! Chat channel implementations.

pub mod slack;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Handle of a posted message that later messages can reply to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadHandle(pub String);

impl ThreadHandle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for chat channels that support threaded replies.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Post a message, as a reply when `thread` is given.
    ///
    /// Returns the handle of the thread the message belongs to.
    async fn post(
        &self,
        text: &str,
        thread: Option<&ThreadHandle>,
    ) -> Result<ThreadHandle, ChannelError>;
}
