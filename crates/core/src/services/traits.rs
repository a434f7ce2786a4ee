use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::MessageRole;

use super::Result;

/// One turn of a prompt sent to a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A hosted language model that answers a conversation.
#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Returns the assistant's reply to `turns` under `system_prompt`.
    async fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> Result<String>;
}
