use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::ChatMessage;
use crate::Result;

/// Sampling parameters sent along with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[async_trait]
pub trait CompletionModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Sends the ordered messages and returns the generated text. Every
    /// failure is reported as `Error::CompletionFailed`.
    async fn complete(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String>;

    /// Single-turn exchange: one system persona, one user message.
    async fn complete_prompt(&self, persona: &str, user: &str, params: &GenerationParams) -> Result<String> {
        let messages = [ChatMessage::system(persona), ChatMessage::user(user)];
        self.complete(&messages, params).await
    }
}
