use std::fmt;
use nq_core::{ChatMessage, CompletionModel, GenerationParams, Result, Role};
use crate::Config;

/// Offline model: answers with the opening words of the last user message.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new(_config: Option<&Config>) -> Result<Self> {
        Ok(Self)
    }
}

#[async_trait::async_trait]
impl CompletionModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let words: Vec<&str> = last_user
            .split_whitespace()
            .take(params.max_tokens.min(40) as usize)
            .collect();
        Ok(words.join(" "))
    }
}
