use async_trait::async_trait;
use nq_core::{ChatMessage, CompletionModel, Error, GenerationParams, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;
use crate::Config;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

pub struct OpenAiModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiModel {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key is required".to_string()))?;

        let base_url = config.model_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url).map_err(|e| Error::Config(format!("invalid model url '{}': {}", base_url, e)))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name: config.model_name.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request(&self, messages: &[ChatMessage], params: &GenerationParams) -> std::result::Result<String, String> {
        let request = ChatRequest {
            model: &self.model_name,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("completion endpoint returned {}: {}", status, detail));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| format!("malformed completion response: {}", e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| "completion response carried no choices".to_string())
    }
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String> {
        debug!("Sending {} messages to {}", messages.len(), self.model_name);
        self.request(messages, params).await.map_err(Error::CompletionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        Config {
            api_key: Some("test-key".to_string()),
            model_url: Some(server.uri()),
            ..Default::default()
        }
    }

    #[test]
    fn test_model_requires_api_key() {
        let err = OpenAiModel::new(&Config::default()).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: OpenAI API key is required");

        let model = OpenAiModel::new(&Config { api_key: Some("k".to_string()), ..Default::default() }).unwrap();
        assert!(!format!("{:?}", model).contains("\"k\""));
    }

    #[tokio::test]
    async fn test_complete_sends_messages_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "max_tokens": 500,
                "messages": [
                    { "role": "system", "content": "persona" },
                    { "role": "user", "content": "question" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "réponse" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiModel::new(&config_for(&server)).unwrap();
        let answer = model
            .complete_prompt("persona", "question", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(answer, "réponse");
    }

    #[tokio::test]
    async fn test_auth_failure_is_completion_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let model = OpenAiModel::new(&config_for(&server)).unwrap();
        let err = model.complete_prompt("p", "q", &GenerationParams::default()).await.unwrap_err();
        assert!(matches!(err, Error::CompletionFailed(msg) if msg.contains("invalid api key")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_completion_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let model = OpenAiModel::new(&config_for(&server)).unwrap();
        let err = model.complete_prompt("p", "q", &GenerationParams::default()).await.unwrap_err();
        assert!(matches!(err, Error::CompletionFailed(_)));
    }
}
