use std::fmt;
use std::sync::Arc;
use nq_core::{
    ArticleStore, ChatMessage, CompletionModel, ConversationHistory, Error, GenerationParams, Query,
    ScoredCandidate,
};
use serde::Serialize;
use tracing::{info, warn};
use crate::prompt::{self, assemble, Assembly, AssemblyMode, APOLOGY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryMode {
    /// Every question is answered on its own
    #[default]
    Stateless,
    /// Prior turns of the session are sent along with each question
    SessionLog,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: AssemblyMode,
    pub history: HistoryMode,
    /// Result count used when the query does not set one
    pub limit: usize,
    /// Ask the model for search keywords before querying the store
    pub keyword_extraction: bool,
    /// Replaces the persona of `mode`
    pub persona: Option<String>,
    /// Replaces the generation parameters of `mode`
    pub params: Option<GenerationParams>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: AssemblyMode::Flat,
            history: HistoryMode::Stateless,
            limit: 5,
            keyword_extraction: false,
            persona: None,
            params: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Status {
    Answered,
    NoCandidates,
    SearchUnavailable(String),
    CompletionFailed(String),
}

impl Status {
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub answer: String,
    pub status: Status,
    pub sources: Vec<ScoredCandidate>,
}

/// Conversation state of one interactive user. Owned by the caller and
/// handed to the pipeline by mutable reference for each turn.
#[derive(Debug, Clone)]
pub struct Session {
    history: ConversationHistory,
}

impl Session {
    pub fn new(persona: impl Into<String>) -> Self {
        Self { history: ConversationHistory::with_system(persona) }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }
}

pub struct Pipeline {
    store: Arc<dyn ArticleStore>,
    model: Arc<dyn CompletionModel>,
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("store", &self.store.name())
            .field("model", &self.model)
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    pub fn new(store: Arc<dyn ArticleStore>, model: Arc<dyn CompletionModel>, config: PipelineConfig) -> Self {
        Self { store, model, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArticleStore> {
        &self.store
    }

    pub fn persona(&self) -> &str {
        self.config.persona.as_deref().unwrap_or_else(|| self.config.mode.persona())
    }

    fn params(&self) -> GenerationParams {
        self.config.params.unwrap_or_else(|| self.config.mode.params())
    }

    pub fn session(&self) -> Session {
        Session::new(self.persona())
    }

    /// Candidates for the query. A store failure is returned next to an
    /// empty candidate list instead of being raised.
    pub async fn retrieve(&self, query: &Query) -> (Vec<ScoredCandidate>, Option<Error>) {
        if query.text.trim().is_empty() {
            return (Vec::new(), None);
        }

        let terms = self.search_terms(&query.text).await;
        let search = Query { text: terms, ..query.clone() };
        let limit = query.limit.unwrap_or(self.config.limit);

        info!("🔍 Searching {} for '{}'", self.store.name(), search.text);
        match self.store.search(&search, limit).await {
            Ok(candidates) => (candidates, None),
            Err(e) => {
                warn!("Search failed: {}", e);
                (Vec::new(), Some(e))
            }
        }
    }

    async fn search_terms(&self, text: &str) -> String {
        if !self.config.keyword_extraction {
            return text.to_string();
        }
        let (persona, user) = prompt::keyword_prompt(text);
        let params = GenerationParams { max_tokens: 50, temperature: 0.0 };
        match self.model.complete_prompt(persona, &user, &params).await {
            Ok(keywords) if !keywords.trim().is_empty() => {
                info!("🔑 Extracted keywords: {}", keywords.trim());
                keywords.trim().to_string()
            }
            Ok(_) => text.to_string(),
            Err(e) => {
                warn!("Keyword extraction failed, searching with the raw question: {}", e);
                text.to_string()
            }
        }
    }

    /// Single-turn answer.
    pub async fn answer(&self, query: &Query) -> Response {
        self.run(query, None).await
    }

    /// Answer within a session. With `HistoryMode::SessionLog` earlier turns
    /// are sent along and the new turn is recorded once it succeeds.
    pub async fn answer_in_session(&self, session: &mut Session, query: &Query) -> Response {
        match self.config.history {
            HistoryMode::SessionLog => self.run(query, Some(&mut session.history)).await,
            HistoryMode::Stateless => self.run(query, None).await,
        }
    }

    async fn run(&self, query: &Query, history: Option<&mut ConversationHistory>) -> Response {
        let (candidates, failure) = self.retrieve(query).await;
        // Only what the prompt shows may be cited back.
        let candidates: Vec<ScoredCandidate> = candidates.into_iter().filter(|c| c.score > 0.0).collect();

        let user_content = match assemble(&candidates, &query.text, self.config.mode) {
            Assembly::NoCandidates => {
                let status = match failure {
                    Some(e) => Status::SearchUnavailable(e.to_string()),
                    None => Status::NoCandidates,
                };
                info!("📭 No relevant articles for '{}'", query.text);
                return Response {
                    answer: prompt::NO_RELEVANT_ARTICLES.to_string(),
                    status,
                    sources: Vec::new(),
                };
            }
            Assembly::Prompt(prompt) => prompt,
        };

        info!("🧠 Generating answer with {} from {} articles", self.model.name(), candidates.len());
        let params = self.params();
        let result = match history {
            Some(history) => {
                let mut messages = history.messages().to_vec();
                messages.push(ChatMessage::user(user_content.clone()));
                let result = self.model.complete(&messages, &params).await;
                if let Ok(reply) = &result {
                    history.push(ChatMessage::user(user_content));
                    history.push(ChatMessage::assistant(reply.clone()));
                }
                result
            }
            None => self.model.complete_prompt(self.persona(), &user_content, &params).await,
        };

        match result {
            Ok(answer) => Response {
                answer,
                status: Status::Answered,
                sources: candidates,
            },
            Err(e) => {
                warn!("Completion failed: {}", e);
                Response {
                    answer: APOLOGY.to_string(),
                    status: Status::CompletionFailed(e.to_string()),
                    sources: candidates,
                }
            }
        }
    }
}
