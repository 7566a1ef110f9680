use std::env;
use std::fmt;

pub mod models;
pub mod pipeline;
pub mod prompt;

pub use models::{create_model, ModelKind};

#[derive(Clone, Default)]
pub struct Config {
    pub kind: ModelKind,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub model_url: Option<String>,
}

impl Config {
    /// Reads `OPENAI_API_KEY`, `NQ_MODEL_NAME` and `NQ_MODEL_URL`.
    pub fn from_env(kind: ModelKind) -> Self {
        Self {
            kind,
            api_key: env::var("OPENAI_API_KEY").ok(),
            model_name: env::var("NQ_MODEL_NAME").ok(),
            model_url: env::var("NQ_MODEL_URL").ok(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("model_url", &self.model_url)
            .finish()
    }
}

pub mod prelude {
    pub use super::Config;
    pub use super::models::{create_model, ModelKind};
    pub use super::pipeline::{HistoryMode, Pipeline, PipelineConfig, Response, Session, Status};
    pub use super::prompt::{assemble, Assembly, AssemblyMode};
    pub use nq_core::{ArticleRecord, Error, Query, Result, ScoredCandidate};
}
