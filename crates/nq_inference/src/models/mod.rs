use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use nq_core::{CompletionModel, Error, Result};
use tracing::info;
use crate::Config;

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiModel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelKind {
    #[default]
    OpenAi,
    Dummy,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "dummy" => Ok(Self::Dummy),
            other => Err(Error::Config(format!(
                "unknown model '{}', available models: openai, dummy",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Dummy => write!(f, "dummy"),
        }
    }
}

pub fn create_model(config: &Config) -> Result<Arc<dyn CompletionModel>> {
    let model: Arc<dyn CompletionModel> = match config.kind {
        ModelKind::OpenAi => Arc::new(OpenAiModel::new(config)?),
        ModelKind::Dummy => Arc::new(DummyModel::new(Some(config))?),
    };
    info!("🧠 Completion model ready (using {})", model.name());
    Ok(model)
}
