use nq_inference::pipeline::Pipeline;

pub struct AppState {
    pub pipeline: Option<Pipeline>,
    /// Why answering is disabled, when the article source failed to load
    pub unavailable: Option<String>,
}

impl AppState {
    pub fn ready(pipeline: Pipeline) -> Self {
        Self { pipeline: Some(pipeline), unavailable: None }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self { pipeline: None, unavailable: Some(reason.into()) }
    }
}
