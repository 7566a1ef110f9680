pub mod models;
pub mod error;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use models::{CompletionModel, GenerationParams};
pub use storage::ArticleStore;
pub use types::{
    filter_by_date, parse_date, ArticleRecord, ChatMessage, ConversationHistory, DateRange, Query, Role,
    ScoredCandidate,
};
