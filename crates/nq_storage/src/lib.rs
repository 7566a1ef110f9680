use nq_core::{ArticleStore, Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub mod backends;
pub mod scoring;

pub use backends::*;

pub trait BackendConfig: fmt::Debug {
    fn get_url(&self) -> String;
    fn get_collection(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// Articles loaded from a spreadsheet export, scored in memory
    #[default]
    Table,
    /// Remote full-text search index
    Elastic,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "memory" | "csv" => Ok(Self::Table),
            "elastic" | "elasticsearch" | "remote" => Ok(Self::Elastic),
            other => Err(Error::Config(format!(
                "unknown backend '{}', expected 'table' or 'elastic'",
                other
            ))),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Elastic => write!(f, "elastic"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub table: Option<TableConfig>,
    pub elastic: Option<ElasticConfig>,
}

/// Opens the configured backend. A table that cannot be read surfaces as
/// `Error::DataLoadFailed`; the caller decides whether to keep running.
pub async fn create_store(settings: StoreSettings) -> Result<Arc<dyn ArticleStore>> {
    match settings.kind {
        StoreKind::Table => {
            let config = settings.table.unwrap_or_else(TableConfig::from_env);
            info!("💾 Opening article table {} ({})", config.get_url(), config.get_collection());
            let store = TableStore::open(&config).await?;
            Ok(Arc::new(store))
        }
        StoreKind::Elastic => {
            let config = settings.elastic.unwrap_or_default();
            info!("💾 Using search index '{}' at {}", config.get_collection(), config.get_url());
            let store = ElasticStore::new(config)?;
            Ok(Arc::new(store))
        }
    }
}

pub mod prelude {
    pub use super::{create_store, BackendConfig, StoreKind, StoreSettings};
    pub use super::backends::*;
}
