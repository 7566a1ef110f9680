use async_trait::async_trait;
use crate::types::{Query, ScoredCandidate};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Return at most `limit` candidates for the query, best first
    async fn search(&self, query: &Query, limit: usize) -> Result<Vec<ScoredCandidate>>;

    /// Check that the backend can serve queries. `SearchUnavailable` or
    /// `DataLoadFailed` mean the backend answered but is not usable; any
    /// other error means it could not be reached.
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
