use axum::{
    routing::{get, post},
    Router,
};
use nq_core::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::External(anyhow::anyhow!("failed to bind {}: {}", addr, e)))?;
    info!("🌐 Listening on http://{}", addr);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use nq_core::{Error, Result};
    pub use crate::{create_app, serve, AppState};
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use nq_core::{ArticleRecord, ArticleStore, ChatMessage, CompletionModel, GenerationParams, Query, ScoredCandidate};
    use nq_inference::pipeline::{Pipeline, PipelineConfig};
    use nq_storage::TableStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[derive(Debug)]
    struct EchoModel;

    #[async_trait]
    impl CompletionModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, _messages: &[ChatMessage], _params: &GenerationParams) -> Result<String> {
            Ok("Réponse fondée sur les articles".to_string())
        }
    }

    fn ready_app() -> Router {
        let store = TableStore::from_articles(vec![
            ArticleRecord::new("Inflation en hausse", "Les prix augmentent")
                .with_date(chrono::NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()),
        ]);
        let pipeline = Pipeline::new(Arc::new(store), Arc::new(EchoModel), PipelineConfig::default());
        create_app(AppState::ready(pipeline))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_home() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(ready_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Bienvenue"));
    }

    #[tokio::test]
    async fn test_chat_answers_with_articles() {
        let (status, body) = send(ready_app(), post_chat(json!({ "text": "inflation" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Réponse fondée sur les articles");
        assert_eq!(body["status"]["kind"], "answered");
        assert_eq!(body["articles"][0]["article"]["title"], "Inflation en hausse");
    }

    #[tokio::test]
    async fn test_chat_without_match_returns_sentinel() {
        let (status, body) = send(ready_app(), post_chat(json!({ "text": "football" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["kind"], "no_candidates");
        assert_eq!(body["articles"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_chat_applies_date_range() {
        let request = post_chat(json!({ "text": "inflation", "start": "2024-01-01" }));
        let (_, body) = send(ready_app(), request).await;
        assert_eq!(body["status"]["kind"], "no_candidates");
    }

    #[tokio::test]
    async fn test_chat_requires_text() {
        let (status, body) = send(ready_app(), post_chat(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query is required");
    }

    #[tokio::test]
    async fn test_unavailable_state() {
        let app = create_app(AppState::unavailable("missing column 'contenu'"));
        let (status, body) = send(app, post_chat(json!({ "text": "inflation" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("contenu"));

        let app = create_app(AppState::unavailable("missing column 'contenu'"));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
    }

    struct HealthStore(fn() -> Error);

    #[async_trait]
    impl ArticleStore for HealthStore {
        fn name(&self) -> &str {
            "health"
        }

        async fn search(&self, _query: &Query, _limit: usize) -> Result<Vec<ScoredCandidate>> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<()> {
            Err((self.0)())
        }
    }

    fn app_with_health(failure: fn() -> Error) -> Router {
        let pipeline = Pipeline::new(Arc::new(HealthStore(failure)), Arc::new(EchoModel), PipelineConfig::default());
        create_app(AppState::ready(pipeline))
    }

    fn health_request() -> Request<Body> {
        Request::builder().uri("/health").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_with_failing_backend_status() {
        let app = app_with_health(|| Error::SearchUnavailable("returned 401 Unauthorized".to_string()));
        let (status, body) = send(app, health_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "error");
    }

    #[tokio::test]
    async fn test_health_with_unreachable_backend() {
        let app = app_with_health(|| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"))
        });
        let (status, body) = send(app, health_request()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(ready_app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "connected");
    }
}
