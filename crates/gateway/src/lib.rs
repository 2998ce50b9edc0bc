//! HTTP API gateway for rolerag.
//!
//! Exposes the chat endpoint, the per-role section hierarchy, employee
//! validation, health, and an admin reload of the knowledge snapshot.
//!
//! Built on Axum; every handler works from the shared [`GatewayState`].

pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::{
    Router,
    routing::{get, post},
};
use rolerag_agent::ChatPipeline;
use rolerag_config::AppConfig;
use rolerag_core::{Directory, Error, Provider, RoleSet};
use rolerag_knowledge::{KnowledgeCache, KnowledgeLoader, KnowledgeSnapshot};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub pipeline: ChatPipeline,
    pub cache: Arc<KnowledgeCache>,
    pub loader: KnowledgeLoader,
    pub directory: Arc<dyn Directory>,
    /// Serializes reloads; chat requests never take it.
    reload_lock: tokio::sync::Mutex<()>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Wire the collaborators around an initial snapshot.
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        directory: Arc<dyn Directory>,
        snapshot: KnowledgeSnapshot,
    ) -> Self {
        let cache = Arc::new(KnowledgeCache::new(snapshot));
        let loader = KnowledgeLoader::new(
            config.knowledge.clone(),
            config.provider.embed_model.clone(),
            provider.clone(),
            directory.clone(),
        );
        let pipeline = ChatPipeline::new(provider, directory.clone(), cache.clone(), &config);
        Self {
            config,
            pipeline,
            cache,
            loader,
            directory,
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build the configured provider and directory and load the first
    /// snapshot. Fails if the snapshot cannot be loaded.
    pub async fn load(config: AppConfig) -> Result<Self, Error> {
        let provider = rolerag_providers::build_from_config(&config)?.require_default()?;
        let directory = rolerag_directory::open(&config.directory).await?;

        let state = Self::new(config, provider, directory, KnowledgeSnapshot::empty());
        state.reload().await?;
        Ok(state)
    }

    /// Rebuild the snapshot. The current one stays in place on failure.
    pub async fn reload(&self) -> Result<Arc<KnowledgeSnapshot>, Error> {
        let _guard = self.reload_lock.lock().await;
        self.cache.reload(&self.loader).await
    }

    /// The configured roles used when a request names none.
    pub fn default_roles(&self) -> RoleSet {
        self.config.roles.default_roles.iter().copied().collect()
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/sections", get(handlers::sections))
        .route("/employee_validator", post(handlers::employee_validator));
    if state.config.gateway.enable_reload {
        router = router.route("/admin/reload", post(handlers::reload));
    }

    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(GatewayState::load(config).await?);
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use rolerag_core::error::ProviderError;
    use rolerag_core::provider::{EmbeddingRequest, EmbeddingResponse, ProviderRequest, ProviderResponse};
    use rolerag_core::{Message, RoleId, SectionNode};
    use rolerag_directory::{DirectoryFixture, EmployeeRow, JsonDirectory, RoleRow};
    use serde_json::{Value, json};
    use std::path::Path;
    use tower::ServiceExt;

    /// Embeds everything as `[1, 0, 0]`; answers with a fixed text or fails.
    struct MockProvider {
        answer: Option<String>,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            match &self.answer {
                Some(text) => Ok(ProviderResponse {
                    message: Message::assistant(text),
                    usage: None,
                    model: "mock-model".into(),
                }),
                None => Err(ProviderError::ApiError {
                    status_code: 503,
                    message: "model unavailable at 10.1.2.3".into(),
                }),
            }
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: vec![vec![1.0, 0.0, 0.0]; request.inputs.len()],
                model: request.model,
            })
        }
    }

    fn node(id: i64, parent: Option<i64>, name: &str, order: i64, roles: &[RoleId], link: Option<&str>) -> SectionNode {
        SectionNode {
            id,
            parent_id: parent,
            name: name.into(),
            order,
            visible_to_roles: roles.iter().copied().collect(),
            link: link.map(String::from),
        }
    }

    fn directory() -> Arc<dyn Directory> {
        Arc::new(JsonDirectory::new(DirectoryFixture {
            roles: vec![
                RoleRow { id: 2, name: "Employee".into() },
                RoleRow { id: 7, name: "HR".into() },
            ],
            sections: vec![
                node(1, None, "Leave Management", 0, &[], Some("#")),
                node(2, Some(1), "Leave Register", 0, &[], Some("/leave/register/")),
                node(3, None, "Salary Processing", 1, &[7], Some("/payroll/salary/")),
            ],
            employees: vec![EmployeeRow {
                user_id: Some("jdoe".into()),
                emp_code: "E001".into(),
                first_name: Some("Jane".into()),
                is_active: true,
            }],
        }))
    }

    fn write_policies(dir: &Path, count: usize) {
        let records: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "id": format!("policy-{i}"),
                    "text": format!("Policy text number {i}."),
                    "vector": [1.0, i as f32, 0.0],
                })
            })
            .collect();
        std::fs::write(dir.join("policies.json"), Value::Array(records).to_string()).unwrap();
    }

    async fn state_with(dir: &Path, answer: Option<&str>, enable_reload: bool) -> SharedState {
        write_policies(dir, 2);
        let mut config = AppConfig::default();
        config.knowledge.policies = dir.join("policies.json");
        config.knowledge.faq_general = dir.join("faq_emp.json");
        config.knowledge.faq_managerial = dir.join("faq_mgr.json");
        config.knowledge.faq_hr = dir.join("faq_hr.json");
        config.gateway.platform_base_url = "http://hr.local".into();
        config.gateway.enable_reload = enable_reload;

        let provider = Arc::new(MockProvider {
            answer: answer.map(String::from),
        });
        let state = GatewayState::new(config, provider, directory(), KnowledgeSnapshot::empty());
        state.reload().await.unwrap();
        Arc::new(state)
    }

    async fn send(state: &SharedState, req: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_snapshot_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("ok"), true).await;

        let (status, json) = send(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["policies"], 2);
        assert_eq!(json["faqs"], 0);
        assert_eq!(json["sections"], 3);
        assert!(json["loaded_at"].is_string());
    }

    #[tokio::test]
    async fn chat_answers_with_related_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("Check the Leave Register."), true).await;

        let (status, json) = send(
            &state,
            post(
                "/chat",
                json!({
                    "messages": [{"role": "user", "content": "Where are my leaves?"}],
                    "role_ids": [2]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = json["text"].as_str().unwrap();
        assert!(text.starts_with("Check the Leave Register."));
        assert!(text.contains("- [Leave Register](http://hr.local/leave/register/)"));
    }

    #[tokio::test]
    async fn chat_accepts_legacy_field_names() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("Check the Leave Register."), true).await;

        let (status, json) = send(
            &state,
            post(
                "/chat",
                json!({
                    "messages": [{"role": "user", "content": "Where are my leaves?"}],
                    "roleIds": [2, 7],
                    "BaseUrl": "https://tenant.example.org"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["text"].as_str().unwrap().contains("https://tenant.example.org/leave/register/"));
    }

    #[tokio::test]
    async fn chat_without_user_message_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("unused"), true).await;

        let (status, json) = send(&state, post("/chat", json!({"messages": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No user message in conversation");
    }

    #[tokio::test]
    async fn chat_with_non_numeric_role_ids_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("unused"), true).await;

        let (status, json) = send(
            &state,
            post(
                "/chat",
                json!({
                    "messages": [{"role": "user", "content": "Where are my leaves?"}],
                    "role_ids": ["hr"]
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request body"));

        let (status, json) = send(&state, post("/employee_validator", json!({"emp_code": 42}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn provider_failure_is_generic_internal_error() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), None, true).await;

        let (status, json) = send(
            &state,
            post("/chat", json!({"messages": [{"role": "user", "content": "hello"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = json["error"].as_str().unwrap();
        assert!(!error.contains("10.1.2.3"));
    }

    #[tokio::test]
    async fn sections_follow_roles() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("ok"), true).await;

        let (status, json) = send(&state, get("/sections")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["sections"],
            "- Leave Management\n  - Leave Register\n- Salary Processing (Only for: HR)\n"
        );

        let (_, json) = send(&state, get("/sections?role_ids=2")).await;
        assert!(!json["sections"].as_str().unwrap().contains("Salary Processing"));

        let (_, json) = send(&state, get("/sections?roleIds=7")).await;
        assert!(json["sections"].as_str().unwrap().contains("Salary Processing"));

        let (status, _) = send(&state, get("/sections?role_ids=2,abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn employee_validation_route() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("ok"), true).await;

        let (status, json) = send(&state, post("/employee_validator", json!({"emp_code": "jdoe"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["valid"], true);
        assert_eq!(json["first_name"], "Jane");

        let (status, json) = send(&state, post("/employee_validator", json!({"emp_code": "nobody"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["valid"], false);

        let (status, json) = send(&state, post("/employee_validator", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing emp_code");
    }

    #[tokio::test]
    async fn reload_swaps_or_keeps_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("ok"), true).await;

        write_policies(tmp.path(), 3);
        let (status, json) = send(&state, post("/admin/reload", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "reloaded");
        assert_eq!(json["policies"], 3);

        std::fs::write(tmp.path().join("policies.json"), "not json").unwrap();
        let (status, _) = send(&state, post("/admin/reload", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, json) = send(&state, get("/health")).await;
        assert_eq!(json["policies"], 3);
    }

    #[tokio::test]
    async fn reload_route_can_be_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with(tmp.path(), Some("ok"), false).await;

        let (status, _) = send(&state, post("/admin/reload", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
