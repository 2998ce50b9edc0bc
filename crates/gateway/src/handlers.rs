//! Route handlers.

use crate::SharedState;
use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use rolerag_agent::ChatRequest;
use rolerag_core::{Conversation, EmployeeStatus, Error, Message, RoleId, RoleSet};
use rolerag_knowledge::KnowledgeSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A request failure: 400 with the message for client errors, 500 with a
/// generic message for everything else.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::ClientInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.public_message(),
            }),
        )
            .into_response()
    }
}

// ── Health ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(flatten)]
    pub snapshot: SnapshotSummary,
}

/// Counts for the snapshot currently being served.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub policies: usize,
    pub faqs: usize,
    pub sections: usize,
    pub loaded_at: DateTime<Utc>,
}

impl From<&KnowledgeSnapshot> for SnapshotSummary {
    fn from(snapshot: &KnowledgeSnapshot) -> Self {
        Self {
            policies: snapshot.policies.len(),
            faqs: snapshot.faqs.len(),
            sections: snapshot.section_vectors.len(),
            loaded_at: snapshot.loaded_at,
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let snapshot = state.cache.snapshot();
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        snapshot: SnapshotSummary::from(snapshot.as_ref()),
    })
}

// ── Chat ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, alias = "roleIds")]
    pub role_ids: Option<Vec<RoleId>>,
    #[serde(default, alias = "BaseUrl")]
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

/// `POST /chat`
pub async fn chat(
    State(state): State<SharedState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(body) = payload?;
    let roles = match body.role_ids {
        Some(ids) => ids.into_iter().collect(),
        None => state.default_roles(),
    };
    let request = ChatRequest {
        conversation: Conversation::from_messages(body.messages),
        roles,
        base_url: body.base_url,
    };

    let reply = state.pipeline.run(request).await?;
    Ok(Json(ChatResponse { text: reply.text }))
}

// ── Sections ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SectionsQuery {
    #[serde(default, alias = "roleIds")]
    pub role_ids: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionsResponse {
    pub sections: String,
}

/// `GET /sections?role_ids=2,10`
pub async fn sections(
    State(state): State<SharedState>,
    Query(query): Query<SectionsQuery>,
) -> Result<Json<SectionsResponse>, ApiError> {
    let roles = match query.role_ids.as_deref() {
        Some(raw) => raw.parse::<RoleSet>()?,
        None => state.default_roles(),
    };
    let rendered = state.cache.snapshot().render_sections(&roles);
    Ok(Json(SectionsResponse {
        sections: rendered.text,
    }))
}

// ── Employees ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EmployeeBody {
    #[serde(default)]
    pub emp_code: Option<String>,
}

/// `POST /employee_validator`
pub async fn employee_validator(
    State(state): State<SharedState>,
    payload: Result<Json<EmployeeBody>, JsonRejection>,
) -> Result<Json<EmployeeStatus>, ApiError> {
    let Json(body) = payload?;
    let code = body
        .emp_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::ClientInput("Missing emp_code".into()))?;

    let status = state.directory.validate_employee(code).await.map_err(|e| {
        error!(error = %e, "Employee lookup failed");
        Error::from(e)
    })?;
    Ok(Json(status))
}

// ── Admin ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub status: String,
    #[serde(flatten)]
    pub snapshot: SnapshotSummary,
}

/// `POST /admin/reload`
pub async fn reload(State(state): State<SharedState>) -> Result<Json<ReloadResponse>, ApiError> {
    match state.reload().await {
        Ok(snapshot) => {
            info!(policies = snapshot.policies.len(), "Knowledge snapshot reloaded");
            Ok(Json(ReloadResponse {
                status: "reloaded".into(),
                snapshot: SnapshotSummary::from(snapshot.as_ref()),
            }))
        }
        Err(e) => {
            error!(error = %e, "Reload failed; keeping the current snapshot");
            Err(e.into())
        }
    }
}
