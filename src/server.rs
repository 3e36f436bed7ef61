use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tower_http::trace::TraceLayer;

use tracing::info;

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::llm::{GenerationConfig, ModelGateway};
use crate::session::{ExchangeOptions, Turn};
use crate::{AppState, ExchangeDefaults};

/// Start the Axum server with the provided configuration.
///
/// The session registry is created here, once, and lives until the server
/// shuts down. Nothing is persisted.
pub async fn start_server(
    config: Arc<AppConfig>,
    gateway: Arc<dyn ModelGateway>,
) -> anyhow::Result<()> {
    let defaults = ExchangeDefaults::from_config(&config.gateway);
    info!(
        name: "gateway.config.loaded",
        provider = %config.gateway.provider,
        default_model = ?defaults.default_model,
        timeout_secs = config.gateway.timeout_secs,
        "Gateway configuration loaded"
    );

    let state = AppState::new(gateway, defaults);
    let sessions = state.sessions.clone();

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(
        name: "server.stopped",
        discarded_sessions = sessions.len(),
        "Server stopped; in-memory sessions discarded"
    );
    Ok(())
}

/// Build the conversation API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route(
            "/conversations/{id}",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/conversations/{id}/messages", post(send_message))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Boundary error: maps the session taxonomy onto HTTP statuses.
#[derive(Debug)]
pub struct AppError(SessionError);

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SessionError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            SessionError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            SessionError::Exchange(_) | SessionError::ProtocolViolation => {
                tracing::error!(error = %self.0, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateConversationResponse {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ConversationResponse {
    conversation_id: String,
    history: Vec<Turn>,
    length: usize,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    message: String,
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    /// User message text.
    #[serde(default)]
    message: Option<String>,
    /// Optional model override.
    #[serde(default)]
    model_name: Option<String>,
    /// Optional generation config override for this call only.
    #[serde(default)]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    response: String,
}

/// POST /conversations - Create a new conversation.
async fn create_conversation(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create();
    (
        StatusCode::CREATED,
        Json(CreateConversationResponse {
            conversation_id: session.id().to_string(),
        }),
    )
}

/// GET /conversations/{id} - Get the ordered history of a conversation.
async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| SessionError::NotFound(id.clone()))?;

    let history = session.history().snapshot();
    Ok(Json(ConversationResponse {
        conversation_id: id,
        length: history.len(),
        history,
    }))
}

/// DELETE /conversations/{id} - Delete a conversation.
async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if state.sessions.delete(&id) {
        Ok(Json(DeleteResponse {
            message: format!("Conversation '{id}' deleted successfully."),
        }))
    } else {
        Err(SessionError::NotFound(id).into())
    }
}

/// POST /conversations/{id}/messages - Send a message and get the model reply.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, AppError> {
    // Unknown ids are reported before the body is validated.
    if state.sessions.get(&id).is_none() {
        return Err(SessionError::NotFound(id).into());
    }

    let Json(req) = body.map_err(|e| SessionError::InvalidRequest(e.body_text()))?;
    let message = req
        .message
        .ok_or_else(|| SessionError::InvalidRequest("Missing 'message' in request body.".to_string()))?;

    let options = exchange_options(&state.defaults, req.model_name, req.generation_config)?;

    let response = state
        .sessions
        .send_message(&id, state.gateway.as_ref(), &options, &message)
        .await?;

    Ok(Json(SendMessageResponse { response }))
}

/// Resolve per-call options from request overrides and server defaults.
fn exchange_options(
    defaults: &ExchangeDefaults,
    model_name: Option<String>,
    generation_config: Option<serde_json::Value>,
) -> Result<ExchangeOptions, SessionError> {
    let model = model_name
        .filter(|m| !m.trim().is_empty())
        .or_else(|| defaults.default_model.clone())
        .ok_or_else(|| {
            SessionError::InvalidRequest(
                "No 'model_name' in request body and no default model configured.".to_string(),
            )
        })?;
    if !is_valid_model_name(&model) {
        return Err(SessionError::InvalidRequest(format!(
            "Invalid model_name '{model}': only letters, digits, '.', '_' and '-' are allowed."
        )));
    }

    // Absent, null, empty or non-object overrides keep the server default.
    let generation = match generation_config {
        Some(serde_json::Value::Object(map)) if !map.is_empty() => {
            GenerationConfig::from_json(&map)?
        }
        Some(other @ (serde_json::Value::String(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::Bool(_)
        | serde_json::Value::Array(_))) => {
            tracing::debug!(value = %other, "Ignoring non-object generation_config");
            defaults.generation.clone()
        }
        _ => defaults.generation.clone(),
    };

    Ok(ExchangeOptions {
        model,
        generation,
        timeout: defaults.timeout,
    })
}

/// Model names become a URL path segment; keep them to a safe alphabet.
fn is_valid_model_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn defaults(model: Option<&str>) -> ExchangeDefaults {
        ExchangeDefaults {
            default_model: model.map(ToString::to_string),
            generation: GenerationConfig::standard(None),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_request_model_overrides_default() {
        let options = exchange_options(&defaults(Some("default")), Some("custom".into()), None).unwrap();
        assert_eq!(options.model, "custom");
        assert_eq!(options.generation, GenerationConfig::standard(None));
        assert_eq!(options.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_model_without_default_is_invalid() {
        let err = exchange_options(&defaults(None), None, None).unwrap_err();
        assert!(matches!(err, SessionError::InvalidRequest(_)));

        let options = exchange_options(&defaults(Some("default")), Some("  ".into()), None).unwrap();
        assert_eq!(options.model, "default");
    }

    #[test]
    fn test_generation_override_replaces_default() {
        let options = exchange_options(
            &defaults(Some("m")),
            None,
            Some(json!({ "temperature": 0.3 })),
        )
        .unwrap();
        assert_eq!(options.generation.temperature, Some(0.3));
        assert!(options.generation.tools.is_empty());

        let ignored = exchange_options(&defaults(Some("m")), None, Some(json!("fast"))).unwrap();
        assert_eq!(ignored.generation, GenerationConfig::standard(None));
    }

    #[test]
    fn test_empty_generation_override_keeps_default() {
        let mut with_instruction = defaults(Some("m"));
        with_instruction.generation = GenerationConfig::standard(Some("sys"));

        let options = exchange_options(&with_instruction, None, Some(json!({}))).unwrap();
        assert_eq!(options.generation, GenerationConfig::standard(Some("sys")));
        assert_eq!(options.generation.tools.len(), 1);
        assert_eq!(
            options.generation.thinking_config.and_then(|t| t.thinking_budget),
            Some(1024)
        );
        assert_eq!(options.generation.system_instruction.len(), 1);

        let null = exchange_options(&with_instruction, None, Some(json!(null))).unwrap();
        assert_eq!(null.generation, GenerationConfig::standard(Some("sys")));
    }

    #[test]
    fn test_model_name_must_be_a_plain_segment() {
        for bad in ["../../x", "gemini?key=1", "gemini#frag", "a/b", "gemini pro"] {
            let err = exchange_options(&defaults(None), Some(bad.into()), None).unwrap_err();
            assert!(matches!(err, SessionError::InvalidRequest(_)), "{bad}");
        }

        let options =
            exchange_options(&defaults(None), Some("gemini-2.5-flash_001".into()), None).unwrap();
        assert_eq!(options.model, "gemini-2.5-flash_001");
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (SessionError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SessionError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (SessionError::ProtocolViolation, StatusCode::INTERNAL_SERVER_ERROR),
            (
                SessionError::Exchange(crate::error::GatewayError::Timeout(Duration::from_secs(1))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
