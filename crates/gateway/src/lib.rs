use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::Utc;
use runtime::ChatService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use types::{ChatReply, ChatRequest, NewFeedback, format_timestamp};

mod api;
mod error;

pub use api::{
    AckResponse, ChatBody, ComponentStatus, DEFAULT_END_REASON, EndSessionBody, FeedbackBody,
    HealthResponse, SessionStatsResponse, StatusResponse, TransferBody, TransferResponse,
};
pub use error::{ApiError, ErrorBody, FailureKind};

pub const API_PREFIX: &str = "/api/v1";
const VERSION: &str = env!("CARGO_PKG_VERSION");

const FEEDBACK_SAVED: &str = "Thank you for your feedback!";
const SESSION_ENDED: &str = "Session ended successfully. Thank you for using our service!";
const TRANSFER_REQUESTED: &str = "Connecting you to a human agent. Please wait a moment...";

type ApiResult<T> = Result<Json<T>, ApiError>;

/// HTTP front end over a shared [`ChatService`].
pub struct GatewayServer {
    chat: Arc<ChatService>,
}

impl GatewayServer {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    pub fn router(self: Arc<Self>) -> Router {
        let api = Router::new()
            .route("/chat", post(Self::chat))
            .route("/feedback", post(Self::feedback))
            .route("/save-feedback", post(Self::feedback))
            .route("/session/end", post(Self::end_session))
            .route("/transfer", post(Self::transfer))
            .route("/session/{id}/stats", get(Self::session_stats))
            .route("/health", get(Self::health))
            .route("/status", get(Self::status));

        Router::new()
            .nest(API_PREFIX, api)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    async fn chat(
        State(server): State<Arc<Self>>,
        body: Result<Json<ChatBody>, JsonRejection>,
    ) -> ApiResult<ChatReply> {
        let Json(body) = body?;
        let reply = server
            .chat
            .handle(ChatRequest {
                user_text: body.user_text,
                session_id: body.session_id,
            })
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::Processing, error))?;
        Ok(Json(reply))
    }

    async fn feedback(
        State(server): State<Arc<Self>>,
        body: Result<Json<FeedbackBody>, JsonRejection>,
    ) -> ApiResult<AckResponse> {
        let Json(body) = body?;
        let feedback = NewFeedback::from(body);
        let saved = server
            .chat
            .sessions()
            .save_feedback(&feedback)
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::Feedback, error))?;
        if !saved {
            return Err(ApiError::feedback_target_not_found());
        }
        Ok(Json(AckResponse::ok(FEEDBACK_SAVED)))
    }

    async fn end_session(
        State(server): State<Arc<Self>>,
        body: Result<Json<EndSessionBody>, JsonRejection>,
    ) -> ApiResult<AckResponse> {
        let Json(body) = body?;
        let ended = server
            .chat
            .sessions()
            .end(&body.session_id, &body.end_reason)
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::SessionEnd, error))?;
        if !ended {
            return Err(ApiError::session_not_found(
                "Session not found or already ended",
            ));
        }
        Ok(Json(AckResponse::ok(SESSION_ENDED)))
    }

    async fn transfer(
        State(server): State<Arc<Self>>,
        body: Result<Json<TransferBody>, JsonRejection>,
    ) -> ApiResult<TransferResponse> {
        let Json(body) = body?;
        let transfer_id = server
            .chat
            .sessions()
            .request_transfer(&body.session_id, body.reason.as_deref())
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::Transfer, error))?
            .ok_or_else(|| ApiError::session_not_found("Session not found"))?;
        Ok(Json(TransferResponse {
            success: true,
            message: TRANSFER_REQUESTED.to_owned(),
            transfer_id,
        }))
    }

    async fn session_stats(
        State(server): State<Arc<Self>>,
        Path(session_id): Path<String>,
    ) -> ApiResult<SessionStatsResponse> {
        let stats = server
            .chat
            .sessions()
            .stats(&session_id)
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::Stats, error))?
            .ok_or_else(|| ApiError::session_not_found("Session not found or expired"))?;
        Ok(Json(SessionStatsResponse {
            session_id: stats.session_id,
            created_at: format_timestamp(stats.created_at),
            last_activity: format_timestamp(stats.last_activity),
            total_turns: stats.total_turns,
            intents_used: stats.intents_used,
            avg_confidence: stats.avg_confidence,
        }))
    }

    async fn health() -> Json<HealthResponse> {
        Json(HealthResponse {
            ok: true,
            timestamp: format_timestamp(Utc::now()),
            version: VERSION.to_owned(),
        })
    }

    async fn status(State(server): State<Arc<Self>>) -> ApiResult<StatusResponse> {
        let overview = server
            .chat
            .sessions()
            .overview()
            .await
            .map_err(|error| ApiError::from_runtime(FailureKind::Stats, error))?;
        let session_statistics = serde_json::to_value(&overview).map_err(|error| {
            ApiError::from_runtime(FailureKind::Stats, types::StoreError::from(error).into())
        })?;
        Ok(Json(StatusResponse {
            status: "healthy".to_owned(),
            timestamp: format_timestamp(Utc::now()),
            version: VERSION.to_owned(),
            session_statistics,
            components: ComponentStatus::all_active(),
        }))
    }
}
