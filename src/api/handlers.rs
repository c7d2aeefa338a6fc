//! HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::{stream, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agents::{
    DocumentSummarizer, DocumentSummary, SrsRequest, SrsWriter, SummaryRequest, TaskPlanRequest,
    TaskPlanResult, TaskPlanner,
};
use crate::api::models::{
    error_codes, ApiError, BudgetPreviewResponse, HealthResponse, HistoryQuery, HistoryResponse,
    HistoryView, ModelsResponse, RecordTurnsRequest,
};
use crate::context::{BudgetRequest, ContextBudgeter};
use crate::conversation::{self, ConversationStore, StoreError};
use crate::error::Error;
use crate::generation::{ChatModel, ChunkStream, GenerationError};
use crate::metrics::METRICS;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub budgeter: Arc<ContextBudgeter>,
    pub store: Arc<dyn ConversationStore>,
    pub srs_writer: Arc<SrsWriter>,
    pub task_planner: Arc<TaskPlanner>,
    pub summarizer: Arc<DocumentSummarizer>,
}

impl AppState {
    pub fn new(
        budgeter: Arc<ContextBudgeter>,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn ConversationStore>,
        default_temperature: f32,
    ) -> Self {
        Self {
            srs_writer: Arc::new(SrsWriter::new(
                model.clone(),
                budgeter.clone(),
                store.clone(),
                default_temperature,
            )),
            task_planner: Arc::new(TaskPlanner::new(
                model.clone(),
                budgeter.clone(),
                store.clone(),
                default_temperature,
            )),
            summarizer: Arc::new(DocumentSummarizer::new(model, budgeter.clone(), default_temperature)),
            budgeter,
            store,
        }
    }
}

/// Map a service error to a status and error body
fn error_response(err: Error) -> (StatusCode, Json<ApiError>) {
    let (status, code) = match &err {
        Error::Validation(_) | Error::Conversation(StoreError::InvalidSession(_)) => {
            (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
        }
        Error::ContentTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, error_codes::CONTENT_TOO_LARGE),
        Error::Generation(GenerationError::CircuitOpen(_) | GenerationError::NotConfigured(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, error_codes::UPSTREAM_UNAVAILABLE)
        }
        Error::Generation(GenerationError::Timeout(_)) => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
        Error::Generation(e) => (StatusCode::BAD_GATEWAY, e.code()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
    };

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    } else {
        warn!(status = status.as_u16(), error = %err, "Request rejected");
    }
    (status, Json(ApiError::new(code, err.to_string())))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = state.budgeter.registry();
    Json(ModelsResponse {
        default_model: registry.default_model().name.clone(),
        models: registry.iter().cloned().collect(),
    })
}

/// Run the budgeter without calling a model
///
/// POST /api/v1/budget/preview
pub async fn preview_budget(
    State(state): State<AppState>,
    Json(request): Json<BudgetRequest>,
) -> ApiResult<Json<BudgetPreviewResponse>> {
    let outcome = state
        .budgeter
        .build(&request)
        .map_err(|e| error_response(e.into()))?;
    Ok(Json(BudgetPreviewResponse::from(&outcome)))
}

/// Stream an SRS document as server-sent events
///
/// POST /api/v1/srs/generate
pub async fn generate_srs(
    State(state): State<AppState>,
    Json(request): Json<SrsRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session_id = request.session_id.clone();
    let chunks: ChunkStream = match state.srs_writer.stream(request).await {
        Ok(srs) => {
            info!(
                session_id = %session_id,
                outcome = srs.outcome.label(),
                model = srs.outcome.decision().resolved_model_name(),
                "Streaming SRS document"
            );
            srs.chunks
        }
        // Provider failures are reported in-band once the stream has begun
        Err(Error::Generation(e)) => Box::pin(stream::once(async move { Err(e) })),
        Err(e) => return Err(error_response(e)),
    };

    Ok(Sse::new(sse_events(chunks)).keep_alive(KeepAlive::default()))
}

/// One `data:` event per chunk; a failure becomes a single event carrying
/// its error code and ends the stream
fn sse_events(mut chunks: ChunkStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => yield Ok(Event::default().data(normalize_newlines(&chunk))),
                Err(e) => {
                    error!(error = %e, code = e.code(), "SRS generation failed");
                    yield Ok(Event::default().data(e.code()));
                    return;
                }
            }
        }
    }
}

// SSE field values cannot carry carriage returns
fn normalize_newlines(chunk: &str) -> String {
    chunk.replace("\r\n", "\n").replace('\r', "\n")
}

/// POST /api/v1/tasks/plan
pub async fn plan_tasks(
    State(state): State<AppState>,
    Json(request): Json<TaskPlanRequest>,
) -> ApiResult<Json<TaskPlanResult>> {
    let planned = state.task_planner.plan(request).await.map_err(error_response)?;
    Ok(Json(planned.result))
}

/// POST /api/v1/documents/summarize
pub async fn summarize_document(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> ApiResult<Json<DocumentSummary>> {
    let summary = state.summarizer.summarize(request).await.map_err(error_response)?;
    Ok(Json(summary))
}

/// GET /api/v1/sessions/:session_id/history
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let turns = state
        .store
        .turns(&session_id)
        .await
        .map_err(|e| error_response(e.into()))?;

    let text = match query.view {
        HistoryView::Full => conversation::full_history_text(&turns, query.kind),
        HistoryView::Latest => conversation::latest_turn_text(&turns, query.kind),
    };

    Ok(Json(HistoryResponse {
        session_id,
        kind: query.kind,
        view: query.view,
        text,
        turns: turns.into_iter().filter(|t| t.kind == query.kind).collect(),
    }))
}

/// POST /api/v1/sessions/:session_id/turns
pub async fn record_turns(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<RecordTurnsRequest>,
) -> ApiResult<StatusCode> {
    if request.user.trim().is_empty() && request.agent.trim().is_empty() {
        return Err(error_response(Error::Validation(
            "user and agent cannot both be empty".to_string(),
        )));
    }

    state
        .store
        .record_exchange(&session_id, request.kind, &request.user, &request.agent)
        .await
        .map_err(|e| error_response(e.into()))?;
    Ok(StatusCode::CREATED)
}
