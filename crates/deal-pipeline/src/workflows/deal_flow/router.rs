use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{FlowId, PropertyRecord, StageId};
use super::engine::{DealFlowEngine, PipelineError};

#[derive(Debug, Deserialize)]
pub(crate) struct AdvanceRequest {
    pub stage: StageId,
}

/// Router builder exposing the pipeline operations and registry queries.
pub fn pipeline_router(engine: DealFlowEngine) -> Router {
    Router::new()
        .route(
            "/api/v1/deal-flows",
            post(submit_handler).get(active_flows_handler),
        )
        .route("/api/v1/deal-flows/:flow_id", get(flow_handler))
        .route("/api/v1/deal-flows/:flow_id/advance", post(advance_handler))
        .route("/api/v1/deal-flows/:flow_id/pause", post(pause_handler))
        .route("/api/v1/deal-flows/:flow_id/resume", post(resume_handler))
        .route(
            "/api/v1/pipeline/stages/:stage_id/flows",
            get(stage_flows_handler),
        )
        .route("/api/v1/pipeline/stats", get(stats_handler))
        .with_state(engine)
}

pub(crate) async fn submit_handler(
    State(engine): State<DealFlowEngine>,
    axum::Json(record): axum::Json<PropertyRecord>,
) -> Response {
    let flow = match engine.submit_new_record(record).await {
        Ok(flow_id) => engine.get_flow(&flow_id),
        Err(error) => Err(error),
    };

    match flow {
        Ok(flow) => (StatusCode::ACCEPTED, axum::Json(flow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn active_flows_handler(State(engine): State<DealFlowEngine>) -> Response {
    match engine.list_active_flows() {
        Ok(flows) => (StatusCode::OK, axum::Json(flows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn flow_handler(
    State(engine): State<DealFlowEngine>,
    Path(flow_id): Path<String>,
) -> Response {
    match engine.get_flow(&FlowId(flow_id)) {
        Ok(flow) => (StatusCode::OK, axum::Json(flow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler(
    State(engine): State<DealFlowEngine>,
    Path(flow_id): Path<String>,
    axum::Json(request): axum::Json<AdvanceRequest>,
) -> Response {
    match engine
        .advance_to_stage(&FlowId(flow_id), &request.stage)
        .await
    {
        Ok(flow) => (StatusCode::OK, axum::Json(flow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pause_handler(
    State(engine): State<DealFlowEngine>,
    Path(flow_id): Path<String>,
) -> Response {
    match engine.pause_auto_actions(&FlowId(flow_id)).await {
        Ok(flow) => (StatusCode::OK, axum::Json(flow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resume_handler(
    State(engine): State<DealFlowEngine>,
    Path(flow_id): Path<String>,
) -> Response {
    match engine.resume_auto_actions(&FlowId(flow_id)).await {
        Ok(flow) => (StatusCode::OK, axum::Json(flow)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stage_flows_handler(
    State(engine): State<DealFlowEngine>,
    Path(stage_id): Path<String>,
) -> Response {
    match engine.list_flows_by_stage(&StageId(stage_id)) {
        Ok(flows) => (StatusCode::OK, axum::Json(flows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stats_handler(State(engine): State<DealFlowEngine>) -> Response {
    match engine.pipeline_stats() {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::UnknownFlow(_) => StatusCode::NOT_FOUND,
        PipelineError::UnknownStage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::DuplicateSubject { .. } | PipelineError::TerminalFlow { .. } => {
            StatusCode::CONFLICT
        }
        PipelineError::UnknownSubject(_) | PipelineError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
