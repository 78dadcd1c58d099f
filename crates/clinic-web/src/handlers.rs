//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use clinic_core::{ActorContext, ClinicError, Visit, VisitStage};
use clinic_workflow::{QueueSnapshot, WorkflowEngine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// API错误包装（错误分类到HTTP状态码的唯一映射点）
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            ClinicError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ClinicError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ClinicError::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            ClinicError::StageMismatch { .. } => (StatusCode::CONFLICT, "stage_mismatch"),
            ClinicError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
            ClinicError::AlreadyClockedIn { .. } => (StatusCode::CONFLICT, "already_clocked_in"),
            ClinicError::AlreadyCompleted(_) => (StatusCode::CONFLICT, "already_completed"),
            ClinicError::WrongStage { .. } => (StatusCode::CONFLICT, "wrong_stage"),
            ClinicError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ClinicError::Serialization(_) => (StatusCode::BAD_REQUEST, "serialization"),
            ClinicError::UpstreamUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream_unavailable")
            }
            ClinicError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let body = Json(json!({
            "error": true,
            "code": code,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// 变更操作的响应：就诊记录加副作用降级警告
#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub visit: Visit,
    pub warnings: Vec<String>,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Clinic Visit Workflow API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "api": "/api/v1"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub admission_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ClockInRequest {
    pub stage: VisitStage,
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    pub from_stage: VisitStage,
    pub to_stage: VisitStage,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetStageRequest {
    pub stage: VisitStage,
}

#[derive(Debug, Deserialize)]
pub struct QueueQueryParams {
    pub branch_id: Option<Uuid>,
}

/// 前台签入处理器
pub async fn create_visit(
    State(engine): State<Arc<WorkflowEngine>>,
    Extension(ctx): Extension<ActorContext>,
    Json(request): Json<CreateVisitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating visit for patient {}", request.patient_id);
    let visit = engine
        .create_visit(
            &ctx,
            request.patient_id,
            request.appointment_id,
            request.admission_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

/// 就诊查询处理器
pub async fn get_visit(
    State(engine): State<Arc<WorkflowEngine>>,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<Visit>, ApiError> {
    let visit = engine.get_visit(visit_id).await?;
    Ok(Json(visit))
}

/// 环节签到处理器
pub async fn clock_in(
    State(engine): State<Arc<WorkflowEngine>>,
    Extension(ctx): Extension<ActorContext>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<ClockInRequest>,
) -> Result<Json<VisitResponse>, ApiError> {
    let outcome = engine
        .clock_in(&ctx, visit_id, request.stage, request.payload)
        .await?;
    Ok(Json(VisitResponse {
        visit: outcome.visit,
        warnings: outcome.warnings,
    }))
}

/// 环节交接处理器
pub async fn handoff(
    State(engine): State<Arc<WorkflowEngine>>,
    Extension(ctx): Extension<ActorContext>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<HandoffRequest>,
) -> Result<Json<VisitResponse>, ApiError> {
    let outcome = engine
        .handoff(&ctx, visit_id, request.from_stage, request.to_stage)
        .await?;
    Ok(Json(VisitResponse {
        visit: outcome.visit,
        warnings: outcome.warnings,
    }))
}

/// 最终结账处理器
pub async fn final_checkout(
    State(engine): State<Arc<WorkflowEngine>>,
    Extension(ctx): Extension<ActorContext>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<VisitResponse>, ApiError> {
    let outcome = engine.final_checkout(&ctx, visit_id, request.notes).await?;
    Ok(Json(VisitResponse {
        visit: outcome.visit,
        warnings: outcome.warnings,
    }))
}

/// 管理员环节重置处理器
pub async fn reset_stage(
    State(engine): State<Arc<WorkflowEngine>>,
    Extension(ctx): Extension<ActorContext>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<ResetStageRequest>,
) -> Result<Json<Visit>, ApiError> {
    let visit = engine
        .admin_reset_stage(&ctx, visit_id, request.stage)
        .await?;
    Ok(Json(visit))
}

/// 队列看板处理器（每次请求重新聚合，不缓存）
pub async fn queue_snapshot(
    State(engine): State<Arc<WorkflowEngine>>,
    Query(params): Query<QueueQueryParams>,
) -> Result<Json<QueueSnapshot>, ApiError> {
    let snapshot = engine.queue_snapshot(params.branch_id).await;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = vec![
            (
                ClinicError::NotFound("visit x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                ClinicError::Forbidden("nope".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                ClinicError::IllegalTransition {
                    from: VisitStage::FrontDesk,
                    to: VisitStage::Billing,
                },
                StatusCode::CONFLICT,
            ),
            (
                ClinicError::AlreadyClockedIn {
                    stage: VisitStage::Nurse,
                },
                StatusCode::CONFLICT,
            ),
            (
                ClinicError::Validation("bad header".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ClinicError::UpstreamUnavailable("billing".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
