use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::Utc;
use db::{
    models::sla::{SlaIncident, SlaTarget, UpdateSlaTarget},
    types::SlaIncidentStatus,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::sla::{SlaMetrics, SweepReport};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin, require_staff},
};

const DEFAULT_INCIDENT_LIMIT: u64 = 100;
const MAX_INCIDENT_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct IncidentQuery {
    pub status: Option<SlaIncidentStatus>,
    pub limit: Option<u64>,
}

pub async fn get_metrics(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<SlaMetrics>>, ApiError> {
    require_staff(&current)?;
    let metrics = deployment.sla().compute_metrics(Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(metrics)))
}

pub async fn get_targets(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<SlaTarget>>>, ApiError> {
    require_staff(&current)?;
    let targets = SlaTarget::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(targets)))
}

pub async fn update_target(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSlaTarget>,
) -> Result<ResponseJson<ApiResponse<SlaTarget>>, ApiError> {
    require_admin(&current)?;
    if payload.threshold_minutes.is_some_and(|minutes| minutes <= 0)
        || payload.warning_minutes.is_some_and(|minutes| minutes < 0)
    {
        return Err(ApiError::BadRequest(
            "SLA thresholds must be positive".to_string(),
        ));
    }
    let pool = &deployment.db().pool;
    if SlaTarget::find_by_key(pool, &key).await?.is_none() {
        return Err(ApiError::NotFound(format!("SLA target '{key}' not found")));
    }
    let target = SlaTarget::update(pool, &key, &payload).await?;
    tracing::info!(
        key = %target.key,
        threshold_minutes = target.threshold_minutes,
        is_active = target.is_active,
        "SLA target updated"
    );
    Ok(ResponseJson(ApiResponse::success(target)))
}

pub async fn get_incidents(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<IncidentQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<SlaIncident>>>, ApiError> {
    require_staff(&current)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_INCIDENT_LIMIT)
        .clamp(1, MAX_INCIDENT_LIMIT);
    let incidents = SlaIncident::find_recent(&deployment.db().pool, query.status, limit).await?;
    Ok(ResponseJson(ApiResponse::success(incidents)))
}

pub async fn run_sweep(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<SweepReport>>, ApiError> {
    require_admin(&current)?;
    let report = deployment
        .sla()
        .sweep(Utc::now(), deployment.automation())
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/metrics", get(get_metrics))
        .route("/targets", get(get_targets))
        .route("/targets/{key}", put(update_target))
        .route("/incidents", get(get_incidents))
        .route("/sweep", post(run_sweep));

    Router::new().nest("/sla", inner)
}
