use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    appointment::MAX_APPOINTMENT_MINUTES,
    grooming_service::{CreateGroomingService, GroomingService, UpdateGroomingService},
};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin},
};

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

fn validate_pricing(
    price_cents: Option<i64>,
    duration_minutes: Option<i32>,
) -> Result<(), ApiError> {
    if price_cents.is_some_and(|price| price < 0) {
        return Err(ApiError::BadRequest(
            "price_cents cannot be negative".to_string(),
        ));
    }
    if duration_minutes.is_some_and(|minutes| minutes <= 0) {
        return Err(ApiError::BadRequest(
            "duration_minutes must be positive".to_string(),
        ));
    }
    if duration_minutes.is_some_and(|minutes| i64::from(minutes) > MAX_APPOINTMENT_MINUTES) {
        return Err(ApiError::BadRequest(format!(
            "duration_minutes cannot exceed {MAX_APPOINTMENT_MINUTES}"
        )));
    }
    Ok(())
}

pub async fn get_services(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<CatalogQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<GroomingService>>>, ApiError> {
    let include_inactive = query.include_inactive && current.role.is_staff_or_admin();
    let services = GroomingService::find_all(&deployment.db().pool, include_inactive).await?;
    Ok(ResponseJson(ApiResponse::success(services)))
}

pub async fn get_service(
    State(deployment): State<DeploymentImpl>,
    Path(service_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<GroomingService>>, ApiError> {
    let service = GroomingService::find_by_id(&deployment.db().pool, service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub async fn create_service(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateGroomingService>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<GroomingService>>), ApiError> {
    require_admin(&current)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Service name is required".to_string()));
    }
    validate_pricing(Some(payload.price_cents), Some(payload.duration_minutes))?;

    let service = GroomingService::create(&deployment.db().pool, &payload).await?;
    tracing::info!(service_id = %service.id, name = %service.name, "Service added to catalog");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(service))))
}

pub async fn update_service(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<UpdateGroomingService>,
) -> Result<ResponseJson<ApiResponse<GroomingService>>, ApiError> {
    require_admin(&current)?;
    validate_pricing(payload.price_cents, payload.duration_minutes)?;
    let pool = &deployment.db().pool;
    if GroomingService::find_by_id(pool, service_id).await?.is_none() {
        return Err(ApiError::NotFound("Service not found".to_string()));
    }
    let service = GroomingService::update(pool, service_id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(service)))
}

/// Services are deactivated rather than removed so past appointments keep
/// their lines.
pub async fn deactivate_service(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Path(service_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<GroomingService>>, ApiError> {
    require_admin(&current)?;
    let pool = &deployment.db().pool;
    if GroomingService::find_by_id(pool, service_id).await?.is_none() {
        return Err(ApiError::NotFound("Service not found".to_string()));
    }
    let service = GroomingService::deactivate(pool, service_id).await?;
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub fn router() -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_services).post(create_service))
        .route(
            "/{service_id}",
            get(get_service)
                .put(update_service)
                .delete(deactivate_service),
        );

    Router::new().nest("/services", inner)
}
