use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::NaiveDate;
use db::{
    TransactionTrait,
    models::{staff_availability::StaffAvailability, user::User},
    types::UserRole,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::booking::{Slot, slots_for_staff};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin},
    middleware::load_user_middleware,
};

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

fn ensure_staff_member(user: &User) -> Result<(), ApiError> {
    if user.role.is_staff_or_admin() {
        Ok(())
    } else {
        Err(ApiError::NotFound("Staff member not found".to_string()))
    }
}

pub async fn get_staff(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let staff = User::find_by_role(&deployment.db().pool, UserRole::Staff).await?;
    Ok(ResponseJson(ApiResponse::success(staff)))
}

pub async fn get_availability(
    Extension(staff): Extension<User>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<StaffAvailability>>>, ApiError> {
    ensure_staff_member(&staff)?;
    let windows = StaffAvailability::find_for_staff(&deployment.db().pool, staff.id).await?;
    Ok(ResponseJson(ApiResponse::success(windows)))
}

/// Replaces the weekly table. Staff edit their own; admins edit anyone's.
pub async fn update_availability(
    Extension(current): Extension<CurrentUser>,
    Extension(staff): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(windows): Json<Vec<StaffAvailability>>,
) -> Result<ResponseJson<ApiResponse<Vec<StaffAvailability>>>, ApiError> {
    ensure_staff_member(&staff)?;
    if current.id != staff.id {
        require_admin(&current)?;
    }

    let tx = deployment.db().pool.begin().await?;
    let saved = StaffAvailability::replace_for_staff(&tx, staff.id, &windows).await?;
    tx.commit().await?;

    tracing::info!(staff_id = %staff.id, days = saved.len(), "Availability updated");
    Ok(ResponseJson(ApiResponse::success(saved)))
}

pub async fn get_slots(
    Extension(staff): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<SlotQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Slot>>>, ApiError> {
    ensure_staff_member(&staff)?;
    let (slot_minutes, offset) = {
        let config = deployment.config().read().await;
        (config.business.slot_minutes, config.business.offset())
    };
    let slots = slots_for_staff(
        &deployment.db().pool,
        staff.id,
        query.date,
        slot_minutes,
        offset,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(slots)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let member_router = Router::new()
        .route(
            "/availability",
            get(get_availability).put(update_availability),
        )
        .route("/slots", get(get_slots))
        .layer(from_fn_with_state(deployment.clone(), load_user_middleware::<DeploymentImpl>));

    let inner = Router::new()
        .route("/", get(get_staff))
        .nest("/{user_id}", member_router);

    Router::new().nest("/staff", inner)
}
