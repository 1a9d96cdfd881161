use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use db::{
    TransactionTrait,
    models::notification::{CategoryPreference, Notification, NotificationPreference},
    types::NotificationStatus,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl, error::ApiError, http::auth::CurrentUser,
    middleware::load_notification_middleware,
};

const DEFAULT_INBOX_LIMIT: u64 = 50;
const MAX_INBOX_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateNotificationStatus {
    pub status: NotificationStatus,
    #[serde(default)]
    pub snoozed_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, TS)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Serialize, TS)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn get_inbox(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<InboxQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_INBOX_LIMIT)
        .clamp(1, MAX_INBOX_LIMIT);
    let notifications =
        Notification::find_inbox(&deployment.db().pool, current.id, Utc::now(), limit).await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub async fn get_unread_count(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<UnreadCount>>, ApiError> {
    let count = Notification::count_unread(&deployment.db().pool, current.id).await?;
    Ok(ResponseJson(ApiResponse::success(UnreadCount { count })))
}

pub async fn mark_all_read(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<MarkAllReadResponse>>, ApiError> {
    let updated = Notification::mark_all_read(&deployment.db().pool, current.id).await?;
    Ok(ResponseJson(ApiResponse::success(MarkAllReadResponse {
        updated,
    })))
}

pub async fn update_notification_status(
    Extension(current): Extension<CurrentUser>,
    Extension(notification): Extension<Notification>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateNotificationStatus>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    // Other users' notifications are reported as missing.
    if notification.user_id != current.id {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    let snoozed_until = match payload.status {
        NotificationStatus::Snoozed => {
            let until = payload.snoozed_until.ok_or_else(|| {
                ApiError::BadRequest("snoozed_until is required when snoozing".to_string())
            })?;
            if until <= Utc::now() {
                return Err(ApiError::BadRequest(
                    "snoozed_until must be in the future".to_string(),
                ));
            }
            Some(until)
        }
        _ => None,
    };

    let updated = Notification::set_status(
        &deployment.db().pool,
        notification.id,
        payload.status,
        snoozed_until,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn get_preferences(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<CategoryPreference>>>, ApiError> {
    let preferences =
        NotificationPreference::find_for_user(&deployment.db().pool, current.id).await?;
    Ok(ResponseJson(ApiResponse::success(preferences)))
}

pub async fn update_preferences(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(preferences): Json<Vec<CategoryPreference>>,
) -> Result<ResponseJson<ApiResponse<Vec<CategoryPreference>>>, ApiError> {
    if preferences
        .iter()
        .any(|preference| preference.category.trim().is_empty())
    {
        return Err(ApiError::BadRequest("category is required".to_string()));
    }

    let tx = deployment.db().pool.begin().await?;
    for preference in &preferences {
        NotificationPreference::upsert(&tx, current.id, preference).await?;
    }
    tx.commit().await?;

    let saved = NotificationPreference::find_for_user(&deployment.db().pool, current.id).await?;
    Ok(ResponseJson(ApiResponse::success(saved)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let notification_router = Router::new()
        .route("/status", put(update_notification_status))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_notification_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(get_inbox))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/preferences", get(get_preferences).put(update_preferences))
        .nest("/{notification_id}", notification_router);

    Router::new().nest("/notifications", inner)
}
