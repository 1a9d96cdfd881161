use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::{UpdateUser, User};
use deployment::Deployment;
use services::services::{
    auth::{AuthSession, LoginRequest, RegisterRequest},
    uploads::UploadKind,
};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::CurrentUser,
    routes::uploads::{UPLOAD_BODY_LIMIT, read_image_part},
};

pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthSession>>), ApiError> {
    let allowed = deployment.config().read().await.auth.allow_self_registration;
    if !allowed {
        return Err(ApiError::Forbidden(
            "Self registration is disabled".to_string(),
        ));
    }

    let session = deployment
        .auth()
        .register(&deployment.db().pool, &payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(session)),
    ))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthSession>>, ApiError> {
    let session = deployment
        .auth()
        .login(&deployment.db().pool, &payload)
        .await
        .inspect_err(|_| tracing::info!("Failed login attempt"))?;
    tracing::debug!(user_id = %session.user.id, "User signed in");
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn get_me(
    Extension(user): Extension<CurrentUser>,
) -> ResponseJson<ApiResponse<User>> {
    ResponseJson(ApiResponse::success(user.0))
}

pub async fn update_me(
    Extension(user): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    if payload
        .full_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ApiError::BadRequest("Full name cannot be empty".to_string()));
    }
    let updated = User::update(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn upload_avatar(
    Extension(user): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let image = read_image_part(multipart).await?;
    let stored = deployment
        .uploads()
        .store(UploadKind::Avatars, &image.content_type, &image.bytes)
        .await?;

    let updated =
        User::set_avatar_url(&deployment.db().pool, user.id, Some(stored.url.clone())).await;
    let updated = match updated {
        Ok(updated) => updated,
        Err(err) => {
            deployment.uploads().remove_by_url(&stored.url).await;
            return Err(err.into());
        }
    };
    if let Some(previous) = user.avatar_url.as_deref() {
        deployment.uploads().remove_by_url(previous).await;
    }
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// Routes reachable without a token.
pub fn public_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/auth/me", get(get_me).put(update_me))
        .route(
            "/auth/me/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}
