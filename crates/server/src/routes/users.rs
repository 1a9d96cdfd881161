use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    models::user::{UpdateUser, User},
    types::UserRole,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::auth::RegisterRequest;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin, require_owner_or_staff, require_staff},
    middleware::load_user_middleware,
};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateAccountRequest {
    #[serde(flatten)]
    pub account: RegisterRequest,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize, TS)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

pub async fn get_users(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<UserQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    require_staff(&current)?;
    let role = query.role.unwrap_or(UserRole::Customer);
    let users = User::find_by_role(&deployment.db().pool, role).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn create_user(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<User>>), ApiError> {
    require_admin(&current)?;
    let user = deployment
        .auth()
        .create_account(&deployment.db().pool, &payload.account, payload.role)
        .await?;
    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        created_by = %current.id,
        "Admin created account"
    );
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(user))))
}

pub async fn get_user(
    Extension(current): Extension<CurrentUser>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    require_owner_or_staff(&current, user.id)?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn update_user(
    Extension(current): Extension<CurrentUser>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    if current.id != user.id {
        require_admin(&current)?;
    }
    let updated = User::update(&deployment.db().pool, user.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn set_user_role(
    Extension(current): Extension<CurrentUser>,
    Extension(user): Extension<User>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    require_admin(&current)?;
    if current.id == user.id && payload.role != UserRole::Admin {
        return Err(ApiError::BadRequest(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }
    let updated = User::set_role(&deployment.db().pool, user.id, payload.role).await?;
    tracing::info!(
        user_id = %updated.id,
        from = %user.role,
        to = %updated.role,
        "User role changed"
    );
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let user_router = Router::new()
        .route("/", get(get_user).put(update_user))
        .route("/role", put(set_user_role))
        .layer(from_fn_with_state(deployment.clone(), load_user_middleware::<DeploymentImpl>));

    let inner = Router::new()
        .route("/", get(get_users).post(create_user))
        .nest("/{user_id}", user_router);

    Router::new().nest("/users", inner)
}
