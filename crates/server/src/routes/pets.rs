use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::pet::{CreatePet, Pet, UpdatePet};
use deployment::Deployment;
use serde::Deserialize;
use services::services::uploads::UploadKind;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_owner_or_staff},
    middleware::load_pet_middleware,
    routes::uploads::{UPLOAD_BODY_LIMIT, read_image_part},
};

#[derive(Debug, Deserialize)]
pub struct PetQuery {
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreatePetRequest {
    #[serde(flatten)]
    pub pet: CreatePet,
    /// Staff register pets on behalf of a customer.
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

pub async fn get_pets(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<PetQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Pet>>>, ApiError> {
    let pool = &deployment.db().pool;
    let pets = if current.role.is_staff_or_admin() {
        match query.owner_id {
            Some(owner_id) => Pet::find_by_owner(pool, owner_id).await?,
            None => Pet::find_all(pool).await?,
        }
    } else {
        Pet::find_by_owner(pool, current.id).await?
    };
    Ok(ResponseJson(ApiResponse::success(pets)))
}

pub async fn create_pet(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreatePetRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Pet>>), ApiError> {
    if payload.pet.name.trim().is_empty() || payload.pet.species.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Pet name and species are required".to_string(),
        ));
    }
    let owner_id = match payload.owner_id {
        Some(owner_id) if owner_id != current.id => {
            require_owner_or_staff(&current, owner_id)?;
            owner_id
        }
        _ => current.id,
    };

    let pet = Pet::create(&deployment.db().pool, owner_id, &payload.pet).await?;
    tracing::debug!(pet_id = %pet.id, %owner_id, "Pet registered");
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(pet))))
}

pub async fn get_pet(
    Extension(current): Extension<CurrentUser>,
    Extension(pet): Extension<Pet>,
) -> Result<ResponseJson<ApiResponse<Pet>>, ApiError> {
    require_owner_or_staff(&current, pet.owner_id)?;
    Ok(ResponseJson(ApiResponse::success(pet)))
}

pub async fn update_pet(
    Extension(current): Extension<CurrentUser>,
    Extension(pet): Extension<Pet>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdatePet>,
) -> Result<ResponseJson<ApiResponse<Pet>>, ApiError> {
    require_owner_or_staff(&current, pet.owner_id)?;
    let updated = Pet::update(&deployment.db().pool, pet.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_pet(
    Extension(current): Extension<CurrentUser>,
    Extension(pet): Extension<Pet>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_owner_or_staff(&current, pet.owner_id)?;
    let rows_affected = Pet::delete(&deployment.db().pool, pet.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Pet not found".to_string()));
    }
    if let Some(photo_url) = pet.photo_url.as_deref() {
        deployment.uploads().remove_by_url(photo_url).await;
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn upload_pet_photo(
    Extension(current): Extension<CurrentUser>,
    Extension(pet): Extension<Pet>,
    State(deployment): State<DeploymentImpl>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<Pet>>, ApiError> {
    require_owner_or_staff(&current, pet.owner_id)?;
    let image = read_image_part(multipart).await?;
    let stored = deployment
        .uploads()
        .store(UploadKind::Pets, &image.content_type, &image.bytes)
        .await?;

    let updated = match Pet::set_photo_url(&deployment.db().pool, pet.id, Some(stored.url.clone()))
        .await
    {
        Ok(updated) => updated,
        Err(err) => {
            deployment.uploads().remove_by_url(&stored.url).await;
            return Err(err.into());
        }
    };
    if let Some(previous) = pet.photo_url.as_deref() {
        deployment.uploads().remove_by_url(previous).await;
    }
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let pet_router = Router::new()
        .route("/", get(get_pet).put(update_pet).delete(delete_pet))
        .route(
            "/photo",
            post(upload_pet_photo).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .layer(from_fn_with_state(deployment.clone(), load_pet_middleware::<DeploymentImpl>));

    let inner = Router::new()
        .route("/", get(get_pets).post(create_pet))
        .nest("/{pet_id}", pet_router);

    Router::new().nest("/pets", inner)
}
