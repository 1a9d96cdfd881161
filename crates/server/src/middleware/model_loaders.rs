use std::{fmt::Display, future::Future};

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::{
    DBService,
    models::{
        appointment::Appointment, conversation::Conversation, notification::Notification,
        payment::Payment, pet::Pet, user::User, workflow::Workflow,
    },
};
use deployment::Deployment;
use uuid::Uuid;

use crate::error::ApiError;

pub trait ModelLoaderDeps {
    fn db_service(&self) -> &DBService;
}

impl<D> ModelLoaderDeps for D
where
    D: Deployment,
{
    fn db_service(&self) -> &DBService {
        self.db()
    }
}

/// Missing rows surface as the usual 404 envelope; lookup failures are
/// logged here and reported without the underlying detail.
async fn fetch_model<M, E, Fut>(
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<M, ApiError>
where
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    match load_future.await {
        Ok(Some(model)) => Ok(model),
        Ok(None) => {
            tracing::debug!(%model_id, "{model_name} not found");
            Err(ApiError::NotFound(format!("{model_name} not found")))
        }
        Err(error) => {
            tracing::error!(%model_id, "Failed to load {model_name}: {error}");
            Err(ApiError::Internal(format!("Failed to load {model_name}")))
        }
    }
}

async fn load_request_extension<M, E, Fut>(
    mut request: Request,
    next: Next,
    model_name: &'static str,
    model_id: Uuid,
    load_future: Fut,
) -> Result<Response, ApiError>
where
    M: Clone + Send + Sync + 'static,
    E: Display,
    Fut: Future<Output = Result<Option<M>, E>>,
{
    let model = fetch_model(model_name, model_id, load_future).await?;
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_user_middleware<S>(
    State(deployment): State<S>,
    Path(user_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "User",
        user_id,
        User::find_by_id(&deployment.db_service().pool, user_id),
    )
    .await
}

pub async fn load_pet_middleware<S>(
    State(deployment): State<S>,
    Path(pet_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Pet",
        pet_id,
        Pet::find_by_id(&deployment.db_service().pool, pet_id),
    )
    .await
}

pub async fn load_appointment_middleware<S>(
    State(deployment): State<S>,
    Path(appointment_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Appointment",
        appointment_id,
        Appointment::find_by_id(&deployment.db_service().pool, appointment_id),
    )
    .await
}

pub async fn load_payment_middleware<S>(
    State(deployment): State<S>,
    Path(payment_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Payment",
        payment_id,
        Payment::find_by_id(&deployment.db_service().pool, payment_id),
    )
    .await
}

pub async fn load_conversation_middleware<S>(
    State(deployment): State<S>,
    Path(conversation_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Conversation",
        conversation_id,
        Conversation::find_by_id(&deployment.db_service().pool, conversation_id),
    )
    .await
}

pub async fn load_notification_middleware<S>(
    State(deployment): State<S>,
    Path(notification_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Notification",
        notification_id,
        Notification::find_by_id(&deployment.db_service().pool, notification_id),
    )
    .await
}

pub async fn load_workflow_middleware<S>(
    State(deployment): State<S>,
    Path(workflow_id): Path<Uuid>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: ModelLoaderDeps,
{
    load_request_extension(
        request,
        next,
        "Workflow",
        workflow_id,
        Workflow::find_by_id(&deployment.db_service().pool, workflow_id),
    )
    .await
}
