use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    workflow::{CreateWorkflow, UpdateWorkflow, Workflow},
    workflow_run::WorkflowRun,
};
use deployment::Deployment;
use serde_json::Value;
use services::services::automation::TriggerEvent;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin, require_staff},
    middleware::load_workflow_middleware,
};

pub async fn get_workflows(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Workflow>>>, ApiError> {
    require_staff(&current)?;
    let workflows = Workflow::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(workflows)))
}

pub async fn create_workflow(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateWorkflow>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Workflow>>), ApiError> {
    require_staff(&current)?;
    let workflow = Workflow::create(&deployment.db().pool, &payload).await?;
    tracing::info!(
        workflow_id = %workflow.id,
        trigger_type = %workflow.trigger_type,
        actions = workflow.actions.len(),
        "Workflow created"
    );
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(workflow)),
    ))
}

pub async fn get_workflow(
    Extension(current): Extension<CurrentUser>,
    Extension(workflow): Extension<Workflow>,
) -> Result<ResponseJson<ApiResponse<Workflow>>, ApiError> {
    require_staff(&current)?;
    Ok(ResponseJson(ApiResponse::success(workflow)))
}

pub async fn update_workflow(
    Extension(current): Extension<CurrentUser>,
    Extension(workflow): Extension<Workflow>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateWorkflow>,
) -> Result<ResponseJson<ApiResponse<Workflow>>, ApiError> {
    require_staff(&current)?;
    let updated = Workflow::update(&deployment.db().pool, workflow.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_workflow(
    Extension(current): Extension<CurrentUser>,
    Extension(workflow): Extension<Workflow>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require_staff(&current)?;
    let rows_affected = Workflow::delete(&deployment.db().pool, workflow.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Workflow not found".to_string()));
    }
    tracing::info!(workflow_id = %workflow.id, "Workflow deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_workflow_runs(
    Extension(current): Extension<CurrentUser>,
    Extension(workflow): Extension<Workflow>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkflowRun>>>, ApiError> {
    require_staff(&current)?;
    let limit = deployment.config().read().await.automation.run_history_limit;
    let runs = WorkflowRun::find_by_workflow(&deployment.db().pool, workflow.id, limit).await?;
    Ok(ResponseJson(ApiResponse::success(runs)))
}

/// Replays an event through the engine and waits for the matching to finish.
pub async fn trigger_manually(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(mut event): Json<TriggerEvent>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkflowRun>>>, ApiError> {
    require_admin(&current)?;
    event.trigger_type = event.trigger_type.trim().to_string();
    if event.trigger_type.is_empty() {
        return Err(ApiError::BadRequest("trigger_type is required".to_string()));
    }
    match event.payload {
        Value::Object(_) => {}
        Value::Null => event.payload = Value::Object(Default::default()),
        _ => {
            return Err(ApiError::BadRequest(
                "payload must be a JSON object".to_string(),
            ));
        }
    }

    let runs = deployment.automation_engine().handle_trigger(&event).await?;
    tracing::info!(
        trigger_type = %event.trigger_type,
        runs = runs.len(),
        triggered_by = %current.id,
        "Manual trigger processed"
    );
    Ok(ResponseJson(ApiResponse::success(runs)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let workflow_router = Router::new()
        .route(
            "/",
            get(get_workflow)
                .put(update_workflow)
                .delete(delete_workflow),
        )
        .route("/runs", get(get_workflow_runs))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_workflow_middleware::<DeploymentImpl>,
        ));

    let workflows = Router::new()
        .route("/", get(get_workflows).post(create_workflow))
        .nest("/{workflow_id}", workflow_router);

    let inner = Router::new()
        .nest("/workflows", workflows)
        .route("/trigger", post(trigger_manually));

    Router::new().nest("/automation", inner)
}
