use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    TransactionTrait,
    events::{
        AppointmentCreatedPayload, AppointmentStatusChangedPayload, SLA_APPOINTMENT_OVERRUN,
        SLA_APPOINTMENT_PENDING, TRIGGER_APPOINTMENT_CREATED, TRIGGER_APPOINTMENT_STATUS_CHANGED,
    },
    models::{
        appointment::{Appointment, AppointmentFilter, CreateAppointment, UpdateAppointment},
        user::User,
    },
    types::AppointmentStatus,
};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_admin, require_owner_or_staff},
    middleware::load_appointment_middleware,
    routes::idempotency::{
        IdempotentResponse, idempotency_key, idempotent_success, request_hash,
    },
};

const CREATE_SCOPE: &str = "appointment.create";

#[derive(Debug, Deserialize, TS)]
pub struct UpdateAppointmentStatus {
    pub status: AppointmentStatus,
}

async fn ensure_assignable_staff(
    deployment: &DeploymentImpl,
    staff_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(staff_id) = staff_id else {
        return Ok(());
    };
    match User::find_by_id(&deployment.db().pool, staff_id).await? {
        Some(user) if user.role.is_staff_or_admin() => Ok(()),
        Some(_) => Err(ApiError::BadRequest(
            "Assigned user is not a staff member".to_string(),
        )),
        None => Err(ApiError::BadRequest("Staff member not found".to_string())),
    }
}

pub async fn get_appointments(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(mut filter): Query<AppointmentFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Appointment>>>, ApiError> {
    if !current.role.is_staff_or_admin() {
        filter.customer_id = Some(current.id);
    }
    let appointments = Appointment::find_filtered(&deployment.db().pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(appointments)))
}

pub async fn create_appointment(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    Json(payload): Json<CreateAppointment>,
) -> Result<IdempotentResponse<Appointment>, ApiError> {
    let customer_id = match payload.customer_id {
        Some(customer_id) if current.role.is_staff_or_admin() => customer_id,
        _ => current.id,
    };
    let key = idempotency_key(&headers, current.id);
    let hash = request_hash(&payload)?;

    idempotent_success(
        &deployment.db().pool,
        CREATE_SCOPE,
        key,
        hash,
        StatusCode::CREATED,
        || async {
            ensure_assignable_staff(&deployment, payload.staff_id).await?;

            let tx = deployment.db().pool.begin().await?;
            let appointment = Appointment::create(&tx, customer_id, &payload).await?;
            tx.commit().await?;

            tracing::info!(
                appointment_id = %appointment.id,
                %customer_id,
                scheduled_at = %appointment.scheduled_at,
                "Appointment booked"
            );
            deployment.automation().trigger(
                TRIGGER_APPOINTMENT_CREATED,
                AppointmentCreatedPayload {
                    appointment_id: appointment.id,
                    customer_id: appointment.customer_id,
                    pet_id: appointment.pet_id,
                    staff_id: appointment.staff_id,
                    scheduled_at: appointment.scheduled_at,
                    status: appointment.status,
                },
            );
            Ok(appointment)
        },
    )
    .await
}

pub async fn get_appointment(
    Extension(current): Extension<CurrentUser>,
    Extension(appointment): Extension<Appointment>,
) -> Result<ResponseJson<ApiResponse<Appointment>>, ApiError> {
    require_owner_or_staff(&current, appointment.customer_id)?;
    Ok(ResponseJson(ApiResponse::success(appointment)))
}

pub async fn update_appointment(
    Extension(current): Extension<CurrentUser>,
    Extension(appointment): Extension<Appointment>,
    State(deployment): State<DeploymentImpl>,
    Json(mut payload): Json<UpdateAppointment>,
) -> Result<ResponseJson<ApiResponse<Appointment>>, ApiError> {
    require_owner_or_staff(&current, appointment.customer_id)?;
    if current.role.is_staff_or_admin() {
        ensure_assignable_staff(&deployment, payload.staff_id).await?;
    } else {
        // Assignment and internal notes belong to staff.
        payload.staff_id = None;
        payload.internal_notes = None;
    }

    let tx = deployment.db().pool.begin().await?;
    let updated = Appointment::update(&tx, appointment.id, &payload).await?;
    tx.commit().await?;

    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn update_appointment_status(
    Extension(current): Extension<CurrentUser>,
    Extension(appointment): Extension<Appointment>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateAppointmentStatus>,
) -> Result<ResponseJson<ApiResponse<Appointment>>, ApiError> {
    require_owner_or_staff(&current, appointment.customer_id)?;
    if !current.role.is_staff_or_admin() && payload.status != AppointmentStatus::Cancelled {
        return Err(ApiError::Forbidden(
            "Customers can only cancel appointments".to_string(),
        ));
    }

    let tx = deployment.db().pool.begin().await?;
    let change = Appointment::update_status(&tx, appointment.id, payload.status).await?;
    tx.commit().await?;

    let old_status = change.old_status;
    let updated = change.appointment;
    if old_status != updated.status {
        tracing::info!(
            appointment_id = %updated.id,
            from = %old_status,
            to = %updated.status,
            changed_by = %current.id,
            "Appointment status changed"
        );
        let automation = deployment.automation();
        automation.trigger(
            TRIGGER_APPOINTMENT_STATUS_CHANGED,
            AppointmentStatusChangedPayload {
                appointment_id: updated.id,
                customer_id: updated.customer_id,
                old_status,
                new_status: updated.status,
            },
        );
        if old_status == AppointmentStatus::Pending {
            automation.close_incidents_for_entity(SLA_APPOINTMENT_PENDING, updated.id);
        }
        if old_status == AppointmentStatus::InProgress {
            automation.close_incidents_for_entity(SLA_APPOINTMENT_OVERRUN, updated.id);
        }
    }

    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_appointment(
    Extension(current): Extension<CurrentUser>,
    Extension(appointment): Extension<Appointment>,
    State(deployment): State<DeploymentImpl>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<()>>), ApiError> {
    require_admin(&current)?;
    let rows_affected = Appointment::delete(&deployment.db().pool, appointment.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Appointment not found".to_string()));
    }
    tracing::info!(appointment_id = %appointment.id, "Appointment deleted");
    Ok((StatusCode::OK, ResponseJson(ApiResponse::success(()))))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let appointment_router = Router::new()
        .route(
            "/",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/status", put(update_appointment_status))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_appointment_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(get_appointments).post(create_appointment))
        .nest("/{appointment_id}", appointment_router);

    Router::new().nest("/appointments", inner)
}
