use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    events::{PaymentCreatedPayload, TRIGGER_PAYMENT_CREATED},
    models::{
        appointment::Appointment,
        payment::{CreatePayment, Payment},
    },
    types::{AppointmentStatus, PaymentStatus},
};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_owner_or_staff, require_staff},
    middleware::load_payment_middleware,
    routes::idempotency::{
        IdempotentResponse, idempotency_key, idempotent_success, request_hash,
    },
};

const CREATE_SCOPE: &str = "payment.create";

#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdatePaymentStatus {
    pub status: PaymentStatus,
}

pub async fn get_payments(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<PaymentQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Payment>>>, ApiError> {
    let pool = &deployment.db().pool;
    let payments = match (current.role.is_staff_or_admin(), query.appointment_id) {
        (true, Some(appointment_id)) => Payment::find_for_appointment(pool, appointment_id).await?,
        (true, None) => Payment::find_all(pool).await?,
        (false, appointment_id) => Payment::find_for_customer(pool, current.id)
            .await?
            .into_iter()
            .filter(|payment| appointment_id.is_none_or(|id| payment.appointment_id == id))
            .collect(),
    };
    Ok(ResponseJson(ApiResponse::success(payments)))
}

pub async fn create_payment(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    headers: HeaderMap,
    Json(payload): Json<CreatePayment>,
) -> Result<IdempotentResponse<Payment>, ApiError> {
    let key = idempotency_key(&headers, current.id);
    let hash = request_hash(&payload)?;

    idempotent_success(
        &deployment.db().pool,
        CREATE_SCOPE,
        key,
        hash,
        StatusCode::CREATED,
        || async {
            let pool = &deployment.db().pool;
            let appointment = Appointment::find_by_id(pool, payload.appointment_id)
                .await?
                .ok_or_else(|| ApiError::BadRequest("Appointment not found".to_string()))?;
            require_owner_or_staff(&current, appointment.customer_id)?;
            if appointment.status == AppointmentStatus::Cancelled {
                return Err(ApiError::BadRequest(
                    "Cannot pay for a cancelled appointment".to_string(),
                ));
            }
            let amount_cents = payload
                .amount_cents
                .unwrap_or(appointment.total_price_cents);
            if amount_cents <= 0 {
                return Err(ApiError::BadRequest(
                    "Payment amount must be positive".to_string(),
                ));
            }

            let payment =
                Payment::create(pool, appointment.customer_id, amount_cents, &payload).await?;
            tracing::info!(
                payment_id = %payment.id,
                appointment_id = %payment.appointment_id,
                amount_cents,
                method = %payment.method,
                "Payment recorded"
            );
            deployment.automation().trigger(
                TRIGGER_PAYMENT_CREATED,
                PaymentCreatedPayload {
                    payment_id: payment.id,
                    appointment_id: payment.appointment_id,
                    customer_id: payment.customer_id,
                    amount_cents: payment.amount_cents,
                },
            );
            Ok(payment)
        },
    )
    .await
}

pub async fn get_payment(
    Extension(current): Extension<CurrentUser>,
    Extension(payment): Extension<Payment>,
) -> Result<ResponseJson<ApiResponse<Payment>>, ApiError> {
    require_owner_or_staff(&current, payment.customer_id)?;
    Ok(ResponseJson(ApiResponse::success(payment)))
}

pub async fn update_payment_status(
    Extension(current): Extension<CurrentUser>,
    Extension(payment): Extension<Payment>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdatePaymentStatus>,
) -> Result<ResponseJson<ApiResponse<Payment>>, ApiError> {
    require_staff(&current)?;
    let updated = Payment::update_status(&deployment.db().pool, payment.id, payload.status).await?;
    tracing::info!(
        payment_id = %updated.id,
        from = %payment.status,
        to = %updated.status,
        "Payment status changed"
    );
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let payment_router = Router::new()
        .route("/", get(get_payment))
        .route("/status", put(update_payment_status))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_payment_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(get_payments).post(create_payment))
        .nest("/{payment_id}", payment_router);

    Router::new().nest("/payments", inner)
}
