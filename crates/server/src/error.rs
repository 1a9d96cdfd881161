use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        appointment::AppointmentError, staff_availability::AvailabilityError,
        workflow::WorkflowError,
    },
};
use deployment::DeploymentError;
use services::services::{
    auth::AuthError, automation::AutomationError, config::ConfigError, uploads::UploadError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Appointment(#[from] AppointmentError),
    #[error(transparent)]
    Availability(#[from] AvailabilityError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Automation(#[from] AutomationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Appointment(err) => match err {
                AppointmentError::NotFound => (StatusCode::NOT_FOUND, "AppointmentError"),
                AppointmentError::SlotConflict(_) => (StatusCode::CONFLICT, "SlotConflict"),
                AppointmentError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "AppointmentError")
                }
                AppointmentError::PetNotFound
                | AppointmentError::PetNotOwned
                | AppointmentError::NoServices
                | AppointmentError::ServiceUnavailable(_)
                | AppointmentError::TooLong(_) => {
                    (StatusCode::BAD_REQUEST, "AppointmentError")
                }
            },
            ApiError::Availability(err) => match err {
                AvailabilityError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "AvailabilityError")
                }
                _ => (StatusCode::BAD_REQUEST, "AvailabilityError"),
            },
            ApiError::Workflow(err) => match err {
                WorkflowError::NotFound => (StatusCode::NOT_FOUND, "WorkflowError"),
                WorkflowError::Invalid(_) => (StatusCode::BAD_REQUEST, "WorkflowError"),
                WorkflowError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "WorkflowError"),
            },
            ApiError::Automation(err) => match err {
                AutomationError::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "AutomationError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "AutomationError"),
            },
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::Jwt(_) => {
                    (StatusCode::UNAUTHORIZED, "AuthError")
                }
                AuthError::EmailTaken => (StatusCode::CONFLICT, "AuthError"),
                AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "AuthError"),
                AuthError::Database(_) | AuthError::Hash(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "AuthError")
                }
            },
            ApiError::Upload(err) => match err {
                UploadError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "UploadTooLarge"),
                UploadError::UnsupportedType(_) | UploadError::Empty => {
                    (StatusCode::BAD_REQUEST, "InvalidUpload")
                }
                UploadError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UploadError"),
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Config(err) => match err {
                ConfigError::ValidationError(_) => (StatusCode::BAD_REQUEST, "ConfigError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ConfigError"),
            },
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "MultipartError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
        };

        let error_message = match &self {
            ApiError::Appointment(err) => match err {
                AppointmentError::Database(_) => format!("{}: {}", error_type, self),
                other => other.to_string(),
            },
            ApiError::Availability(AvailabilityError::Database(_)) => {
                format!("{}: {}", error_type, self)
            }
            ApiError::Availability(err) => err.to_string(),
            ApiError::Workflow(WorkflowError::Invalid(msg)) => msg.clone(),
            ApiError::Auth(err) => match err {
                AuthError::Jwt(_) => "Unauthorized. Please sign in again.".to_string(),
                AuthError::Database(_) | AuthError::Hash(_) => {
                    "Authentication failed. Please try again.".to_string()
                }
                other => other.to_string(),
            },
            ApiError::Upload(err) => match err {
                UploadError::TooLarge { limit } => format!(
                    "This file is too large. Maximum file size is {:.1} MB.",
                    *limit as f64 / 1_048_576.0
                ),
                UploadError::UnsupportedType(_) => {
                    "This file type is not supported. Please upload a PNG, JPG, GIF or WebP image."
                        .to_string()
                }
                UploadError::Empty => "The uploaded file is empty.".to_string(),
                UploadError::Io(_) => "Failed to store file. Please try again.".to_string(),
            },
            ApiError::Multipart(_) => {
                "Failed to upload file. Please ensure the file is valid and try again.".to_string()
            }
            ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Internal(msg) => msg.clone(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Conflict(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("conflict".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(AppointmentError::SlotConflict(Uuid::new_v4()))
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AppointmentError::PetNotOwned)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::EmailTaken)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(UploadError::TooLarge { limit: 10 })
                .into_response()
                .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(AvailabilityError::InvalidDay(9))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
