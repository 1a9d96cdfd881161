use axum::{
    http::{HeaderMap, StatusCode},
    response::Json as ResponseJson,
};
use chrono::Duration as ChronoDuration;
use db::models::idempotency::{
    self, IDEMPOTENCY_STATE_COMPLETED, IDEMPOTENCY_STATE_IN_PROGRESS, IdempotencyBeginOutcome,
};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const DEFAULT_IDEMPOTENCY_IN_PROGRESS_TTL_SECS: i64 = 60 * 60;
pub const IDEMPOTENCY_IN_PROGRESS_TTL_ENV: &str = "PAWBOOK_IDEMPOTENCY_IN_PROGRESS_TTL_SECS";

pub type IdempotentResponse<T> = (StatusCode, ResponseJson<ApiResponse<T>>);

fn idempotency_in_progress_ttl() -> Option<ChronoDuration> {
    let default = Some(ChronoDuration::seconds(
        DEFAULT_IDEMPOTENCY_IN_PROGRESS_TTL_SECS,
    ));
    let raw = match std::env::var(IDEMPOTENCY_IN_PROGRESS_TTL_ENV) {
        Ok(value) => value,
        Err(std::env::VarError::NotPresent) => return default,
        Err(err) => {
            tracing::warn!(
                error = %err,
                "Failed to read {IDEMPOTENCY_IN_PROGRESS_TTL_ENV}; using default"
            );
            return default;
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!("{IDEMPOTENCY_IN_PROGRESS_TTL_ENV} is set but empty; using default");
        return default;
    }

    match trimmed.parse::<i64>() {
        Ok(value) if value <= 0 => None,
        Ok(value) => Some(ChronoDuration::seconds(value)),
        Err(err) => {
            tracing::warn!(
                value = trimmed,
                error = %err,
                "Invalid {IDEMPOTENCY_IN_PROGRESS_TTL_ENV}; using default"
            );
            default
        }
    }
}

/// Keys are namespaced per caller so two users cannot collide on one key.
pub fn idempotency_key(headers: &HeaderMap, user_id: Uuid) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| format!("{user_id}:{value}"))
}

pub fn request_hash<T: Serialize>(payload: &T) -> Result<String, ApiError> {
    let bytes = serde_json::to_vec(payload).map_err(|e| {
        ApiError::Internal(format!(
            "Failed to serialize request payload for hashing: {e}"
        ))
    })?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{digest:x}"))
}

/// Runs `execute` at most once per key. A repeat with the same request body
/// replays the stored status and envelope.
pub async fn idempotent_success<T, F, Fut>(
    db: &db::DbPool,
    scope: &'static str,
    key: Option<String>,
    request_hash: String,
    success_status: StatusCode,
    execute: F,
) -> Result<IdempotentResponse<T>, ApiError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let Some(key) = key else {
        let data = execute().await?;
        return Ok((success_status, ResponseJson(ApiResponse::success(data))));
    };

    match idempotency::begin(db, scope, &key, &request_hash, idempotency_in_progress_ttl()).await?
    {
        IdempotencyBeginOutcome::New { record_id } => match execute().await {
            Ok(data) => {
                let response = ApiResponse::success(data);
                let response_json = serde_json::to_string(&response).map_err(|e| {
                    ApiError::Internal(format!(
                        "Failed to serialize idempotent response payload: {e}"
                    ))
                })?;
                idempotency::complete(
                    db,
                    record_id,
                    i32::from(success_status.as_u16()),
                    response_json,
                )
                .await?;
                Ok((success_status, ResponseJson(response)))
            }
            Err(err) => {
                // Best-effort cleanup so retries can proceed.
                if let Err(cleanup_err) = idempotency::delete(db, record_id).await {
                    tracing::warn!(
                        record_id = %record_id,
                        error = %cleanup_err,
                        "Failed to delete idempotency record after error"
                    );
                }
                Err(err)
            }
        },
        IdempotencyBeginOutcome::Existing { record } => {
            if record.request_hash != request_hash {
                return Err(ApiError::Conflict(
                    "Idempotency key already used with different request parameters".to_string(),
                ));
            }

            match record.state.as_str() {
                IDEMPOTENCY_STATE_COMPLETED => {
                    let Some(response_json) = record.response_json else {
                        return Err(ApiError::Internal(
                            "Idempotency record is completed but has no stored response"
                                .to_string(),
                        ));
                    };
                    let response: ApiResponse<T> =
                        serde_json::from_str(&response_json).map_err(|e| {
                            ApiError::Internal(format!("Failed to parse stored response: {e}"))
                        })?;
                    let status = record
                        .response_status
                        .and_then(|code| u16::try_from(code).ok())
                        .and_then(|code| StatusCode::from_u16(code).ok())
                        .unwrap_or(success_status);
                    Ok((status, ResponseJson(response)))
                }
                IDEMPOTENCY_STATE_IN_PROGRESS => Err(ApiError::Conflict(
                    "Request with this idempotency key is in progress. Retry shortly.".to_string(),
                )),
                other => Err(ApiError::Internal(format!(
                    "Unknown idempotency record state: {other}"
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn idempotency_key_is_scoped_to_user_and_trimmed() {
        let user_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers, user_id), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("  "));
        assert_eq!(idempotency_key(&headers, user_id), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" abc "));
        assert_eq!(
            idempotency_key(&headers, user_id),
            Some(format!("{user_id}:abc"))
        );
    }

    #[test]
    fn request_hash_is_stable_for_equal_payloads() {
        let a = request_hash(&serde_json::json!({ "pet_id": "p1" })).unwrap();
        let b = request_hash(&serde_json::json!({ "pet_id": "p1" })).unwrap();
        let c = request_hash(&serde_json::json!({ "pet_id": "p2" })).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
