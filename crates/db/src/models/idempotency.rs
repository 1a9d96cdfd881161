use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::idempotency_key;

pub const IDEMPOTENCY_STATE_IN_PROGRESS: &str = "in_progress";
pub const IDEMPOTENCY_STATE_COMPLETED: &str = "completed";

#[derive(Debug, Clone)]
pub struct IdempotencyKey {
    pub id: Uuid,
    pub scope: String,
    pub key: String,
    pub request_hash: String,
    pub state: String,
    pub response_status: Option<i32>,
    pub response_json: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyKey {
    fn from_model(model: idempotency_key::Model) -> Self {
        Self {
            id: model.id,
            scope: model.scope,
            key: model.key,
            request_hash: model.request_hash,
            state: model.state,
            response_status: model.response_status,
            response_json: model.response_json,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub enum IdempotencyBeginOutcome {
    New { record_id: Uuid },
    Existing { record: IdempotencyKey },
}

pub async fn find_by_scope_key<C: ConnectionTrait>(
    db: &C,
    scope: &str,
    key: &str,
) -> Result<Option<IdempotencyKey>, DbErr> {
    let record = idempotency_key::Entity::find()
        .filter(idempotency_key::Column::Scope.eq(scope))
        .filter(idempotency_key::Column::Key.eq(key))
        .one(db)
        .await?;
    Ok(record.map(IdempotencyKey::from_model))
}

fn is_stale(record: &IdempotencyKey, stale_after: Option<ChronoDuration>) -> bool {
    match stale_after {
        Some(after) if !after.is_zero() && record.state == IDEMPOTENCY_STATE_IN_PROGRESS => {
            Utc::now() - record.created_at > after
        }
        _ => false,
    }
}

/// Claims `(scope, key)` for a new request, or returns the record already
/// holding it. In-progress records older than `stale_in_progress_after` are
/// discarded and the key is claimed again.
pub async fn begin<C: ConnectionTrait>(
    db: &C,
    scope: &str,
    key: &str,
    request_hash: &str,
    stale_in_progress_after: Option<ChronoDuration>,
) -> Result<IdempotencyBeginOutcome, DbErr> {
    if let Some(existing) = find_by_scope_key(db, scope, key).await? {
        if !is_stale(&existing, stale_in_progress_after) {
            return Ok(IdempotencyBeginOutcome::Existing { record: existing });
        }
        tracing::warn!(
            scope,
            key,
            record_id = %existing.id,
            "Discarding stale in-progress idempotency key"
        );
        if let Err(err) = delete(db, existing.id).await {
            tracing::warn!(record_id = %existing.id, "Failed to discard idempotency key: {err}");
            return Ok(IdempotencyBeginOutcome::Existing { record: existing });
        }
    }

    let now = Utc::now();
    let active = idempotency_key::ActiveModel {
        id: Set(Uuid::new_v4()),
        scope: Set(scope.to_string()),
        key: Set(key.to_string()),
        request_hash: Set(request_hash.to_string()),
        state: Set(IDEMPOTENCY_STATE_IN_PROGRESS.to_string()),
        response_status: Set(None),
        response_json: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match active.insert(db).await {
        Ok(model) => Ok(IdempotencyBeginOutcome::New { record_id: model.id }),
        Err(err) => {
            // Concurrent insert of the same key.
            if let Some(existing) = find_by_scope_key(db, scope, key).await? {
                return Ok(IdempotencyBeginOutcome::Existing { record: existing });
            }
            Err(err)
        }
    }
}

pub async fn complete<C: ConnectionTrait>(
    db: &C,
    record_id: Uuid,
    response_status: i32,
    response_json: String,
) -> Result<(), DbErr> {
    let record = idempotency_key::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound(
            "Idempotency key not found".to_string(),
        ))?;

    let now = Utc::now();
    let mut active: idempotency_key::ActiveModel = record.into();
    active.state = Set(IDEMPOTENCY_STATE_COMPLETED.to_string());
    active.response_status = Set(Some(response_status));
    active.response_json = Set(Some(response_json));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}

pub async fn delete<C: ConnectionTrait>(db: &C, record_id: Uuid) -> Result<(), DbErr> {
    idempotency_key::Entity::delete_by_id(record_id)
        .exec(db)
        .await?;
    Ok(())
}

pub async fn prune_completed_before<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = idempotency_key::Entity::delete_many()
        .filter(idempotency_key::Column::State.eq(IDEMPOTENCY_STATE_COMPLETED))
        .filter(idempotency_key::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn prune_in_progress_before<C: ConnectionTrait>(
    db: &C,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = idempotency_key::Entity::delete_many()
        .filter(idempotency_key::Column::State.eq(IDEMPOTENCY_STATE_IN_PROGRESS))
        .filter(idempotency_key::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
