use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::workflow_run, types::WorkflowRunStatus};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_type: String,
    #[ts(type = "Record<string, unknown>")]
    pub payload: JsonValue,
    pub status: WorkflowRunStatus,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    fn from_model(model: workflow_run::Model) -> Self {
        Self {
            id: model.id,
            workflow_id: model.workflow_id,
            trigger_type: model.trigger_type,
            payload: model.payload,
            status: model.status,
            error: model.error,
            queued_at: model.queued_at,
            scheduled_for: model.scheduled_for,
            finished_at: model.finished_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = workflow_run::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_workflow<C: ConnectionTrait>(
        db: &C,
        workflow_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = workflow_run::Entity::find()
            .filter(workflow_run::Column::WorkflowId.eq(workflow_id))
            .order_by_desc(workflow_run::Column::QueuedAt)
            .limit(limit)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create_queued<C: ConnectionTrait>(
        db: &C,
        workflow_id: Uuid,
        trigger_type: &str,
        payload: &JsonValue,
        scheduled_for: DateTime<Utc>,
    ) -> Result<Self, DbErr> {
        let active = workflow_run::ActiveModel {
            id: Set(Uuid::new_v4()),
            workflow_id: Set(workflow_id),
            trigger_type: Set(trigger_type.to_string()),
            payload: Set(payload.clone()),
            status: Set(WorkflowRunStatus::Queued),
            error: Set(None),
            queued_at: Set(Utc::now()),
            scheduled_for: Set(scheduled_for),
            finished_at: Set(None),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Moves a run to its terminal status.
    pub async fn finish<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: WorkflowRunStatus,
        error: Option<String>,
    ) -> Result<Self, DbErr> {
        let record = workflow_run::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Workflow run not found".to_string()))?;
        let mut active: workflow_run::ActiveModel = record.into();
        active.status = Set(status);
        active.error = Set(error);
        active.finished_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }
}
