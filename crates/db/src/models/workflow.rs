use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::workflow;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Workflow not found")]
    NotFound,
    #[error("Invalid workflow: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct WorkflowAction {
    pub action_type: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub action_config: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub trigger_type: String,
    pub minutes_delay: i32,
    pub is_active: bool,
    pub conditions: Vec<String>,
    pub actions: Vec<WorkflowAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateWorkflow {
    pub name: String,
    pub trigger_type: String,
    #[serde(default)]
    pub minutes_delay: i32,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub actions: Vec<WorkflowAction>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub trigger_type: Option<String>,
    pub minutes_delay: Option<i32>,
    pub is_active: Option<bool>,
    pub conditions: Option<Vec<String>>,
    pub actions: Option<Vec<WorkflowAction>>,
}

fn validate(name: &str, trigger_type: &str, minutes_delay: i32) -> Result<(), WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::Invalid("name is required".to_string()));
    }
    if trigger_type.trim().is_empty() {
        return Err(WorkflowError::Invalid("trigger_type is required".to_string()));
    }
    if minutes_delay < 0 {
        return Err(WorkflowError::Invalid(
            "minutes_delay cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<JsonValue, WorkflowError> {
    serde_json::to_value(value).map_err(|err| WorkflowError::Invalid(err.to_string()))
}

impl Workflow {
    fn from_model(model: workflow::Model) -> Self {
        let id = model.id;
        // Malformed JSON reads as an empty list.
        let conditions = serde_json::from_value(model.conditions).unwrap_or_else(|err| {
            tracing::warn!(workflow_id = %id, "Unreadable workflow conditions: {err}");
            Vec::new()
        });
        let actions = serde_json::from_value(model.actions).unwrap_or_else(|err| {
            tracing::warn!(workflow_id = %id, "Unreadable workflow actions: {err}");
            Vec::new()
        });
        Self {
            id,
            name: model.name,
            trigger_type: model.trigger_type,
            minutes_delay: model.minutes_delay,
            is_active: model.is_active,
            conditions,
            actions,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = workflow::Entity::find()
            .order_by_asc(workflow::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = workflow::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_active_by_trigger<C: ConnectionTrait>(
        db: &C,
        trigger_type: &str,
    ) -> Result<Vec<Self>, DbErr> {
        let records = workflow::Entity::find()
            .filter(workflow::Column::TriggerType.eq(trigger_type))
            .filter(workflow::Column::IsActive.eq(true))
            .order_by_asc(workflow::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateWorkflow,
    ) -> Result<Self, WorkflowError> {
        validate(&data.name, &data.trigger_type, data.minutes_delay)?;
        let now = Utc::now();
        let active = workflow::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(data.name.trim().to_string()),
            trigger_type: Set(data.trigger_type.trim().to_string()),
            minutes_delay: Set(data.minutes_delay),
            is_active: Set(data.is_active.unwrap_or(true)),
            conditions: Set(to_json(&data.conditions)?),
            actions: Set(to_json(&data.actions)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateWorkflow,
    ) -> Result<Self, WorkflowError> {
        let record = workflow::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(WorkflowError::NotFound)?;

        validate(
            data.name.as_deref().unwrap_or(&record.name),
            data.trigger_type.as_deref().unwrap_or(&record.trigger_type),
            data.minutes_delay.unwrap_or(record.minutes_delay),
        )?;

        let mut active: workflow::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(name.trim().to_string());
        }
        if let Some(trigger_type) = data.trigger_type.as_ref() {
            active.trigger_type = Set(trigger_type.trim().to_string());
        }
        if let Some(minutes_delay) = data.minutes_delay {
            active.minutes_delay = Set(minutes_delay);
        }
        if let Some(is_active) = data.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(conditions) = data.conditions.as_ref() {
            active.conditions = Set(to_json(conditions)?);
        }
        if let Some(actions) = data.actions.as_ref() {
            active.actions = Set(to_json(actions)?);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = workflow::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
