use sea_orm::JsonValue;
use sea_orm::entity::prelude::*;

use crate::types::WorkflowRunStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workflow_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_type: String,
    pub payload: JsonValue,
    pub status: WorkflowRunStatus,
    pub error: Option<String>,
    pub queued_at: DateTimeUtc,
    pub scheduled_for: DateTimeUtc,
    pub finished_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
