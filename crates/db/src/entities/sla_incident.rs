use sea_orm::entity::prelude::*;

use crate::types::{SlaIncidentStatus, SlaSeverity};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sla_incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub target_key: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub severity: SlaSeverity,
    pub status: SlaIncidentStatus,
    pub opened_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
