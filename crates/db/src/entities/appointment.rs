use sea_orm::entity::prelude::*;

use crate::types::AppointmentStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "appointments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub scheduled_at: DateTimeUtc,
    pub duration_minutes: i32,
    pub total_price_cents: i64,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::appointment_service::Entity")]
    AppointmentServices,
}

impl Related<super::appointment_service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AppointmentServices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
