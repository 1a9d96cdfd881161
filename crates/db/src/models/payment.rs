use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::payment,
    types::{PaymentMethod, PaymentStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePayment {
    pub appointment_id: Uuid,
    /// Defaults to the appointment total when omitted.
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

impl Payment {
    fn from_model(model: payment::Model) -> Self {
        Self {
            id: model.id,
            appointment_id: model.appointment_id,
            customer_id: model.customer_id,
            amount_cents: model.amount_cents,
            method: model.method,
            status: model.status,
            reference: model.reference,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = payment::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_for_customer<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = payment::Entity::find()
            .filter(payment::Column::CustomerId.eq(customer_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_for_appointment<C: ConnectionTrait>(
        db: &C,
        appointment_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = payment::Entity::find()
            .filter(payment::Column::AppointmentId.eq(appointment_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = payment::Entity::find()
            .order_by_desc(payment::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
        amount_cents: i64,
        data: &CreatePayment,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let status = match data.method {
            PaymentMethod::Cash => PaymentStatus::Completed,
            _ => PaymentStatus::Pending,
        };
        let active = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            appointment_id: Set(data.appointment_id),
            customer_id: Set(customer_id),
            amount_cents: Set(amount_cents),
            method: Set(data.method),
            status: Set(status),
            reference: Set(data.reference.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Self, DbErr> {
        let record = payment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Payment not found".to_string()))?;
        let mut active: payment::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }
}
