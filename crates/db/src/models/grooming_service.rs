use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::grooming_service;

/// A catalog entry customers can book.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GroomingService {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateGroomingService {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_minutes: i32,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateGroomingService {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

impl GroomingService {
    fn from_model(model: grooming_service::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price_cents: model.price_cents,
            duration_minutes: model.duration_minutes,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        include_inactive: bool,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = grooming_service::Entity::find();
        if !include_inactive {
            query = query.filter(grooming_service::Column::IsActive.eq(true));
        }
        let records = query
            .order_by_asc(grooming_service::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = grooming_service::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: &[Uuid],
    ) -> Result<Vec<Self>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = grooming_service::Entity::find()
            .filter(grooming_service::Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateGroomingService,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = grooming_service::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.clone()),
            price_cents: Set(data.price_cents),
            duration_minutes: Set(data.duration_minutes),
            is_active: Set(data.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateGroomingService,
    ) -> Result<Self, DbErr> {
        let record = grooming_service::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Service not found".to_string()))?;

        let mut active: grooming_service::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = data.description.clone() {
            active.description = Set(Some(description));
        }
        if let Some(price_cents) = data.price_cents {
            active.price_cents = Set(price_cents);
        }
        if let Some(duration_minutes) = data.duration_minutes {
            active.duration_minutes = Set(duration_minutes);
        }
        if let Some(is_active) = data.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Retires the service from the catalog. Booked lines keep referencing it.
    pub async fn deactivate<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Self, DbErr> {
        Self::update(
            db,
            id,
            &UpdateGroomingService {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }
}
