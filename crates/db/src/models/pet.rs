use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::pet;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Pet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreatePet {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdatePet {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub weight_kg: Option<f64>,
    pub birth_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl Pet {
    fn from_model(model: pet::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            species: model.species,
            breed: model.breed,
            weight_kg: model.weight_kg,
            birth_date: model.birth_date,
            notes: model.notes,
            photo_url: model.photo_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = pet::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = pet::Entity::find()
            .filter(pet::Column::OwnerId.eq(owner_id))
            .order_by_asc(pet::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = pet::Entity::find()
            .order_by_asc(pet::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner_id: Uuid,
        data: &CreatePet,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = pet::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(data.name.trim().to_string()),
            species: Set(data.species.trim().to_string()),
            breed: Set(data.breed.clone()),
            weight_kg: Set(data.weight_kg),
            birth_date: Set(data.birth_date),
            notes: Set(data.notes.clone()),
            photo_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdatePet,
    ) -> Result<Self, DbErr> {
        let record = pet::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Pet not found".to_string()))?;

        let mut active: pet::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(name.trim().to_string());
        }
        if let Some(species) = data.species.as_ref() {
            active.species = Set(species.trim().to_string());
        }
        if let Some(breed) = data.breed.clone() {
            active.breed = Set(Some(breed));
        }
        if let Some(weight_kg) = data.weight_kg {
            active.weight_kg = Set(Some(weight_kg));
        }
        if let Some(birth_date) = data.birth_date {
            active.birth_date = Set(Some(birth_date));
        }
        if let Some(notes) = data.notes.clone() {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_photo_url<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        photo_url: Option<String>,
    ) -> Result<Self, DbErr> {
        let record = pet::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Pet not found".to_string()))?;
        let mut active: pet::ActiveModel = record.into();
        active.photo_url = Set(photo_url);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = pet::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }
}
