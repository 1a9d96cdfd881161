use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::user, types::UserRole};

/// Public view of an account. The password hash never leaves this module
/// except through [`User::find_credentials_by_email`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct UpdateUser {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl User {
    fn from_model(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            phone: model.phone,
            role: model.role,
            avatar_url: model.avatar_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(Self::normalize_email(email)))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Returns the account together with its stored password hash.
    pub async fn find_credentials_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<(Self, String)>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(Self::normalize_email(email)))
            .one(db)
            .await?;
        Ok(record.map(|model| {
            let hash = model.password_hash.clone();
            (Self::from_model(model), hash)
        }))
    }

    pub async fn find_by_role<C: ConnectionTrait>(
        db: &C,
        role: UserRole,
    ) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .filter(user::Column::Role.eq(role))
            .order_by_asc(user::Column::FullName)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateUser) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(Self::normalize_email(&data.email)),
            password_hash: Set(data.password_hash.clone()),
            full_name: Set(data.full_name.trim().to_string()),
            phone: Set(data.phone.clone()),
            role: Set(data.role),
            avatar_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<Self, DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let mut active: user::ActiveModel = record.into();
        if let Some(full_name) = data.full_name.as_ref() {
            active.full_name = Set(full_name.trim().to_string());
        }
        if let Some(phone) = data.phone.clone() {
            active.phone = Set(Some(phone).filter(|value| !value.trim().is_empty()));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_role<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        role: UserRole,
    ) -> Result<Self, DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let mut active: user::ActiveModel = record.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_avatar_url<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        avatar_url: Option<String>,
    ) -> Result<Self, DbErr> {
        let record = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        let mut active: user::ActiveModel = record.into();
        active.avatar_url = Set(avatar_url);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db::setup_db;

    #[tokio::test]
    async fn emails_are_stored_normalized() {
        let db = setup_db().await;
        let created = User::create(
            &db,
            &CreateUser {
                email: "  Groomer@Example.COM ".to_string(),
                password_hash: "hash".to_string(),
                full_name: "Sam Groomer".to_string(),
                phone: None,
                role: UserRole::Staff,
            },
        )
        .await
        .unwrap();
        assert_eq!(created.email, "groomer@example.com");

        let (found, hash) = User::find_credentials_by_email(&db, "GROOMER@example.com")
            .await
            .unwrap()
            .expect("user by email");
        assert_eq!(found.id, created.id);
        assert_eq!(hash, "hash");

        let staff = User::find_by_role(&db, UserRole::Staff).await.unwrap();
        assert_eq!(staff.len(), 1);
        assert!(
            User::find_by_role(&db, UserRole::Admin)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
