use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, JsonValue,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{notification, notification_preference},
    types::{NotificationChannel, NotificationStatus},
};

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: JsonValue,
    pub status: NotificationStatus,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct NotificationPreference {
    pub channel: NotificationChannel,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CategoryPreference {
    pub category: String,
    pub channel: NotificationChannel,
    pub enabled: bool,
}

impl Notification {
    fn from_model(model: notification::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            title: model.title,
            body: model.body,
            category: model.category,
            metadata: model.metadata,
            status: model.status,
            snoozed_until: model.snoozed_until,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateNotification,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(data.user_id),
            title: Set(data.title.clone()),
            body: Set(data.body.clone()),
            category: Set(data.category.clone()),
            metadata: Set(data.metadata.clone()),
            status: Set(NotificationStatus::New),
            snoozed_until: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = notification::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    /// Inbox view: dismissed items are hidden, snoozed items reappear once
    /// their snooze has passed.
    pub async fn find_inbox<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(
                Condition::any()
                    .add(notification::Column::Status.is_in([
                        NotificationStatus::New,
                        NotificationStatus::Read,
                    ]))
                    .add(
                        Condition::all()
                            .add(notification::Column::Status.eq(NotificationStatus::Snoozed))
                            .add(notification::Column::SnoozedUntil.lte(now)),
                    ),
            )
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn count_unread<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Status.eq(NotificationStatus::New))
            .count(db)
            .await
    }

    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: NotificationStatus,
        snoozed_until: Option<DateTime<Utc>>,
    ) -> Result<Self, DbErr> {
        let record = notification::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Notification not found".to_string()))?;
        let mut active: notification::ActiveModel = record.into();
        active.status = Set(status);
        active.snoozed_until = Set(match status {
            NotificationStatus::Snoozed => snoozed_until,
            _ => None,
        });
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
        let result = notification::Entity::update_many()
            .col_expr(
                notification::Column::Status,
                sea_orm::sea_query::Expr::value(NotificationStatus::Read),
            )
            .col_expr(
                notification::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Status.eq(NotificationStatus::New))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

impl NotificationPreference {
    /// Channels with no stored row fall back to in-app on, everything else off.
    pub fn default_for(channel: NotificationChannel) -> Self {
        Self {
            channel,
            enabled: channel == NotificationChannel::InApp,
        }
    }

    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<CategoryPreference>, DbErr> {
        let records = notification_preference::Entity::find()
            .filter(notification_preference::Column::UserId.eq(user_id))
            .order_by_asc(notification_preference::Column::Category)
            .all(db)
            .await?;
        Ok(records
            .into_iter()
            .map(|model| CategoryPreference {
                category: model.category,
                channel: model.channel,
                enabled: model.enabled,
            })
            .collect())
    }

    pub async fn is_enabled<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        category: &str,
        channel: NotificationChannel,
    ) -> Result<bool, DbErr> {
        let record = notification_preference::Entity::find()
            .filter(notification_preference::Column::UserId.eq(user_id))
            .filter(notification_preference::Column::Category.eq(category))
            .filter(notification_preference::Column::Channel.eq(channel))
            .one(db)
            .await?;
        Ok(record
            .map(|model| model.enabled)
            .unwrap_or_else(|| Self::default_for(channel).enabled))
    }

    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        preference: &CategoryPreference,
    ) -> Result<CategoryPreference, DbErr> {
        let existing = notification_preference::Entity::find()
            .filter(notification_preference::Column::UserId.eq(user_id))
            .filter(notification_preference::Column::Category.eq(preference.category.as_str()))
            .filter(notification_preference::Column::Channel.eq(preference.channel))
            .one(db)
            .await?;

        let model = match existing {
            Some(record) => {
                let mut active: notification_preference::ActiveModel = record.into();
                active.enabled = Set(preference.enabled);
                active.updated_at = Set(Utc::now());
                active.update(db).await?
            }
            None => {
                notification_preference::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    category: Set(preference.category.clone()),
                    channel: Set(preference.channel),
                    enabled: Set(preference.enabled),
                    updated_at: Set(Utc::now()),
                }
                .insert(db)
                .await?
            }
        };

        Ok(CategoryPreference {
            category: model.category,
            channel: model.channel,
            enabled: model.enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::{models::appointment::tests::seed_user, test_db::setup_db, types::UserRole};

    #[tokio::test]
    async fn inbox_hides_dismissed_and_active_snoozes() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let mut ids = Vec::new();
        for title in ["one", "two", "three"] {
            let created = Notification::create(
                &db,
                &CreateNotification {
                    user_id: user.id,
                    title: title.to_string(),
                    body: "body".to_string(),
                    category: DEFAULT_CATEGORY.to_string(),
                    metadata: json!({}),
                },
            )
            .await
            .unwrap();
            ids.push(created.id);
        }
        let now = Utc::now();

        Notification::set_status(&db, ids[0], NotificationStatus::Dismissed, None)
            .await
            .unwrap();
        Notification::set_status(
            &db,
            ids[1],
            NotificationStatus::Snoozed,
            Some(now + Duration::hours(1)),
        )
        .await
        .unwrap();

        let inbox = Notification::find_inbox(&db, user.id, now, 50).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, ids[2]);

        let later = Notification::find_inbox(&db, user.id, now + Duration::hours(2), 50)
            .await
            .unwrap();
        assert_eq!(later.len(), 2);

        assert_eq!(Notification::count_unread(&db, user.id).await.unwrap(), 1);
        assert_eq!(Notification::mark_all_read(&db, user.id).await.unwrap(), 1);
        assert_eq!(Notification::count_unread(&db, user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn preferences_default_to_in_app_only() {
        let db = setup_db().await;
        let user = seed_user(&db, "owner@example.com", UserRole::Customer).await;

        assert!(
            NotificationPreference::is_enabled(&db, user.id, "billing", NotificationChannel::InApp)
                .await
                .unwrap()
        );
        assert!(
            !NotificationPreference::is_enabled(&db, user.id, "billing", NotificationChannel::Email)
                .await
                .unwrap()
        );

        NotificationPreference::upsert(
            &db,
            user.id,
            &CategoryPreference {
                category: "billing".to_string(),
                channel: NotificationChannel::InApp,
                enabled: false,
            },
        )
        .await
        .unwrap();
        assert!(
            !NotificationPreference::is_enabled(&db, user.id, "billing", NotificationChannel::InApp)
                .await
                .unwrap()
        );
        assert_eq!(
            NotificationPreference::find_for_user(&db, user.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
