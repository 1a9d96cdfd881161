use db::{
    DBService, DbErr,
    models::{
        notification::{CreateNotification, Notification, NotificationPreference},
        user::User,
    },
    types::{NotificationChannel, UserRole},
};
use serde_json::Value;
use uuid::Uuid;

/// Writes in-app notifications, honouring each user's channel preferences.
#[derive(Clone)]
pub struct NotificationService {
    db: DBService,
}

impl NotificationService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Returns `None` when the user has switched the in-app channel off for
    /// this category.
    pub async fn notify_user(
        &self,
        user_id: Uuid,
        category: &str,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> Result<Option<Notification>, DbErr> {
        let pool = &self.db.pool;
        if !NotificationPreference::is_enabled(pool, user_id, category, NotificationChannel::InApp)
            .await?
        {
            tracing::debug!(%user_id, category, "In-app notifications disabled, skipping");
            return Ok(None);
        }

        let notification = Notification::create(
            pool,
            &CreateNotification {
                user_id,
                title: title.to_string(),
                body: body.to_string(),
                category: category.to_string(),
                metadata,
            },
        )
        .await?;
        Ok(Some(notification))
    }

    pub async fn notify_role(
        &self,
        role: UserRole,
        category: &str,
        title: &str,
        body: &str,
        metadata: Value,
    ) -> Result<Vec<Notification>, DbErr> {
        let recipients = User::find_by_role(&self.db.pool, role).await?;
        let mut sent = Vec::with_capacity(recipients.len());
        for user in recipients {
            if let Some(notification) = self
                .notify_user(user.id, category, title, body, metadata.clone())
                .await?
            {
                sent.push(notification);
            }
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        notification::CategoryPreference,
        user::{CreateUser, User},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;

    use super::*;

    async fn setup() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        DBService::from_connection(pool)
    }

    async fn user(db: &DBService, email: &str, role: UserRole) -> User {
        User::create(
            &db.pool,
            &CreateUser {
                email: email.to_string(),
                password_hash: "hash".to_string(),
                full_name: email.to_string(),
                phone: None,
                role,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn role_fan_out_skips_opted_out_users() {
        let db = setup().await;
        let first = user(&db, "one@example.com", UserRole::Staff).await;
        let second = user(&db, "two@example.com", UserRole::Staff).await;
        user(&db, "customer@example.com", UserRole::Customer).await;

        NotificationPreference::upsert(
            &db.pool,
            second.id,
            &CategoryPreference {
                category: "sla".to_string(),
                channel: NotificationChannel::InApp,
                enabled: false,
            },
        )
        .await
        .unwrap();

        let service = NotificationService::new(db.clone());
        let sent = service
            .notify_role(UserRole::Staff, "sla", "Breach", "A target was missed", json!({}))
            .await
            .unwrap();

        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_id, first.id);
        assert_eq!(Notification::count_unread(&db.pool, second.id).await.unwrap(), 0);
    }
}
