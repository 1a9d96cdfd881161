use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{conversation, message},
    types::UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Conversation {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub subject: Option<String>,
    pub awaiting_reply: bool,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: UserRole,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateConversation {
    /// Staff may open a thread with a specific customer.
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateMessage {
    pub body: String,
}

/// Outcome of posting a message, with the thread state before the write.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub message: Message,
    pub conversation: Conversation,
    pub was_awaiting_reply: bool,
}

impl Conversation {
    fn from_model(model: conversation::Model) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            subject: model.subject,
            awaiting_reply: model.awaiting_reply,
            last_message_at: model.last_message_at,
            created_at: model.created_at,
        }
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = conversation::Entity::find_by_id(id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_for_customer<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = conversation::Entity::find()
            .filter(conversation::Column::CustomerId.eq(customer_id))
            .order_by_desc(conversation::Column::LastMessageAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        awaiting_reply_only: bool,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = conversation::Entity::find();
        if awaiting_reply_only {
            query = query.filter(conversation::Column::AwaitingReply.eq(true));
        }
        let records = query
            .order_by_desc(conversation::Column::LastMessageAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Threads still waiting on staff whose last message is older than `cutoff`.
    pub async fn find_unanswered_before<C: ConnectionTrait>(
        db: &C,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self>, DbErr> {
        let records = conversation::Entity::find()
            .filter(conversation::Column::AwaitingReply.eq(true))
            .filter(conversation::Column::LastMessageAt.lt(cutoff))
            .order_by_asc(conversation::Column::LastMessageAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn count_unanswered_before<C: ConnectionTrait>(
        db: &C,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        conversation::Entity::find()
            .filter(conversation::Column::AwaitingReply.eq(true))
            .filter(conversation::Column::LastMessageAt.lt(cutoff))
            .count(db)
            .await
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
        subject: Option<String>,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = conversation::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            subject: Set(subject),
            awaiting_reply: Set(false),
            last_message_at: Set(now),
            created_at: Set(now),
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Appends a message and flips `awaiting_reply` depending on who wrote it.
    pub async fn post_message<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
        sender_id: Uuid,
        sender_role: UserRole,
        body: &str,
    ) -> Result<PostedMessage, DbErr> {
        let record = conversation::Entity::find_by_id(conversation_id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Conversation not found".to_string()))?;
        let was_awaiting_reply = record.awaiting_reply;

        let now = Utc::now();
        let message = message::ActiveModel {
            id: Set(Uuid::new_v4()),
            conversation_id: Set(conversation_id),
            sender_id: Set(sender_id),
            sender_role: Set(sender_role),
            body: Set(body.to_string()),
            read_at: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await?;

        let mut active: conversation::ActiveModel = record.into();
        active.awaiting_reply = Set(sender_role == UserRole::Customer);
        active.last_message_at = Set(now);
        let conversation = active.update(db).await?;

        Ok(PostedMessage {
            message: Message::from_model(message),
            conversation: Self::from_model(conversation),
            was_awaiting_reply,
        })
    }
}

impl Message {
    fn from_model(model: message::Model) -> Self {
        Self {
            id: model.id,
            conversation_id: model.conversation_id,
            sender_id: model.sender_id,
            sender_role: model.sender_role,
            body: model.body,
            read_at: model.read_at,
            created_at: model.created_at,
        }
    }

    pub async fn find_by_conversation<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = message::Entity::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_asc(message::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Marks messages not written by `reader_id` as read.
    pub async fn mark_read<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = message::Entity::update_many()
            .col_expr(
                message::Column::ReadAt,
                sea_orm::sea_query::Expr::value(Some(Utc::now())),
            )
            .filter(message::Column::ConversationId.eq(conversation_id))
            .filter(message::Column::SenderId.ne(reader_id))
            .filter(message::Column::ReadAt.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::appointment::tests::seed_user, test_db::setup_db};

    #[tokio::test]
    async fn awaiting_reply_follows_the_last_sender() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let staff = seed_user(&db, "staff@example.com", UserRole::Staff).await;
        let conversation = Conversation::create(&db, customer.id, Some("Nail trim".into()))
            .await
            .unwrap();

        let posted = Conversation::post_message(
            &db,
            conversation.id,
            customer.id,
            UserRole::Customer,
            "Is Friday free?",
        )
        .await
        .unwrap();
        assert!(!posted.was_awaiting_reply);
        assert!(posted.conversation.awaiting_reply);

        let reply = Conversation::post_message(
            &db,
            conversation.id,
            staff.id,
            UserRole::Staff,
            "Yes, 10:00 works.",
        )
        .await
        .unwrap();
        assert!(reply.was_awaiting_reply);
        assert!(!reply.conversation.awaiting_reply);

        let marked = Message::mark_read(&db, conversation.id, customer.id)
            .await
            .unwrap();
        assert_eq!(marked, 1);
        let messages = Message::find_by_conversation(&db, conversation.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn rolled_back_reply_leaves_thread_untouched() {
        use sea_orm::TransactionTrait;

        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let staff = seed_user(&db, "staff@example.com", UserRole::Staff).await;
        let conversation = Conversation::create(&db, customer.id, None).await.unwrap();
        Conversation::post_message(
            &db,
            conversation.id,
            customer.id,
            UserRole::Customer,
            "Any openings?",
        )
        .await
        .unwrap();
        let before = Conversation::find_by_id(&db, conversation.id)
            .await
            .unwrap()
            .unwrap();

        let tx = db.begin().await.unwrap();
        let reply =
            Conversation::post_message(&tx, conversation.id, staff.id, UserRole::Staff, "Yes")
                .await
                .unwrap();
        assert!(!reply.conversation.awaiting_reply);
        tx.rollback().await.unwrap();

        let thread = Conversation::find_by_id(&db, conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(thread.awaiting_reply);
        assert_eq!(thread.last_message_at, before.last_message_at);
        let messages = Message::find_by_conversation(&db, conversation.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn unanswered_lookup_uses_last_message_time() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let conversation = Conversation::create(&db, customer.id, None).await.unwrap();
        Conversation::post_message(&db, conversation.id, customer.id, UserRole::Customer, "hi")
            .await
            .unwrap();

        let past = Utc::now() - chrono::Duration::minutes(30);
        assert_eq!(
            Conversation::count_unanswered_before(&db, past).await.unwrap(),
            0
        );
        let future = Utc::now() + chrono::Duration::minutes(1);
        let unanswered = Conversation::find_unanswered_before(&db, future)
            .await
            .unwrap();
        assert_eq!(unanswered.len(), 1);
        assert_eq!(unanswered[0].id, conversation.id);
    }
}
