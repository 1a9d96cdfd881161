use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::{
    TransactionTrait,
    events::{ChatMessagePayload, SLA_CHAT_UNANSWERED, TRIGGER_CHAT_MESSAGE},
    models::conversation::{
        Conversation, CreateConversation, CreateMessage, Message, PostedMessage,
    },
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    http::auth::{CurrentUser, require_owner_or_staff},
    middleware::load_conversation_middleware,
};

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    #[serde(default)]
    pub awaiting_reply: bool,
}

#[derive(Debug, Serialize, TS)]
pub struct ConversationWithMessages {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, TS)]
pub struct MarkReadResponse {
    pub marked: u64,
}

fn require_body(body: &str) -> Result<&str, ApiError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Message body is required".to_string()));
    }
    Ok(body)
}

/// Emits the chat trigger and, when staff answer a waiting thread, closes its
/// unanswered-chat incidents.
fn announce_message(deployment: &DeploymentImpl, posted: &PostedMessage) {
    let automation = deployment.automation();
    let message = &posted.message;
    automation.trigger(
        TRIGGER_CHAT_MESSAGE,
        ChatMessagePayload {
            conversation_id: posted.conversation.id,
            customer_id: posted.conversation.customer_id,
            message_id: message.id,
            sender_id: message.sender_id,
            sender_role: message.sender_role.to_string(),
        },
    );
    if message.sender_role.is_staff_or_admin() && posted.was_awaiting_reply {
        automation.close_incidents_for_entity(SLA_CHAT_UNANSWERED, posted.conversation.id);
    }
}

pub async fn get_conversations(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<ConversationQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Conversation>>>, ApiError> {
    let pool = &deployment.db().pool;
    let conversations = if current.role.is_staff_or_admin() {
        Conversation::find_all(pool, query.awaiting_reply).await?
    } else {
        Conversation::find_for_customer(pool, current.id).await?
    };
    Ok(ResponseJson(ApiResponse::success(conversations)))
}

pub async fn create_conversation(
    Extension(current): Extension<CurrentUser>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateConversation>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ConversationWithMessages>>), ApiError> {
    let body = require_body(&payload.body)?;
    let customer_id = if current.role.is_staff_or_admin() {
        payload.customer_id.ok_or_else(|| {
            ApiError::BadRequest("customer_id is required when staff open a thread".to_string())
        })?
    } else {
        current.id
    };

    let tx = deployment.db().pool.begin().await?;
    let conversation = Conversation::create(&tx, customer_id, payload.subject.clone()).await?;
    let posted =
        Conversation::post_message(&tx, conversation.id, current.id, current.role, body).await?;
    tx.commit().await?;

    announce_message(&deployment, &posted);
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(ConversationWithMessages {
            conversation: posted.conversation,
            messages: vec![posted.message],
        })),
    ))
}

pub async fn get_conversation(
    Extension(current): Extension<CurrentUser>,
    Extension(conversation): Extension<Conversation>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<ConversationWithMessages>>, ApiError> {
    require_owner_or_staff(&current, conversation.customer_id)?;
    let messages = Message::find_by_conversation(&deployment.db().pool, conversation.id).await?;
    Ok(ResponseJson(ApiResponse::success(ConversationWithMessages {
        conversation,
        messages,
    })))
}

pub async fn get_messages(
    Extension(current): Extension<CurrentUser>,
    Extension(conversation): Extension<Conversation>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Message>>>, ApiError> {
    require_owner_or_staff(&current, conversation.customer_id)?;
    let messages = Message::find_by_conversation(&deployment.db().pool, conversation.id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn post_message(
    Extension(current): Extension<CurrentUser>,
    Extension(conversation): Extension<Conversation>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateMessage>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Message>>), ApiError> {
    require_owner_or_staff(&current, conversation.customer_id)?;
    let body = require_body(&payload.body)?;

    let tx = deployment.db().pool.begin().await?;
    let posted =
        Conversation::post_message(&tx, conversation.id, current.id, current.role, body).await?;
    tx.commit().await?;
    tracing::debug!(
        conversation_id = %conversation.id,
        message_id = %posted.message.id,
        sender_role = %posted.message.sender_role,
        "Message posted"
    );

    announce_message(&deployment, &posted);
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(posted.message)),
    ))
}

pub async fn mark_read(
    Extension(current): Extension<CurrentUser>,
    Extension(conversation): Extension<Conversation>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<MarkReadResponse>>, ApiError> {
    require_owner_or_staff(&current, conversation.customer_id)?;
    let marked = Message::mark_read(&deployment.db().pool, conversation.id, current.id).await?;
    Ok(ResponseJson(ApiResponse::success(MarkReadResponse { marked })))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let conversation_router = Router::new()
        .route("/", get(get_conversation))
        .route("/messages", get(get_messages).post(post_message))
        .route("/read", post(mark_read))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_conversation_middleware::<DeploymentImpl>,
        ));

    let inner = Router::new()
        .route("/", get(get_conversations).post(create_conversation))
        .nest("/{conversation_id}", conversation_router);

    Router::new().nest("/conversations", inner)
}
