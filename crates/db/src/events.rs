use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::AppointmentStatus;

pub const TRIGGER_APPOINTMENT_CREATED: &str = "appointment_created";
pub const TRIGGER_APPOINTMENT_STATUS_CHANGED: &str = "appointment_status_changed";
pub const TRIGGER_CHAT_MESSAGE: &str = "chat_message";
pub const TRIGGER_PAYMENT_CREATED: &str = "payment_created";
pub const TRIGGER_SLA_INCIDENT_OPENED: &str = "sla_incident_opened";

pub const SLA_APPOINTMENT_PENDING: &str = "appointment.pending";
pub const SLA_APPOINTMENT_OVERRUN: &str = "appointment.overrun";
pub const SLA_CHAT_UNANSWERED: &str = "chat.unanswered";

pub const ENTITY_APPOINTMENT: &str = "appointment";
pub const ENTITY_CONVERSATION: &str = "conversation";

/// Maps an SLA target key to the entity type its incidents reference.
pub fn sla_entity_type(target_key: &str) -> &'static str {
    match target_key {
        SLA_CHAT_UNANSWERED => ENTITY_CONVERSATION,
        _ => ENTITY_APPOINTMENT,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCreatedPayload {
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStatusChangedPayload {
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub old_status: AppointmentStatus,
    pub new_status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub conversation_id: Uuid,
    pub customer_id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreatedPayload {
    pub payment_id: Uuid,
    pub appointment_id: Uuid,
    pub customer_id: Uuid,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaIncidentOpenedPayload {
    pub incident_id: Uuid,
    pub target_key: String,
    pub entity_type: String,
    pub entity_id: Uuid,
}
