use std::{collections::HashMap, str::FromStr};

use db::{
    events::sla_entity_type,
    models::{
        sla::{SlaIncident, SlaTarget},
        workflow::WorkflowAction,
    },
    types::{SlaSeverity, UserRole},
};
use serde::Deserialize;
use serde_json::{Value, json};
use utils::text::render_template;
use uuid::Uuid;

use super::{AutomationEngine, AutomationError, conditions};

pub const ACTION_SEND_NOTIFICATION: &str = "send_notification";
pub const ACTION_OPEN_SLA_INCIDENT: &str = "open_sla_incident";
pub const ACTION_CLOSE_SLA_INCIDENTS: &str = "close_sla_incidents";
pub const ACTION_WEBHOOK: &str = "webhook";

const DEFAULT_NOTIFICATION_CATEGORY: &str = "automation";
const DEFAULT_ENTITY_FIELD: &str = "appointment_id";

/// What an action sees of the run it belongs to.
pub(super) struct ActionContext<'a> {
    pub workflow_id: Uuid,
    pub trigger_type: &'a str,
    pub payload: &'a Value,
}

#[derive(Debug, Deserialize)]
struct NotificationConfig {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    user_id: Option<Uuid>,
    #[serde(default)]
    user_field: Option<String>,
    #[serde(default)]
    role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
struct IncidentConfig {
    target_key: String,
    #[serde(default)]
    entity_field: Option<String>,
    #[serde(default)]
    severity: Option<SlaSeverity>,
}

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

fn parse_config<T: for<'de> Deserialize<'de>>(
    action: &WorkflowAction,
) -> Result<T, AutomationError> {
    serde_json::from_value(action.action_config.clone()).map_err(|err| {
        AutomationError::InvalidConfig(format!("{}: {err}", action.action_type))
    })
}

fn flatten_into(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&path, nested, out);
            }
        }
        other if !prefix.is_empty() => {
            out.insert(prefix.to_string(), conditions::value_as_text(other));
        }
        _ => {}
    }
}

/// Payload values keyed by dotted path, for `{{field}}` placeholders.
pub fn template_values(trigger_type: &str, payload: &Value) -> HashMap<String, String> {
    let mut values = HashMap::new();
    flatten_into("", payload, &mut values);
    values.insert("trigger_type".to_string(), trigger_type.to_string());
    values
}

fn uuid_field(payload: &Value, field: &str) -> Result<Uuid, AutomationError> {
    conditions::lookup(payload, field)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::from_str(raw).ok())
        .ok_or_else(|| {
            AutomationError::InvalidConfig(format!("Payload field '{field}' is not a UUID"))
        })
}

impl AutomationEngine {
    pub(super) async fn execute_action(
        &self,
        action: &WorkflowAction,
        ctx: &ActionContext<'_>,
    ) -> Result<(), AutomationError> {
        match action.action_type.as_str() {
            ACTION_SEND_NOTIFICATION => self.send_notification(parse_config(action)?, ctx).await,
            ACTION_OPEN_SLA_INCIDENT => self.open_incident(parse_config(action)?, ctx).await,
            ACTION_CLOSE_SLA_INCIDENTS => self.close_incidents(parse_config(action)?, ctx).await,
            ACTION_WEBHOOK => self.call_webhook(parse_config(action)?, ctx).await,
            other => {
                tracing::warn!(
                    workflow_id = %ctx.workflow_id,
                    action_type = other,
                    "Skipping unknown workflow action"
                );
                Ok(())
            }
        }
    }

    async fn send_notification(
        &self,
        config: NotificationConfig,
        ctx: &ActionContext<'_>,
    ) -> Result<(), AutomationError> {
        let values = template_values(ctx.trigger_type, ctx.payload);
        let title = render_template(&config.title, &values);
        let body = render_template(&config.body, &values);
        let category = config
            .category
            .as_deref()
            .unwrap_or(DEFAULT_NOTIFICATION_CATEGORY);
        let metadata = json!({
            "workflow_id": ctx.workflow_id,
            "trigger_type": ctx.trigger_type,
        });

        if let Some(role) = config.role {
            let sent = self
                .notifications
                .notify_role(role, category, &title, &body, metadata)
                .await?;
            tracing::debug!(%role, sent = sent.len(), "Workflow notified role");
            return Ok(());
        }

        let user_id = match (config.user_id, config.user_field.as_deref()) {
            (Some(user_id), _) => user_id,
            (None, Some(field)) => uuid_field(ctx.payload, field)?,
            (None, None) => uuid_field(ctx.payload, "customer_id")?,
        };
        self.notifications
            .notify_user(user_id, category, &title, &body, metadata)
            .await?;
        Ok(())
    }

    async fn open_incident(
        &self,
        config: IncidentConfig,
        ctx: &ActionContext<'_>,
    ) -> Result<(), AutomationError> {
        let pool = &self.db.pool;
        let target = SlaTarget::find_by_key(pool, &config.target_key)
            .await?
            .ok_or_else(|| {
                AutomationError::InvalidConfig(format!(
                    "Unknown SLA target '{}'",
                    config.target_key
                ))
            })?;
        let field = config.entity_field.as_deref().unwrap_or(DEFAULT_ENTITY_FIELD);
        let entity_id = uuid_field(ctx.payload, field)?;

        let opened = SlaIncident::open_if_absent(
            pool,
            &target.key,
            sla_entity_type(&target.key),
            entity_id,
            config.severity.unwrap_or(target.severity),
        )
        .await?;
        if let Some(incident) = opened {
            tracing::info!(
                incident_id = %incident.id,
                target_key = %incident.target_key,
                %entity_id,
                "Workflow opened SLA incident"
            );
        }
        Ok(())
    }

    async fn close_incidents(
        &self,
        config: IncidentConfig,
        ctx: &ActionContext<'_>,
    ) -> Result<(), AutomationError> {
        let field = config.entity_field.as_deref().unwrap_or(DEFAULT_ENTITY_FIELD);
        let entity_id = uuid_field(ctx.payload, field)?;
        let closed =
            SlaIncident::close_for_entity(&self.db.pool, &config.target_key, entity_id).await?;
        tracing::debug!(
            target_key = %config.target_key,
            %entity_id,
            closed,
            "Workflow closed SLA incidents"
        );
        Ok(())
    }

    async fn call_webhook(
        &self,
        config: WebhookConfig,
        ctx: &ActionContext<'_>,
    ) -> Result<(), AutomationError> {
        let mut request = self
            .http
            .post(&config.url)
            .timeout(self.webhook_timeout)
            .json(&json!({
                "workflow_id": ctx.workflow_id,
                "trigger_type": ctx.trigger_type,
                "payload": ctx.payload,
            }));
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AutomationError::WebhookStatus(status.as_u16()));
        }
        tracing::debug!(url = %config.url, status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}
