use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use db::{
    DBService, DbErr,
    models::{
        sla::SlaIncident,
        workflow::Workflow,
        workflow_run::WorkflowRun,
    },
    types::WorkflowRunStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use ts_rs::TS;
use uuid::Uuid;

use crate::services::{config::AutomationConfig, notification::NotificationService};

#[path = "automation/actions.rs"]
pub mod actions;
#[path = "automation/conditions.rs"]
pub mod conditions;

use actions::ActionContext;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Invalid action config: {0}")]
    InvalidConfig(String),
    #[error("Webhook request failed: {0}")]
    Webhook(#[from] reqwest::Error),
    #[error("Webhook responded with status {0}")]
    WebhookStatus(u16),
}

/// A named business event with a flat JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TriggerEvent {
    pub trigger_type: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub payload: Value,
}

impl TriggerEvent {
    pub fn new(trigger_type: &str, payload: impl Serialize) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or_else(|err| {
            tracing::warn!(trigger_type, "Failed to serialize trigger payload: {err}");
            Value::Null
        });
        Self {
            trigger_type: trigger_type.to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutomationCommand {
    Trigger(TriggerEvent),
    CloseIncidents { target_key: String, entity_id: Uuid },
}

/// Handle used by request handlers. Sending never blocks and never fails the
/// caller; a dropped worker only costs a log line.
#[derive(Clone)]
pub struct AutomationService {
    tx: mpsc::UnboundedSender<AutomationCommand>,
}

impl AutomationService {
    pub fn start(engine: AutomationEngine) -> Self {
        let (service, rx) = Self::detached();
        engine.spawn_worker(rx);
        service
    }

    /// A handle whose commands land in the returned receiver instead of a
    /// worker.
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<AutomationCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: AutomationCommand) {
        if let Err(err) = self.tx.send(command) {
            tracing::warn!(command = ?err.0, "Automation worker is gone, dropping command");
        }
    }

    pub fn trigger(&self, trigger_type: &str, payload: impl Serialize) {
        tracing::debug!(trigger_type, "Emitting automation trigger");
        self.send(AutomationCommand::Trigger(TriggerEvent::new(
            trigger_type,
            payload,
        )));
    }

    pub fn close_incidents_for_entity(&self, target_key: &str, entity_id: Uuid) {
        self.send(AutomationCommand::CloseIncidents {
            target_key: target_key.to_string(),
            entity_id,
        });
    }
}

/// Matches triggers to workflows and runs their actions.
#[derive(Clone)]
pub struct AutomationEngine {
    db: DBService,
    http: reqwest::Client,
    notifications: NotificationService,
    webhook_timeout: StdDuration,
}

impl AutomationEngine {
    pub fn new(db: DBService, config: &AutomationConfig) -> Self {
        Self {
            notifications: NotificationService::new(db.clone()),
            db,
            http: reqwest::Client::new(),
            webhook_timeout: StdDuration::from_secs(config.webhook_timeout_secs),
        }
    }

    fn spawn_worker(self, mut rx: mpsc::UnboundedReceiver<AutomationCommand>) {
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                self.handle_command(command).await;
            }
            tracing::debug!("Automation worker stopped");
        });
    }

    pub async fn handle_command(&self, command: AutomationCommand) {
        match command {
            AutomationCommand::Trigger(event) => {
                if let Err(err) = self.handle_trigger(&event).await {
                    tracing::error!(
                        error = %err,
                        trigger_type = %event.trigger_type,
                        "automation trigger failed"
                    );
                }
            }
            AutomationCommand::CloseIncidents {
                target_key,
                entity_id,
            } => match SlaIncident::close_for_entity(&self.db.pool, &target_key, entity_id).await {
                Ok(0) => {}
                Ok(closed) => {
                    tracing::info!(%target_key, %entity_id, closed, "Closed SLA incidents");
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        %target_key,
                        %entity_id,
                        "closing SLA incidents failed"
                    );
                }
            },
        }
    }

    /// Records one run per matching workflow. Delayed runs come back queued
    /// and finish later in the background.
    pub async fn handle_trigger(
        &self,
        event: &TriggerEvent,
    ) -> Result<Vec<WorkflowRun>, AutomationError> {
        let workflows = Workflow::find_active_by_trigger(&self.db.pool, &event.trigger_type).await?;
        let mut runs = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            runs.push(self.start_run(workflow, event).await?);
        }
        Ok(runs)
    }

    async fn start_run(
        &self,
        workflow: Workflow,
        event: &TriggerEvent,
    ) -> Result<WorkflowRun, AutomationError> {
        let delay_minutes = i64::from(workflow.minutes_delay.max(0));
        let run = WorkflowRun::create_queued(
            &self.db.pool,
            workflow.id,
            &event.trigger_type,
            &event.payload,
            Utc::now() + Duration::minutes(delay_minutes),
        )
        .await?;

        if delay_minutes == 0 {
            return self.execute_run(&workflow, run.id, event).await;
        }

        let engine = self.clone();
        let event = event.clone();
        let run_id = run.id;
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(delay_minutes as u64 * 60)).await;
            if let Err(err) = engine.execute_delayed(workflow.id, run_id, &event).await {
                tracing::error!(error = %err, %run_id, "delayed workflow run failed");
            }
        });
        Ok(run)
    }

    async fn execute_delayed(
        &self,
        workflow_id: Uuid,
        run_id: Uuid,
        event: &TriggerEvent,
    ) -> Result<WorkflowRun, AutomationError> {
        match Workflow::find_by_id(&self.db.pool, workflow_id).await? {
            Some(workflow) if workflow.is_active => {
                self.execute_run(&workflow, run_id, event).await
            }
            _ => Ok(WorkflowRun::finish(
                &self.db.pool,
                run_id,
                WorkflowRunStatus::Skipped,
                Some("Workflow was disabled or removed before the delay elapsed".to_string()),
            )
            .await?),
        }
    }

    async fn execute_run(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
        event: &TriggerEvent,
    ) -> Result<WorkflowRun, AutomationError> {
        let pool = &self.db.pool;
        if let Some(reason) = conditions::first_unsatisfied(&workflow.conditions, &event.payload) {
            tracing::debug!(workflow_id = %workflow.id, %reason, "Workflow run skipped");
            return Ok(
                WorkflowRun::finish(pool, run_id, WorkflowRunStatus::Skipped, Some(reason))
                    .await?,
            );
        }

        let ctx = ActionContext {
            workflow_id: workflow.id,
            trigger_type: &event.trigger_type,
            payload: &event.payload,
        };
        for action in &workflow.actions {
            if let Err(err) = self.execute_action(action, &ctx).await {
                tracing::warn!(
                    workflow_id = %workflow.id,
                    action_type = %action.action_type,
                    "Workflow action failed: {err}"
                );
                return Ok(WorkflowRun::finish(
                    pool,
                    run_id,
                    WorkflowRunStatus::Failed,
                    Some(err.to_string()),
                )
                .await?);
            }
        }

        Ok(WorkflowRun::finish(pool, run_id, WorkflowRunStatus::Completed, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::{
        events::{SLA_APPOINTMENT_PENDING, TRIGGER_APPOINTMENT_STATUS_CHANGED},
        models::{
            notification::Notification,
            user::{CreateUser, User},
            workflow::{CreateWorkflow, UpdateWorkflow, WorkflowAction},
        },
        types::{SlaSeverity, UserRole},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;

    use super::*;

    async fn setup() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        db::models::sla::SlaTarget::ensure_defaults(&pool)
            .await
            .unwrap();
        DBService::from_connection(pool)
    }

    fn engine(db: &DBService) -> AutomationEngine {
        AutomationEngine::new(db.clone(), &AutomationConfig::default())
    }

    async fn workflow(
        db: &DBService,
        conditions: Vec<&str>,
        actions: Vec<WorkflowAction>,
    ) -> Workflow {
        Workflow::create(
            &db.pool,
            &CreateWorkflow {
                name: "Confirmation notice".to_string(),
                trigger_type: TRIGGER_APPOINTMENT_STATUS_CHANGED.to_string(),
                minutes_delay: 0,
                is_active: Some(true),
                conditions: conditions.into_iter().map(str::to_string).collect(),
                actions,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn matching_workflow_notifies_customer() {
        let db = setup().await;
        let customer = User::create(
            &db.pool,
            &CreateUser {
                email: "owner@example.com".to_string(),
                password_hash: "hash".to_string(),
                full_name: "Owner".to_string(),
                phone: None,
                role: UserRole::Customer,
            },
        )
        .await
        .unwrap();
        workflow(
            &db,
            vec!["new_status == confirmed"],
            vec![WorkflowAction {
                action_type: actions::ACTION_SEND_NOTIFICATION.to_string(),
                action_config: json!({
                    "title": "Appointment {{new_status}}",
                    "body": "See you soon",
                }),
            }],
        )
        .await;

        let event = TriggerEvent::new(
            TRIGGER_APPOINTMENT_STATUS_CHANGED,
            json!({
                "appointment_id": Uuid::new_v4(),
                "customer_id": customer.id,
                "old_status": "pending",
                "new_status": "confirmed",
            }),
        );
        let runs = engine(&db).handle_trigger(&event).await.unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, WorkflowRunStatus::Completed);
        let inbox = Notification::find_inbox(&db.pool, customer.id, Utc::now(), 10)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "Appointment confirmed");
    }

    #[tokio::test]
    async fn unmet_conditions_skip_and_bad_actions_fail() {
        let db = setup().await;
        let gated = workflow(&db, vec!["new_status == completed"], vec![]).await;
        let broken = workflow(
            &db,
            vec![],
            vec![WorkflowAction {
                action_type: actions::ACTION_OPEN_SLA_INCIDENT.to_string(),
                action_config: json!({ "target_key": "no.such.target" }),
            }],
        )
        .await;

        let event = TriggerEvent::new(
            TRIGGER_APPOINTMENT_STATUS_CHANGED,
            json!({ "appointment_id": Uuid::new_v4(), "new_status": "confirmed" }),
        );
        let runs = engine(&db).handle_trigger(&event).await.unwrap();

        assert_eq!(runs.len(), 2);
        let run_for = |id: Uuid| runs.iter().find(|run| run.workflow_id == id).unwrap();
        let skipped = run_for(gated.id);
        assert_eq!(skipped.status, WorkflowRunStatus::Skipped);
        assert!(skipped.error.as_deref().unwrap().contains("new_status"));
        let failed = run_for(broken.id);
        assert_eq!(failed.status, WorkflowRunStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("no.such.target"));
    }

    #[tokio::test]
    async fn unknown_actions_are_skipped_without_failing() {
        let db = setup().await;
        workflow(
            &db,
            vec![],
            vec![WorkflowAction {
                action_type: "send_carrier_pigeon".to_string(),
                action_config: json!({}),
            }],
        )
        .await;

        let event = TriggerEvent::new(TRIGGER_APPOINTMENT_STATUS_CHANGED, json!({}));
        let runs = engine(&db).handle_trigger(&event).await.unwrap();
        assert_eq!(runs[0].status, WorkflowRunStatus::Completed);
    }

    #[tokio::test]
    async fn delayed_run_is_queued_then_skipped_once_workflow_is_disabled() {
        let db = setup().await;
        let delayed = Workflow::create(
            &db.pool,
            &CreateWorkflow {
                name: "Follow-up".to_string(),
                trigger_type: TRIGGER_APPOINTMENT_STATUS_CHANGED.to_string(),
                minutes_delay: 30,
                is_active: Some(true),
                conditions: vec![],
                actions: vec![],
            },
        )
        .await
        .unwrap();

        let before = Utc::now();
        let event = TriggerEvent::new(TRIGGER_APPOINTMENT_STATUS_CHANGED, json!({}));
        let runs = engine(&db).handle_trigger(&event).await.unwrap();
        assert_eq!(runs.len(), 1);
        let queued = &runs[0];
        assert_eq!(queued.status, WorkflowRunStatus::Queued);
        assert!(queued.scheduled_for >= before + Duration::minutes(30) - Duration::seconds(1));
        assert!(queued.scheduled_for <= Utc::now() + Duration::minutes(30));

        Workflow::update(
            &db.pool,
            delayed.id,
            &UpdateWorkflow {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Fire the pending sleep, then let the run finish on the real clock.
        tokio::time::pause();
        tokio::time::advance(StdDuration::from_secs(30 * 60 + 1)).await;
        tokio::time::resume();

        let mut finished = None;
        for _ in 0..100 {
            let run = WorkflowRun::find_by_id(&db.pool, queued.id)
                .await
                .unwrap()
                .unwrap();
            if run.status != WorkflowRunStatus::Queued {
                finished = Some(run);
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        let finished = finished.expect("delayed run never finished");
        assert_eq!(finished.status, WorkflowRunStatus::Skipped);
        assert!(finished.error.as_deref().unwrap().contains("disabled"));
    }

    #[tokio::test]
    async fn close_command_closes_open_incidents() {
        let db = setup().await;
        let appointment_id = Uuid::new_v4();
        SlaIncident::open_if_absent(
            &db.pool,
            SLA_APPOINTMENT_PENDING,
            "appointment",
            appointment_id,
            SlaSeverity::Medium,
        )
        .await
        .unwrap();

        engine(&db)
            .handle_command(AutomationCommand::CloseIncidents {
                target_key: SLA_APPOINTMENT_PENDING.to_string(),
                entity_id: appointment_id,
            })
            .await;

        assert!(
            SlaIncident::find_open(&db.pool, SLA_APPOINTMENT_PENDING, appointment_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn detached_handle_records_commands() {
        let (service, mut rx) = AutomationService::detached();
        let entity_id = Uuid::new_v4();
        service.close_incidents_for_entity(SLA_APPOINTMENT_PENDING, entity_id);
        service.trigger(TRIGGER_APPOINTMENT_STATUS_CHANGED, json!({ "a": 1 }));

        assert_eq!(
            rx.recv().await,
            Some(AutomationCommand::CloseIncidents {
                target_key: SLA_APPOINTMENT_PENDING.to_string(),
                entity_id,
            })
        );
        assert!(matches!(
            rx.recv().await,
            Some(AutomationCommand::Trigger(event)) if event.payload == json!({ "a": 1 })
        ));

        drop(rx);
        service.trigger(TRIGGER_APPOINTMENT_STATUS_CHANGED, json!({}));
    }
}
