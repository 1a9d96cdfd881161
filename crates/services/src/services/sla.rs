use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use db::{
    DBService, DbErr,
    events::{
        ENTITY_APPOINTMENT, ENTITY_CONVERSATION, SLA_APPOINTMENT_OVERRUN, SLA_APPOINTMENT_PENDING,
        SLA_CHAT_UNANSWERED, SlaIncidentOpenedPayload, TRIGGER_SLA_INCIDENT_OPENED,
    },
    models::{
        appointment::Appointment,
        conversation::Conversation,
        sla::{SlaIncident, SlaTarget},
    },
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::services::automation::AutomationService;

const DEFAULT_PENDING_MINUTES: i32 = 24 * 60;
const DEFAULT_OVERRUN_MINUTES: i32 = 30;
const DEFAULT_CHAT_MINUTES: i32 = 30;

/// Point-in-time breach counts for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SlaMetrics {
    /// Pending appointments whose start passed more than the threshold ago.
    pub pending_over_threshold: u64,
    /// In-progress appointments past their scheduled end plus grace.
    pub overrunning: u64,
    pub unanswered_chats: u64,
    pub open_incidents: u64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct SweepReport {
    pub checked_targets: usize,
    pub opened: usize,
}

#[derive(Clone)]
pub struct SlaService {
    db: DBService,
}

struct Thresholds {
    targets: HashMap<String, SlaTarget>,
}

impl Thresholds {
    async fn load(db: &DBService) -> Result<Self, DbErr> {
        let targets = SlaTarget::find_all(&db.pool)
            .await?
            .into_iter()
            .map(|target| (target.key.clone(), target))
            .collect();
        Ok(Self { targets })
    }

    fn minutes(&self, key: &str, fallback: i32) -> Duration {
        let minutes = self
            .targets
            .get(key)
            .map(|target| target.threshold_minutes)
            .unwrap_or(fallback);
        Duration::minutes(i64::from(minutes.max(1)))
    }

    fn active(&self, key: &str) -> Option<&SlaTarget> {
        self.targets.get(key).filter(|target| target.is_active)
    }
}

impl SlaService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn compute_metrics(&self, now: DateTime<Utc>) -> Result<SlaMetrics, DbErr> {
        let pool = &self.db.pool;
        let thresholds = Thresholds::load(&self.db).await?;

        let pending_over_threshold = Appointment::count_pending_scheduled_before(
            pool,
            now - thresholds.minutes(SLA_APPOINTMENT_PENDING, DEFAULT_PENDING_MINUTES),
        )
        .await?;
        let overrunning = Appointment::find_overrunning(
            pool,
            now,
            thresholds.minutes(SLA_APPOINTMENT_OVERRUN, DEFAULT_OVERRUN_MINUTES),
        )
        .await?
        .len() as u64;
        let unanswered_chats = Conversation::count_unanswered_before(
            pool,
            now - thresholds.minutes(SLA_CHAT_UNANSWERED, DEFAULT_CHAT_MINUTES),
        )
        .await?;
        let open_incidents = SlaIncident::count_open(pool).await?;

        Ok(SlaMetrics {
            pending_over_threshold,
            overrunning,
            unanswered_chats,
            open_incidents,
            computed_at: now,
        })
    }

    /// Opens an incident for every breaching entity of every active target and
    /// emits `sla_incident_opened` for each new one.
    pub async fn sweep(
        &self,
        now: DateTime<Utc>,
        automation: &AutomationService,
    ) -> Result<SweepReport, DbErr> {
        let pool = &self.db.pool;
        let thresholds = Thresholds::load(&self.db).await?;
        let mut report = SweepReport::default();

        if let Some(target) = thresholds.active(SLA_APPOINTMENT_PENDING) {
            report.checked_targets += 1;
            let cutoff = now - thresholds.minutes(&target.key, DEFAULT_PENDING_MINUTES);
            let breaching: Vec<Uuid> = Appointment::find_pending_scheduled_before(pool, cutoff)
                .await?
                .into_iter()
                .map(|appointment| appointment.id)
                .collect();
            report.opened += self
                .open_all(target, ENTITY_APPOINTMENT, &breaching, automation)
                .await?;
        }

        if let Some(target) = thresholds.active(SLA_APPOINTMENT_OVERRUN) {
            report.checked_targets += 1;
            let grace = thresholds.minutes(&target.key, DEFAULT_OVERRUN_MINUTES);
            let breaching: Vec<Uuid> = Appointment::find_overrunning(pool, now, grace)
                .await?
                .into_iter()
                .map(|appointment| appointment.id)
                .collect();
            report.opened += self
                .open_all(target, ENTITY_APPOINTMENT, &breaching, automation)
                .await?;
        }

        if let Some(target) = thresholds.active(SLA_CHAT_UNANSWERED) {
            report.checked_targets += 1;
            let cutoff = now - thresholds.minutes(&target.key, DEFAULT_CHAT_MINUTES);
            let breaching: Vec<Uuid> = Conversation::find_unanswered_before(pool, cutoff)
                .await?
                .into_iter()
                .map(|conversation| conversation.id)
                .collect();
            report.opened += self
                .open_all(target, ENTITY_CONVERSATION, &breaching, automation)
                .await?;
        }

        if report.opened > 0 {
            tracing::info!(opened = report.opened, "SLA sweep opened incidents");
        }
        Ok(report)
    }

    async fn open_all(
        &self,
        target: &SlaTarget,
        entity_type: &str,
        entity_ids: &[Uuid],
        automation: &AutomationService,
    ) -> Result<usize, DbErr> {
        let mut opened = 0;
        for entity_id in entity_ids {
            let Some(incident) = SlaIncident::open_if_absent(
                &self.db.pool,
                &target.key,
                entity_type,
                *entity_id,
                target.severity,
            )
            .await?
            else {
                continue;
            };
            opened += 1;
            automation.trigger(
                TRIGGER_SLA_INCIDENT_OPENED,
                SlaIncidentOpenedPayload {
                    incident_id: incident.id,
                    target_key: incident.target_key,
                    entity_type: incident.entity_type,
                    entity_id: incident.entity_id,
                },
            );
        }
        Ok(opened)
    }
}
