use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{sla_incident, sla_target},
    events::{SLA_APPOINTMENT_OVERRUN, SLA_APPOINTMENT_PENDING, SLA_CHAT_UNANSWERED},
    types::{SlaIncidentStatus, SlaSeverity},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SlaTarget {
    pub key: String,
    pub name: String,
    pub threshold_minutes: i32,
    pub warning_minutes: i32,
    pub severity: SlaSeverity,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateSlaTarget {
    pub name: Option<String>,
    pub threshold_minutes: Option<i32>,
    pub warning_minutes: Option<i32>,
    pub severity: Option<SlaSeverity>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SlaIncident {
    pub id: Uuid,
    pub target_key: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub severity: SlaSeverity,
    pub status: SlaIncidentStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// `(key, name, threshold_minutes, warning_minutes, severity)`
const DEFAULT_TARGETS: [(&str, &str, i32, i32, SlaSeverity); 3] = [
    (
        SLA_APPOINTMENT_PENDING,
        "Pending appointments confirmed within a day",
        24 * 60,
        20 * 60,
        SlaSeverity::Medium,
    ),
    (
        SLA_APPOINTMENT_OVERRUN,
        "In-progress appointments finish on time",
        30,
        15,
        SlaSeverity::High,
    ),
    (
        SLA_CHAT_UNANSWERED,
        "Customer messages answered within 30 minutes",
        30,
        20,
        SlaSeverity::Medium,
    ),
];

impl SlaTarget {
    fn from_model(model: sla_target::Model) -> Self {
        Self {
            key: model.key,
            name: model.name,
            threshold_minutes: model.threshold_minutes,
            warning_minutes: model.warning_minutes,
            severity: model.severity,
            is_active: model.is_active,
            updated_at: model.updated_at,
        }
    }

    /// Inserts any missing built-in target. Existing rows keep their edits.
    pub async fn ensure_defaults<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        let mut inserted = 0;
        for (key, name, threshold, warning, severity) in DEFAULT_TARGETS {
            if sla_target::Entity::find_by_id(key.to_string())
                .one(db)
                .await?
                .is_some()
            {
                continue;
            }
            sla_target::ActiveModel {
                key: Set(key.to_string()),
                name: Set(name.to_string()),
                threshold_minutes: Set(threshold),
                warning_minutes: Set(warning),
                severity: Set(severity),
                is_active: Set(true),
                updated_at: Set(Utc::now()),
            }
            .insert(db)
            .await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = sla_target::Entity::find()
            .order_by_asc(sla_target::Column::Key)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_key<C: ConnectionTrait>(
        db: &C,
        key: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = sla_target::Entity::find_by_id(key.to_string())
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        key: &str,
        data: &UpdateSlaTarget,
    ) -> Result<Self, DbErr> {
        let record = sla_target::Entity::find_by_id(key.to_string())
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("SLA target not found".to_string()))?;

        let mut active: sla_target::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(name.clone());
        }
        if let Some(threshold) = data.threshold_minutes {
            active.threshold_minutes = Set(threshold.max(1));
        }
        if let Some(warning) = data.warning_minutes {
            active.warning_minutes = Set(warning.max(0));
        }
        if let Some(severity) = data.severity {
            active.severity = Set(severity);
        }
        if let Some(is_active) = data.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }
}

impl SlaIncident {
    fn from_model(model: sla_incident::Model) -> Self {
        Self {
            id: model.id,
            target_key: model.target_key,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            severity: model.severity,
            status: model.status,
            opened_at: model.opened_at,
            closed_at: model.closed_at,
        }
    }

    pub async fn find_open<C: ConnectionTrait>(
        db: &C,
        target_key: &str,
        entity_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let record = sla_incident::Entity::find()
            .filter(sla_incident::Column::TargetKey.eq(target_key))
            .filter(sla_incident::Column::EntityId.eq(entity_id))
            .filter(sla_incident::Column::Status.eq(SlaIncidentStatus::Open))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn count_open<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
        sla_incident::Entity::find()
            .filter(sla_incident::Column::Status.eq(SlaIncidentStatus::Open))
            .count(db)
            .await
    }

    pub async fn find_recent<C: ConnectionTrait>(
        db: &C,
        status: Option<SlaIncidentStatus>,
        limit: u64,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = sla_incident::Entity::find();
        if let Some(status) = status {
            query = query.filter(sla_incident::Column::Status.eq(status));
        }
        let records = query
            .order_by_desc(sla_incident::Column::OpenedAt)
            .limit(limit)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Opens an incident unless one is already open for the same target and
    /// entity. Returns `None` when an open incident already exists.
    pub async fn open_if_absent<C: ConnectionTrait>(
        db: &C,
        target_key: &str,
        entity_type: &str,
        entity_id: Uuid,
        severity: SlaSeverity,
    ) -> Result<Option<Self>, DbErr> {
        if Self::find_open(db, target_key, entity_id).await?.is_some() {
            return Ok(None);
        }
        let active = sla_incident::ActiveModel {
            id: Set(Uuid::new_v4()),
            target_key: Set(target_key.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            severity: Set(severity),
            status: Set(SlaIncidentStatus::Open),
            opened_at: Set(Utc::now()),
            closed_at: Set(None),
        };
        let model = active.insert(db).await?;
        Ok(Some(Self::from_model(model)))
    }

    pub async fn close_for_entity<C: ConnectionTrait>(
        db: &C,
        target_key: &str,
        entity_id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = sla_incident::Entity::update_many()
            .col_expr(
                sla_incident::Column::Status,
                sea_orm::sea_query::Expr::value(SlaIncidentStatus::Closed),
            )
            .col_expr(
                sla_incident::Column::ClosedAt,
                sea_orm::sea_query::Expr::value(Some(Utc::now())),
            )
            .filter(sla_incident::Column::TargetKey.eq(target_key))
            .filter(sla_incident::Column::EntityId.eq(entity_id))
            .filter(sla_incident::Column::Status.eq(SlaIncidentStatus::Open))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::ENTITY_APPOINTMENT, test_db::setup_db};

    #[tokio::test]
    async fn defaults_are_seeded_once_and_keep_edits() {
        let db = setup_db().await;
        assert_eq!(SlaTarget::ensure_defaults(&db).await.unwrap(), 3);

        SlaTarget::update(
            &db,
            SLA_CHAT_UNANSWERED,
            &UpdateSlaTarget {
                threshold_minutes: Some(45),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(SlaTarget::ensure_defaults(&db).await.unwrap(), 0);
        let chat = SlaTarget::find_by_key(&db, SLA_CHAT_UNANSWERED)
            .await
            .unwrap()
            .expect("chat target");
        assert_eq!(chat.threshold_minutes, 45);
        let pending = SlaTarget::find_by_key(&db, SLA_APPOINTMENT_PENDING)
            .await
            .unwrap()
            .expect("pending target");
        assert_eq!(pending.threshold_minutes, 1440);
    }

    #[tokio::test]
    async fn at_most_one_open_incident_per_entity() {
        let db = setup_db().await;
        let entity_id = Uuid::new_v4();

        let first = SlaIncident::open_if_absent(
            &db,
            SLA_APPOINTMENT_PENDING,
            ENTITY_APPOINTMENT,
            entity_id,
            SlaSeverity::Medium,
        )
        .await
        .unwrap();
        assert!(first.is_some());

        let second = SlaIncident::open_if_absent(
            &db,
            SLA_APPOINTMENT_PENDING,
            ENTITY_APPOINTMENT,
            entity_id,
            SlaSeverity::Medium,
        )
        .await
        .unwrap();
        assert!(second.is_none());

        let closed = SlaIncident::close_for_entity(&db, SLA_APPOINTMENT_PENDING, entity_id)
            .await
            .unwrap();
        assert_eq!(closed, 1);
        assert!(
            SlaIncident::find_open(&db, SLA_APPOINTMENT_PENDING, entity_id)
                .await
                .unwrap()
                .is_none()
        );

        let reopened = SlaIncident::open_if_absent(
            &db,
            SLA_APPOINTMENT_PENDING,
            ENTITY_APPOINTMENT,
            entity_id,
            SlaSeverity::High,
        )
        .await
        .unwrap();
        assert!(reopened.is_some());
        assert_eq!(SlaIncident::count_open(&db).await.unwrap(), 1);

        let closed_list = SlaIncident::find_recent(&db, Some(SlaIncidentStatus::Closed), 10)
            .await
            .unwrap();
        assert_eq!(closed_list.len(), 1);
        assert!(closed_list[0].closed_at.is_some());
    }
}
