use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{appointment, appointment_service, pet, user},
    models::grooming_service::GroomingService,
    types::AppointmentStatus,
};

/// Longest bookable appointment. Service durations and booked totals are
/// both capped here, which bounds the overlap lookup window.
pub const MAX_APPOINTMENT_MINUTES: i64 = 24 * 60;

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Appointment not found")]
    NotFound,
    #[error("Pet not found")]
    PetNotFound,
    #[error("Pet does not belong to this customer")]
    PetNotOwned,
    #[error("At least one service is required")]
    NoServices,
    #[error("Service {0} is not available")]
    ServiceUnavailable(Uuid),
    #[error("The requested time overlaps appointment {0}")]
    SlotConflict(Uuid),
    #[error("Appointment would last {0} minutes; the limit is {max}", max = MAX_APPOINTMENT_MINUTES)]
    TooLong(i64),
}

/// Service line booked on an appointment, priced at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AppointmentLine {
    pub service_id: Uuid,
    pub price_cents: i64,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub pet_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_price_cents: i64,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub services: Vec<AppointmentLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAppointment {
    /// Only honoured when staff book on behalf of a customer.
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub pet_id: Uuid,
    pub service_ids: Vec<Uuid>,
    #[serde(default)]
    pub staff_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateAppointment {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub staff_id: Option<Uuid>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Result of a status write, carrying the status it replaced.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub appointment: Appointment,
    pub old_status: AppointmentStatus,
}

impl Appointment {
    fn from_model(model: appointment::Model, services: Vec<AppointmentLine>) -> Self {
        Self {
            id: model.id,
            customer_id: model.customer_id,
            pet_id: model.pet_id,
            staff_id: model.staff_id,
            scheduled_at: model.scheduled_at,
            duration_minutes: model.duration_minutes,
            total_price_cents: model.total_price_cents,
            status: model.status,
            notes: model.notes,
            internal_notes: model.internal_notes,
            services,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    async fn with_lines<C: ConnectionTrait>(
        db: &C,
        models: Vec<appointment::Model>,
    ) -> Result<Vec<Self>, DbErr> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = models.iter().map(|model| model.id).collect();
        let lines = appointment_service::Entity::find()
            .filter(appointment_service::Column::AppointmentId.is_in(ids))
            .all(db)
            .await?;

        let mut by_appointment: HashMap<Uuid, Vec<AppointmentLine>> = HashMap::new();
        for line in lines {
            by_appointment
                .entry(line.appointment_id)
                .or_default()
                .push(AppointmentLine {
                    service_id: line.service_id,
                    price_cents: line.price_cents,
                    duration_minutes: line.duration_minutes,
                });
        }

        Ok(models
            .into_iter()
            .map(|model| {
                let lines = by_appointment.remove(&model.id).unwrap_or_default();
                Self::from_model(model, lines)
            })
            .collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let Some(record) = appointment::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        Ok(Self::with_lines(db, vec![record]).await?.pop())
    }

    pub async fn find_for_customer<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = appointment::Entity::find()
            .filter(appointment::Column::CustomerId.eq(customer_id))
            .order_by_desc(appointment::Column::ScheduledAt)
            .all(db)
            .await?;
        Self::with_lines(db, records).await
    }

    pub async fn find_filtered<C: ConnectionTrait>(
        db: &C,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = appointment::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(appointment::Column::Status.eq(status));
        }
        if let Some(staff_id) = filter.staff_id {
            query = query.filter(appointment::Column::StaffId.eq(staff_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(appointment::Column::CustomerId.eq(customer_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(appointment::Column::ScheduledAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(appointment::Column::ScheduledAt.lt(to));
        }
        let records = query
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(db)
            .await?;
        Self::with_lines(db, records).await
    }

    /// Non-cancelled appointments for a staff member that may intersect
    /// `[start, end)`.
    pub async fn find_for_staff_between<C: ConnectionTrait>(
        db: &C,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, DbErr> {
        let window_start = start - Duration::minutes(MAX_APPOINTMENT_MINUTES);
        let records = appointment::Entity::find()
            .filter(appointment::Column::StaffId.eq(staff_id))
            .filter(appointment::Column::Status.ne(AppointmentStatus::Cancelled))
            .filter(appointment::Column::ScheduledAt.gte(window_start))
            .filter(appointment::Column::ScheduledAt.lt(end))
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(db)
            .await?;
        let appointments = Self::with_lines(db, records).await?;
        Ok(appointments
            .into_iter()
            .filter(|existing| existing.ends_at() > start)
            .collect())
    }

    /// Row lock on the staff member's account. Held until the caller's
    /// transaction ends, so overlap checks for one calendar run one at a time.
    /// SQLite renders no `FOR UPDATE`; its writers are already serialized.
    fn staff_calendar_lock(staff_id: Uuid) -> Select<user::Entity> {
        user::Entity::find_by_id(staff_id).lock_exclusive()
    }

    async fn lock_staff_calendar<C: ConnectionTrait>(db: &C, staff_id: Uuid) -> Result<(), DbErr> {
        Self::staff_calendar_lock(staff_id).one(db).await?;
        Ok(())
    }

    pub async fn find_conflict<C: ConnectionTrait>(
        db: &C,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Option<Self>, DbErr> {
        let existing = Self::find_for_staff_between(db, staff_id, start, end).await?;
        Ok(existing
            .into_iter()
            .find(|appointment| Some(appointment.id) != exclude))
    }

    /// Inserts the appointment and its service lines. Callers run this inside
    /// a transaction so the overlap check and the writes commit together.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        customer_id: Uuid,
        data: &CreateAppointment,
    ) -> Result<Self, AppointmentError> {
        let pet = pet::Entity::find_by_id(data.pet_id)
            .one(db)
            .await?
            .ok_or(AppointmentError::PetNotFound)?;
        if pet.owner_id != customer_id {
            return Err(AppointmentError::PetNotOwned);
        }

        let mut service_ids = data.service_ids.clone();
        service_ids.sort();
        service_ids.dedup();
        if service_ids.is_empty() {
            return Err(AppointmentError::NoServices);
        }
        let services = GroomingService::find_by_ids(db, &service_ids).await?;
        for service_id in &service_ids {
            match services.iter().find(|service| service.id == *service_id) {
                Some(service) if service.is_active => {}
                _ => return Err(AppointmentError::ServiceUnavailable(*service_id)),
            }
        }

        let total_minutes: i64 = services
            .iter()
            .map(|s| i64::from(s.duration_minutes))
            .sum();
        let duration_minutes = i32::try_from(total_minutes)
            .ok()
            .filter(|_| total_minutes <= MAX_APPOINTMENT_MINUTES)
            .ok_or(AppointmentError::TooLong(total_minutes))?;
        let total_price_cents: i64 = services.iter().map(|s| s.price_cents).sum();
        let start = data.scheduled_at;
        let end = start + Duration::minutes(total_minutes);

        if let Some(staff_id) = data.staff_id {
            Self::lock_staff_calendar(db, staff_id).await?;
            if let Some(existing) = Self::find_conflict(db, staff_id, start, end, None).await? {
                return Err(AppointmentError::SlotConflict(existing.id));
            }
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let active = appointment::ActiveModel {
            id: Set(id),
            customer_id: Set(customer_id),
            pet_id: Set(data.pet_id),
            staff_id: Set(data.staff_id),
            scheduled_at: Set(start),
            duration_minutes: Set(duration_minutes),
            total_price_cents: Set(total_price_cents),
            status: Set(AppointmentStatus::Pending),
            notes: Set(data.notes.clone()),
            internal_notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = active.insert(db).await?;

        let mut lines = Vec::with_capacity(services.len());
        for service in &services {
            appointment_service::ActiveModel {
                id: Set(Uuid::new_v4()),
                appointment_id: Set(id),
                service_id: Set(service.id),
                price_cents: Set(service.price_cents),
                duration_minutes: Set(service.duration_minutes),
            }
            .insert(db)
            .await?;
            lines.push(AppointmentLine {
                service_id: service.id,
                price_cents: service.price_cents,
                duration_minutes: service.duration_minutes,
            });
        }

        Ok(Self::from_model(model, lines))
    }

    /// Applies field edits. Moving the appointment re-runs the overlap check.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateAppointment,
    ) -> Result<Self, AppointmentError> {
        let record = appointment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        let start = data.scheduled_at.unwrap_or(record.scheduled_at);
        let staff_id = data.staff_id.or(record.staff_id);
        let moved = data.scheduled_at.is_some_and(|at| at != record.scheduled_at)
            || data.staff_id.is_some_and(|staff| Some(staff) != record.staff_id);
        if moved && let Some(staff_id) = staff_id {
            Self::lock_staff_calendar(db, staff_id).await?;
            let end = start + Duration::minutes(i64::from(record.duration_minutes));
            if let Some(existing) = Self::find_conflict(db, staff_id, start, end, Some(id)).await? {
                return Err(AppointmentError::SlotConflict(existing.id));
            }
        }

        let mut active: appointment::ActiveModel = record.into();
        active.scheduled_at = Set(start);
        active.staff_id = Set(staff_id);
        if let Some(notes) = data.notes.clone() {
            active.notes = Set(Some(notes));
        }
        if let Some(internal_notes) = data.internal_notes.clone() {
            active.internal_notes = Set(Some(internal_notes));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        Self::with_lines(db, vec![updated])
            .await?
            .pop()
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn update_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<StatusChange, AppointmentError> {
        let record = appointment::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        let old_status = record.status;

        let mut active: appointment::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        let appointment = Self::with_lines(db, vec![updated])
            .await?
            .pop()
            .ok_or(AppointmentError::NotFound)?;
        Ok(StatusChange {
            appointment,
            old_status,
        })
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = appointment::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected)
    }

    /// Pending appointments whose scheduled time is before `cutoff`.
    pub async fn find_pending_scheduled_before<C: ConnectionTrait>(
        db: &C,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self>, DbErr> {
        let records = appointment::Entity::find()
            .filter(appointment::Column::Status.eq(AppointmentStatus::Pending))
            .filter(appointment::Column::ScheduledAt.lt(cutoff))
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(db)
            .await?;
        Self::with_lines(db, records).await
    }

    pub async fn count_pending_scheduled_before<C: ConnectionTrait>(
        db: &C,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        appointment::Entity::find()
            .filter(
                Condition::all()
                    .add(appointment::Column::Status.eq(AppointmentStatus::Pending))
                    .add(appointment::Column::ScheduledAt.lt(cutoff)),
            )
            .count(db)
            .await
    }

    /// In-progress appointments whose end plus `grace` is before `now`.
    pub async fn find_overrunning<C: ConnectionTrait>(
        db: &C,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<Self>, DbErr> {
        let records = appointment::Entity::find()
            .filter(appointment::Column::Status.eq(AppointmentStatus::InProgress))
            .filter(appointment::Column::ScheduledAt.lt(now))
            .order_by_asc(appointment::Column::ScheduledAt)
            .all(db)
            .await?;
        let appointments = Self::with_lines(db, records).await?;
        Ok(appointments
            .into_iter()
            .filter(|appointment| now > appointment.ends_at() + grace)
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        models::{
            grooming_service::CreateGroomingService,
            pet::{CreatePet, Pet},
            user::{CreateUser, User},
        },
        test_db::setup_db,
        types::UserRole,
    };

    pub(crate) async fn seed_user<C: ConnectionTrait>(db: &C, email: &str, role: UserRole) -> User {
        User::create(
            db,
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

    pub(crate) async fn seed_pet<C: ConnectionTrait>(db: &C, owner_id: Uuid) -> Pet {
        Pet::create(
            db,
            owner_id,
            &CreatePet {
                name: "Biscuit".to_string(),
                species: "dog".to_string(),
                breed: None,
                weight_kg: Some(12.5),
                birth_date: None,
                notes: None,
            },
        )
        .await
        .unwrap()
    }

    pub(crate) async fn seed_service<C: ConnectionTrait>(
        db: &C,
        duration_minutes: i32,
    ) -> GroomingService {
        GroomingService::create(
            db,
            &CreateGroomingService {
                name: format!("Wash {duration_minutes}"),
                description: None,
                price_cents: 4500,
                duration_minutes,
                is_active: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_snapshots_service_prices_and_sums_duration() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let pet = seed_pet(&db, customer.id).await;
        let bath = seed_service(&db, 30).await;
        let trim = seed_service(&db, 45).await;

        let created = Appointment::create(
            &db,
            customer.id,
            &CreateAppointment {
                customer_id: None,
                pet_id: pet.id,
                service_ids: vec![bath.id, trim.id, bath.id],
                staff_id: None,
                scheduled_at: Utc::now() + Duration::days(2),
                notes: Some("nervous around dryers".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(created.status, AppointmentStatus::Pending);
        assert_eq!(created.duration_minutes, 75);
        assert_eq!(created.total_price_cents, 9000);
        assert_eq!(created.services.len(), 2);

        let fetched = Appointment::find_by_id(&db, created.id)
            .await
            .unwrap()
            .expect("appointment");
        assert_eq!(fetched.services.len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_pets_owned_by_someone_else() {
        let db = setup_db().await;
        let owner = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let other = seed_user(&db, "other@example.com", UserRole::Customer).await;
        let pet = seed_pet(&db, owner.id).await;
        let service = seed_service(&db, 30).await;

        let err = Appointment::create(
            &db,
            other.id,
            &CreateAppointment {
                customer_id: None,
                pet_id: pet.id,
                service_ids: vec![service.id],
                staff_id: None,
                scheduled_at: Utc::now(),
                notes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppointmentError::PetNotOwned));
    }

    #[tokio::test]
    async fn overlapping_staff_booking_is_a_conflict_unless_cancelled() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let staff = seed_user(&db, "staff@example.com", UserRole::Staff).await;
        let pet = seed_pet(&db, customer.id).await;
        let service = seed_service(&db, 60).await;
        let start = Utc::now() + Duration::days(1);

        let request = |scheduled_at| CreateAppointment {
            customer_id: None,
            pet_id: pet.id,
            service_ids: vec![service.id],
            staff_id: Some(staff.id),
            scheduled_at,
            notes: None,
        };

        let first = Appointment::create(&db, customer.id, &request(start))
            .await
            .unwrap();

        let err = Appointment::create(&db, customer.id, &request(start + Duration::minutes(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::SlotConflict(id) if id == first.id));

        // Back-to-back is fine.
        Appointment::create(&db, customer.id, &request(start + Duration::minutes(60)))
            .await
            .unwrap();

        Appointment::update_status(&db, first.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        Appointment::create(&db, customer.id, &request(start))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn day_long_booking_still_blocks_its_last_slot_and_longer_ones_are_rejected() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let staff = seed_user(&db, "staff@example.com", UserRole::Staff).await;
        let pet = seed_pet(&db, customer.id).await;
        let full_day = seed_service(&db, MAX_APPOINTMENT_MINUTES as i32).await;
        let half_day = seed_service(&db, 720).await;
        let long_trim = seed_service(&db, 780).await;
        let start = Utc::now() + Duration::days(3);

        let request = |service_ids: Vec<Uuid>, scheduled_at| CreateAppointment {
            customer_id: None,
            pet_id: pet.id,
            service_ids,
            staff_id: Some(staff.id),
            scheduled_at,
            notes: None,
        };

        let err = Appointment::create(
            &db,
            customer.id,
            &request(vec![half_day.id, long_trim.id], start),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppointmentError::TooLong(1500)));

        let first = Appointment::create(&db, customer.id, &request(vec![full_day.id], start))
            .await
            .unwrap();
        let tail = start + Duration::minutes(MAX_APPOINTMENT_MINUTES - 30);
        let err = Appointment::create(&db, customer.id, &request(vec![half_day.id], tail))
            .await
            .unwrap_err();
        assert!(matches!(err, AppointmentError::SlotConflict(id) if id == first.id));
    }

    #[test]
    fn staff_calendar_lock_renders_for_update_where_supported() {
        use sea_orm::{DbBackend, QueryTrait};

        let staff_id = Uuid::new_v4();
        let postgres = Appointment::staff_calendar_lock(staff_id)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(postgres.ends_with("FOR UPDATE"), "{postgres}");

        let sqlite = Appointment::staff_calendar_lock(staff_id)
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(!sqlite.contains("FOR UPDATE"), "{sqlite}");
    }

    #[tokio::test]
    async fn update_status_reports_previous_status() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let pet = seed_pet(&db, customer.id).await;
        let service = seed_service(&db, 30).await;
        let created = Appointment::create(
            &db,
            customer.id,
            &CreateAppointment {
                customer_id: None,
                pet_id: pet.id,
                service_ids: vec![service.id],
                staff_id: None,
                scheduled_at: Utc::now(),
                notes: None,
            },
        )
        .await
        .unwrap();

        let change = Appointment::update_status(&db, created.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(change.old_status, AppointmentStatus::Pending);
        assert_eq!(change.appointment.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn pending_count_only_includes_rows_past_cutoff() {
        let db = setup_db().await;
        let customer = seed_user(&db, "owner@example.com", UserRole::Customer).await;
        let pet = seed_pet(&db, customer.id).await;
        let service = seed_service(&db, 30).await;
        let now = Utc::now();

        for offset_hours in [-48, -30, -2, 5] {
            Appointment::create(
                &db,
                customer.id,
                &CreateAppointment {
                    customer_id: None,
                    pet_id: pet.id,
                    service_ids: vec![service.id],
                    staff_id: None,
                    scheduled_at: now + Duration::hours(offset_hours),
                    notes: None,
                },
            )
            .await
            .unwrap();
        }
        let old = Appointment::find_pending_scheduled_before(&db, now - Duration::hours(24))
            .await
            .unwrap();
        Appointment::update_status(&db, old[0].id, AppointmentStatus::Confirmed)
            .await
            .unwrap();

        let count = Appointment::count_pending_scheduled_before(&db, now - Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
