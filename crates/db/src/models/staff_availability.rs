use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::staff_availability;

const MINUTES_PER_DAY: i32 = 24 * 60;

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("day_of_week must be between 0 (Monday) and 6 (Sunday), got {0}")]
    InvalidDay(i32),
    #[error("Invalid working window {start}-{end} on day {day}")]
    InvalidWindow { day: i32, start: i32, end: i32 },
    #[error("Day {0} appears more than once")]
    DuplicateDay(i32),
}

/// Working window for one weekday, in minutes since midnight business time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct StaffAvailability {
    pub day_of_week: i32,
    pub start_minute: i32,
    pub end_minute: i32,
}

impl StaffAvailability {
    fn from_model(model: staff_availability::Model) -> Self {
        Self {
            day_of_week: model.day_of_week,
            start_minute: model.start_minute,
            end_minute: model.end_minute,
        }
    }

    pub fn validate(windows: &[StaffAvailability]) -> Result<(), AvailabilityError> {
        let mut seen = [false; 7];
        for window in windows {
            let day = window.day_of_week;
            if !(0..7).contains(&day) {
                return Err(AvailabilityError::InvalidDay(day));
            }
            if window.start_minute < 0
                || window.end_minute > MINUTES_PER_DAY
                || window.start_minute >= window.end_minute
            {
                return Err(AvailabilityError::InvalidWindow {
                    day,
                    start: window.start_minute,
                    end: window.end_minute,
                });
            }
            let slot = &mut seen[day as usize];
            if *slot {
                return Err(AvailabilityError::DuplicateDay(day));
            }
            *slot = true;
        }
        Ok(())
    }

    pub async fn find_for_staff<C: ConnectionTrait>(
        db: &C,
        staff_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = staff_availability::Entity::find()
            .filter(staff_availability::Column::StaffId.eq(staff_id))
            .order_by_asc(staff_availability::Column::DayOfWeek)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_for_day<C: ConnectionTrait>(
        db: &C,
        staff_id: Uuid,
        day_of_week: i32,
    ) -> Result<Option<Self>, DbErr> {
        let record = staff_availability::Entity::find()
            .filter(staff_availability::Column::StaffId.eq(staff_id))
            .filter(staff_availability::Column::DayOfWeek.eq(day_of_week))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Replaces the whole weekly table for a staff member.
    pub async fn replace_for_staff<C: ConnectionTrait>(
        db: &C,
        staff_id: Uuid,
        windows: &[StaffAvailability],
    ) -> Result<Vec<Self>, AvailabilityError> {
        Self::validate(windows)?;

        staff_availability::Entity::delete_many()
            .filter(staff_availability::Column::StaffId.eq(staff_id))
            .exec(db)
            .await?;

        for window in windows {
            staff_availability::ActiveModel {
                id: Set(Uuid::new_v4()),
                staff_id: Set(staff_id),
                day_of_week: Set(window.day_of_week),
                start_minute: Set(window.start_minute),
                end_minute: Set(window.end_minute),
            }
            .insert(db)
            .await?;
        }

        Ok(Self::find_for_staff(db, staff_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::appointment::tests::seed_user, test_db::setup_db, types::UserRole};

    fn window(day: i32, start: i32, end: i32) -> StaffAvailability {
        StaffAvailability {
            day_of_week: day,
            start_minute: start,
            end_minute: end,
        }
    }

    #[test]
    fn validate_rejects_bad_days_and_windows() {
        assert!(StaffAvailability::validate(&[window(0, 540, 1020)]).is_ok());
        assert!(matches!(
            StaffAvailability::validate(&[window(7, 540, 1020)]),
            Err(AvailabilityError::InvalidDay(7))
        ));
        assert!(matches!(
            StaffAvailability::validate(&[window(1, 600, 600)]),
            Err(AvailabilityError::InvalidWindow { .. })
        ));
        assert!(matches!(
            StaffAvailability::validate(&[window(2, 540, 600), window(2, 700, 800)]),
            Err(AvailabilityError::DuplicateDay(2))
        ));
    }

    #[tokio::test]
    async fn replace_overwrites_previous_table() {
        let db = setup_db().await;
        let staff = seed_user(&db, "staff@example.com", UserRole::Staff).await;

        StaffAvailability::replace_for_staff(&db, staff.id, &[window(0, 540, 1020)])
            .await
            .unwrap();
        let saved = StaffAvailability::replace_for_staff(
            &db,
            staff.id,
            &[window(1, 600, 900), window(3, 540, 720)],
        )
        .await
        .unwrap();

        assert_eq!(saved, vec![window(1, 600, 900), window(3, 540, 720)]);
        assert!(
            StaffAvailability::find_for_day(&db, staff.id, 0)
                .await
                .unwrap()
                .is_none()
        );
    }
}
