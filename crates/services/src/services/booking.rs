use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use db::{
    ConnectionTrait, DbErr,
    models::{appointment::Appointment, staff_availability::StaffAvailability},
    types::AppointmentStatus,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Candidate booking interval offered to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

/// Time already taken on a staff member's calendar.
#[derive(Debug, Clone, Copy)]
pub struct BookedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for BookedInterval {
    fn from(appointment: &Appointment) -> Self {
        Self {
            start: appointment.scheduled_at,
            end: appointment.ends_at(),
            status: appointment.status,
        }
    }
}

/// Weekday index used by the availability table, 0 = Monday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}

/// UTC instant of local midnight on `date` in the business offset.
pub fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Splits the working window for `date` into `slot_minutes` slots and marks
/// each one unavailable when it overlaps a non-cancelled booking.
pub fn generate_slots(
    date: NaiveDate,
    availability: Option<&StaffAvailability>,
    booked: &[BookedInterval],
    slot_minutes: i64,
    offset: FixedOffset,
) -> Vec<Slot> {
    let Some(window) = availability else {
        return Vec::new();
    };
    if slot_minutes <= 0 || window.day_of_week != day_of_week(date) {
        return Vec::new();
    }

    let midnight = local_midnight_utc(date, offset);
    let window_end = midnight + Duration::minutes(i64::from(window.end_minute));
    let step = Duration::minutes(slot_minutes);

    let mut slots = Vec::new();
    let mut start = midnight + Duration::minutes(i64::from(window.start_minute));
    while start + step <= window_end {
        let end = start + step;
        let taken = booked.iter().any(|existing| {
            existing.status != AppointmentStatus::Cancelled
                && start < existing.end
                && end > existing.start
        });
        slots.push(Slot {
            start,
            end,
            available: !taken,
        });
        start = end;
    }
    slots
}

pub async fn slots_for_staff<C: ConnectionTrait>(
    db: &C,
    staff_id: Uuid,
    date: NaiveDate,
    slot_minutes: i64,
    offset: FixedOffset,
) -> Result<Vec<Slot>, DbErr> {
    let availability = StaffAvailability::find_for_day(db, staff_id, day_of_week(date)).await?;
    let Some(window) = availability else {
        return Ok(Vec::new());
    };

    let midnight = local_midnight_utc(date, offset);
    let booked: Vec<BookedInterval> = Appointment::find_for_staff_between(
        db,
        staff_id,
        midnight,
        midnight + Duration::days(1),
    )
    .await?
    .iter()
    .map(BookedInterval::from)
    .collect();

    tracing::debug!(
        %staff_id,
        %date,
        booked = booked.len(),
        "Computing booking slots"
    );
    Ok(generate_slots(
        date,
        Some(&window),
        &booked,
        slot_minutes,
        offset,
    ))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    // 2025-03-03 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn nine_to_five() -> StaffAvailability {
        StaffAvailability {
            day_of_week: 0,
            start_minute: 9 * 60,
            end_minute: 17 * 60,
        }
    }

    fn booking(hour: u32, minute: u32, length: i64, status: AppointmentStatus) -> BookedInterval {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap();
        BookedInterval {
            start,
            end: start + Duration::minutes(length),
            status,
        }
    }

    #[test]
    fn no_availability_means_no_slots() {
        assert!(generate_slots(monday(), None, &[], 30, utc()).is_empty());
    }

    #[test]
    fn full_day_yields_sixteen_half_hour_slots() {
        let window = nine_to_five();
        let slots = generate_slots(monday(), Some(&window), &[], 30, utc());

        assert_eq!(slots.len(), 16);
        assert!(slots.iter().all(|slot| slot.available));
        assert_eq!(
            slots[0].start,
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
        );
        assert_eq!(
            slots[15].end,
            Utc.with_ymd_and_hms(2025, 3, 3, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn overlapping_bookings_block_slots() {
        let window = nine_to_five();
        let booked = [booking(10, 15, 60, AppointmentStatus::Confirmed)];
        let slots = generate_slots(monday(), Some(&window), &booked, 30, utc());

        let unavailable: Vec<_> = slots
            .iter()
            .filter(|slot| !slot.available)
            .map(|slot| slot.start)
            .collect();
        // 10:15-11:15 touches 10:00, 10:30 and 11:00.
        assert_eq!(
            unavailable,
            vec![
                Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 3, 10, 30, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 3, 11, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn cancelled_and_adjacent_bookings_do_not_block() {
        let window = nine_to_five();
        let booked = [
            booking(9, 0, 60, AppointmentStatus::Cancelled),
            booking(8, 0, 60, AppointmentStatus::Pending),
        ];
        let slots = generate_slots(monday(), Some(&window), &booked, 30, utc());

        assert!(slots.iter().all(|slot| slot.available));
    }

    #[test]
    fn window_is_shifted_by_business_offset() {
        let window = nine_to_five();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let slots = generate_slots(monday(), Some(&window), &[], 60, plus_two);

        assert_eq!(slots.len(), 8);
        assert_eq!(
            slots[0].start,
            Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn window_for_another_weekday_is_ignored() {
        let tuesday_only = StaffAvailability {
            day_of_week: 1,
            ..nine_to_five()
        };
        assert!(generate_slots(monday(), Some(&tuesday_only), &[], 30, utc()).is_empty());
    }
}
