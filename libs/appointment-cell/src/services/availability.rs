use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::services::directory::DoctorDirectory;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, AvailableSlot};

pub const SLOT_DURATION_MINUTES: i32 = 30;

// ==============================================================================
// PURE TIME HELPERS
// ==============================================================================

/// Parse "HH:MM" into minutes since midnight. Rejects anything that is not
/// a well-formed 24-hour wall-clock time.
pub fn time_to_minutes(time: &str) -> Option<i32> {
    let (hours, minutes) = time.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn minutes_to_time(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// 12-hour clock rendering, e.g. 810 -> "1:30 PM", 0 -> "12:00 AM".
pub fn format_minutes_12h(minutes: i32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    let period = if hours < 12 { "AM" } else { "PM" };
    let display_hour = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display_hour, mins, period)
}

/// Full English weekday name, derived from the date itself. The resolver
/// never consults the wall clock.
pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Half-open interval overlap between a candidate window and an existing
/// booking, in minutes since midnight. Back-to-back windows sharing only a
/// boundary do not overlap.
pub fn windows_overlap(start: i32, end: i32, other_start: i32, other_end: i32) -> bool {
    (start >= other_start && start < other_end)
        || (end > other_start && end <= other_end)
        || (start <= other_start && end >= other_end)
}

/// Cut the working window into bookable slots, skipping any that collide
/// with a booked interval. The last slot is clamped to the window end, so it
/// may be shorter than the standard duration.
pub fn partition_free_slots(start: i32, end: i32, booked: &[(i32, i32)]) -> Vec<(i32, i32)> {
    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let slot_end = (cursor + SLOT_DURATION_MINUTES).min(end);
        let taken = booked
            .iter()
            .any(|&(bs, be)| windows_overlap(cursor, slot_end, bs, be));
        if !taken {
            slots.push((cursor, slot_end));
        }
        cursor += SLOT_DURATION_MINUTES;
    }
    slots
}

// ==============================================================================
// AVAILABILITY SERVICE
// ==============================================================================

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    directory: DoctorDirectory,
}

impl AvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            directory: DoctorDirectory::new(supabase.clone()),
            supabase,
        }
    }

    /// Whether the requested window can be booked. Any failure along the way
    /// (unknown doctor, malformed times, storage error) reads as unavailable;
    /// a lookup problem must never admit a double booking.
    pub async fn is_slot_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        auth_token: &str,
    ) -> bool {
        match self
            .check_slot(doctor_id, date, start_time, end_time, auth_token)
            .await
        {
            Ok(available) => available,
            Err(e) => {
                warn!("Slot check failed, treating as unavailable: {}", e);
                false
            }
        }
    }

    async fn check_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let Some(doctor) = self
            .directory
            .find_by_id(doctor_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        else {
            debug!("Doctor {} not found, slot unavailable", doctor_id);
            return Ok(false);
        };

        let Some(schedule) = doctor.schedule_for(weekday_name(date)) else {
            return Ok(false);
        };

        let (Some(start), Some(end)) = (time_to_minutes(start_time), time_to_minutes(end_time))
        else {
            return Ok(false);
        };
        let (Some(open), Some(close)) = (
            time_to_minutes(&schedule.start_time),
            time_to_minutes(&schedule.end_time),
        ) else {
            return Ok(false);
        };

        if start >= end || start < open || end > close {
            return Ok(false);
        }

        let booked = self
            .day_bookings(doctor.user_id, date, auth_token)
            .await?;

        Ok(!booked
            .iter()
            .any(|&(bs, be)| windows_overlap(start, end, bs, be)))
    }

    /// Minute intervals of the doctor's non-terminal appointments on a given
    /// day. Cancelled and no-show bookings free their slot.
    async fn day_bookings(
        &self,
        doctor_user_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<(i32, i32)>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_user_id=eq.{}&date=eq.{}&status=not.in.(cancelled,no-show)&select=start_time,end_time&order=start_time.asc",
            doctor_user_id, date
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let start = time_to_minutes(row.get("start_time")?.as_str()?)?;
                let end = time_to_minutes(row.get("end_time")?.as_str()?)?;
                Some((start, end))
            })
            .collect())
    }

    /// Open slots within the requested window on a given day. An unknown
    /// doctor or a day off yields an empty list, not an error. The window is
    /// clipped to the doctor's open hours.
    pub async fn list_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, AppointmentError> {
        let (Some(start), Some(end)) = (time_to_minutes(start_time), time_to_minutes(end_time))
        else {
            return Err(AppointmentError::ValidationError(
                "Times must be in HH:MM format".to_string(),
            ));
        };
        if start >= end {
            return Err(AppointmentError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }

        let Some(doctor) = self
            .directory
            .find_by_id(doctor_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        else {
            return Ok(vec![]);
        };

        let Some(schedule) = doctor.schedule_for(weekday_name(date)) else {
            return Ok(vec![]);
        };
        let (Some(open), Some(close)) = (
            time_to_minutes(&schedule.start_time),
            time_to_minutes(&schedule.end_time),
        ) else {
            return Ok(vec![]);
        };

        let window_start = start.max(open);
        let window_end = end.min(close);
        if window_start >= window_end {
            return Ok(vec![]);
        }

        let booked = self
            .day_bookings(doctor.user_id, date, auth_token)
            .await?;

        Ok(partition_free_slots(window_start, window_end, &booked)
            .into_iter()
            .map(|(start, end)| AvailableSlot {
                start: minutes_to_time(start),
                end: minutes_to_time(end),
                display_start: format_minutes_12h(start),
                duration_minutes: end - start,
            })
            .collect())
    }
}
