use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a doctor's recurring weekly schedule. `day` is the full
/// English weekday name ("Sunday" through "Saturday"); times are "HH:MM".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityDay {
    pub day: String,
    pub is_available: bool,
    pub start_time: String,
    pub end_time: String,
}

/// Doctor profile as the appointment core consumes it. `user_id` is the
/// doctor's user identity; appointment records reference it, not `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consultation_fee: f64,
    #[serde(default)]
    pub availability_schedule: Vec<AvailabilityDay>,
}

impl DoctorProfile {
    /// First available schedule entry for the named weekday. Duplicate
    /// entries for one day have no defined precedence beyond first-wins.
    pub fn schedule_for(&self, day_name: &str) -> Option<&AvailabilityDay> {
        self.availability_schedule
            .iter()
            .find(|entry| entry.day == day_name && entry.is_available)
    }
}
