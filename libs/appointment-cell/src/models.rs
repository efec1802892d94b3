// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// The doctor's user identity, not the doctor-profile id.
    pub doctor_user_id: Uuid,
    pub date: NaiveDate,
    /// "HH:MM", same day as `date`, start < end.
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub reason: AppointmentReason,
    /// Append-only audit trail; every status change appends exactly one line.
    #[serde(default)]
    pub notes: Vec<String>,
    pub payment: Payment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal appointments no longer occupy a slot and accept no further
    /// transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in-progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentReason {
    pub name: String,
    pub reason_type: ReasonType,
}

impl Default for AppointmentReason {
    fn default() -> Self {
        Self {
            name: String::new(),
            reason_type: ReasonType::Physic,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasonType {
    Physic,
    Mental,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub amount: f64,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub condition_ids: Option<Vec<Uuid>>,
    /// Accepts a plain string, a JSON array of strings, or a string that
    /// itself encodes a JSON array (see `normalize_notes`).
    #[serde(default)]
    pub notes: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: AppointmentStatus,
}

/// Tagged listing filter; optional fields are validated before any query is
/// built from them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListFilter {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    pub pagination: Pagination,
}

/// A bookable window emitted by the availability resolver.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailableSlot {
    pub start: String,
    pub end: String,
    /// 12-hour clock rendering of `start`, e.g. "1:30 PM".
    pub display_start: String,
    pub duration_minutes: i32,
}

/// Display identity of an appointment participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<ParticipantProfile>,
    pub doctor: Option<ParticipantProfile>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Not authorized to access this appointment")]
    Unauthorized,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("This time slot is not available")]
    SlotUnavailable,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ==============================================================================
// NOTES NORMALIZATION
// ==============================================================================

/// Normalize the free-form `notes` input of a booking request into the
/// stored sequence. Accepted shapes: an array (non-string elements are
/// dropped), a string encoding a JSON array, or a plain string kept as a
/// single note. Anything else yields an empty sequence.
pub fn normalize_notes(input: Option<&Value>) -> Vec<String> {
    match input {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => {
            if s.is_empty() {
                return vec![];
            }
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                // Not a JSON array: the whole input is one note.
                _ => vec![s.clone()],
            }
        }
        Some(_) => vec![],
    }
}
