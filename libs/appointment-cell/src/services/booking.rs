use std::sync::Arc;

use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use condition_cell::services::lookup::ConditionLookup;
use doctor_cell::services::directory::DoctorDirectory;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    normalize_notes, Appointment, AppointmentDetails, AppointmentError, AppointmentListFilter,
    AppointmentPage, AppointmentReason, AppointmentStatus, CreateAppointmentRequest, Pagination,
    ParticipantProfile, PaymentStatus, ReasonType,
};
use crate::services::availability::{time_to_minutes, AvailabilityService};
use crate::services::lifecycle::AppointmentLifecycle;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Orchestrates the appointment lifecycle against the PostgREST store:
/// booking, cancellation, status changes, detail and list reads.
pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    directory: DoctorDirectory,
    conditions: ConditionLookup,
    availability: AvailabilityService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            directory: DoctorDirectory::new(supabase.clone()),
            conditions: ConditionLookup::new(supabase.clone()),
            availability: AvailabilityService::new(supabase.clone()),
            supabase,
        }
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    // ==========================================================================
    // CREATE
    // ==========================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let (Some(start), Some(end)) = (
            time_to_minutes(&request.start_time),
            time_to_minutes(&request.end_time),
        ) else {
            return Err(AppointmentError::ValidationError(
                "Times must be in HH:MM format".to_string(),
            ));
        };
        if start >= end {
            return Err(AppointmentError::ValidationError(
                "Start time must be before end time".to_string(),
            ));
        }

        let doctor = self
            .directory
            .find_by_id(request.doctor_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;

        let available = self
            .availability
            .is_slot_available(
                request.doctor_id,
                request.date,
                &request.start_time,
                &request.end_time,
                auth_token,
            )
            .await;
        if !available {
            return Err(AppointmentError::SlotUnavailable);
        }

        let reason = self
            .resolve_reason(request.condition_ids.as_deref(), auth_token)
            .await?;
        let notes = normalize_notes(request.notes.as_ref());

        let now = Utc::now();
        let body = json!({
            "patient_id": request.patient_id,
            "doctor_user_id": doctor.user_id,
            "date": request.date,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "status": AppointmentStatus::Scheduled,
            "reason": reason,
            "notes": notes,
            "payment": {
                "amount": doctor.consultation_fee,
                "status": PaymentStatus::Pending,
                "paid_at": Value::Null,
            },
            "created_at": now,
            "updated_at": now,
        });

        info!(
            "Booking appointment for patient {} with doctor {} on {}",
            request.patient_id, doctor.user_id, request.date
        );

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(Self::return_representation()),
            )
            .await
            .map_err(|e| match e {
                // The unique index on (doctor, date, start) lost us the race.
                SupabaseError::Conflict(_) => AppointmentError::SlotUnavailable,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Insert returned no row".to_string()))
    }

    /// Booking reason derived from the patient's first listed condition.
    /// Mental-health conditions are flagged as such, everything else is a
    /// physical consultation.
    async fn resolve_reason(
        &self,
        condition_ids: Option<&[Uuid]>,
        auth_token: &str,
    ) -> Result<AppointmentReason, AppointmentError> {
        let Some(ids) = condition_ids else {
            return Ok(AppointmentReason::default());
        };

        let conditions = self
            .conditions
            .find_by_ids(ids, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let Some(first) = conditions.into_iter().next() else {
            return Ok(AppointmentReason::default());
        };

        let reason_type = if first.is_mental_health() {
            ReasonType::Mental
        } else {
            ReasonType::Physic
        };
        Ok(AppointmentReason {
            name: first.name,
            reason_type,
        })
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    async fn fetch_appointment(
        &self,
        id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Single appointment with participant display profiles. Only the two
    /// participants and admins may read it.
    pub async fn get_details(
        &self,
        id: Uuid,
        requester_id: Uuid,
        requester_role: &str,
        auth_token: &str,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.fetch_appointment(id, auth_token).await?;

        let is_participant =
            requester_id == appointment.patient_id || requester_id == appointment.doctor_user_id;
        if !is_participant && requester_role != "admin" {
            return Err(AppointmentError::Unauthorized);
        }

        let path = format!(
            "/rest/v1/profiles?id=in.({},{})",
            appointment.patient_id, appointment.doctor_user_id
        );
        let profiles: Vec<ParticipantProfile> = match self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
        {
            Ok(profiles) => profiles,
            Err(e) => {
                // Detail reads degrade gracefully when profiles are missing.
                warn!("Could not resolve participant profiles: {}", e);
                vec![]
            }
        };

        let patient = profiles
            .iter()
            .find(|p| p.id == appointment.patient_id)
            .cloned();
        let doctor = profiles
            .iter()
            .find(|p| p.id == appointment.doctor_user_id)
            .cloned();

        Ok(AppointmentDetails {
            appointment,
            patient,
            doctor,
        })
    }

    pub async fn list_appointments(
        &self,
        filter: &AppointmentListFilter,
        auth_token: &str,
    ) -> Result<AppointmentPage, AppointmentError> {
        let page = filter.page.unwrap_or(1);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(AppointmentError::ValidationError(
                "Page must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppointmentError::ValidationError(format!(
                "Limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(AppointmentError::ValidationError(
                    "Start date must not be after end date".to_string(),
                ));
            }
        }

        let mut clauses = Vec::new();
        if let Some(status) = filter.status {
            clauses.push(format!("status=eq.{}", status));
        }
        if let Some(doctor_id) = filter.doctor_id {
            clauses.push(format!("doctor_user_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = filter.patient_id {
            clauses.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(start_date) = filter.start_date {
            clauses.push(format!("date=gte.{}", start_date));
        }
        if let Some(end_date) = filter.end_date {
            clauses.push(format!("date=lte.{}", end_date));
        }

        let offset = (page - 1) * limit;
        // "HH:MM" sorts correctly as text, so a lexical order works here.
        clauses.push("order=date.desc,start_time.desc".to_string());
        clauses.push(format!("limit={}", limit));
        clauses.push(format!("offset={}", offset));

        let path = format!("/rest/v1/appointments?{}", clauses.join("&"));
        debug!("Listing appointments: {}", path);

        let (rows, total_count) = self
            .supabase
            .request_with_count(&path, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })?;

        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };
        let has_next_page = page < total_pages;
        let has_prev_page = page > 1;

        Ok(AppointmentPage {
            appointments,
            pagination: Pagination {
                current_page: page,
                total_pages,
                total_count,
                limit,
                has_next_page,
                has_prev_page,
                next_page: has_next_page.then_some(page + 1),
                prev_page: has_prev_page.then_some(page - 1),
            },
        })
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        requester_id: Uuid,
        requester_role: &str,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(id, auth_token).await?;

        let is_participant =
            requester_id == appointment.patient_id || requester_id == appointment.doctor_user_id;
        if !is_participant && requester_role != "admin" {
            return Err(AppointmentError::Unauthorized);
        }

        if appointment.status.is_terminal() {
            return Err(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        // A cancel without a reason leaves the notes untouched.
        let mut notes = appointment.notes.clone();
        if let Some(reason) = reason {
            notes.push(format!("Cancelled: {}", reason));
        }

        info!("Cancelling appointment {}", id);

        self.update_appointment(
            id,
            json!({
                "status": AppointmentStatus::Cancelled,
                "notes": notes,
                "updated_at": Utc::now(),
            }),
            auth_token,
        )
        .await
    }

    /// Drive the state machine forward. Only the doctor and admins may
    /// change status; completion settles a pending payment.
    pub async fn change_status(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
        requester_id: Uuid,
        requester_role: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(id, auth_token).await?;

        let is_doctor = requester_id == appointment.doctor_user_id;
        let is_admin = requester_role == "admin";
        if !is_doctor && !is_admin {
            return Err(AppointmentError::Unauthorized);
        }

        AppointmentLifecycle::validate_transition(appointment.status, new_status)?;

        let actor = if is_admin { "admin" } else { "doctor" };
        let mut notes = appointment.notes.clone();
        notes.push(format!("Status changed to {} by {}", new_status, actor));

        let now = Utc::now();
        let mut body = json!({
            "status": new_status,
            "notes": notes,
            "updated_at": now,
        });

        if new_status == AppointmentStatus::Completed
            && appointment.payment.status == PaymentStatus::Pending
        {
            body["payment"] = json!({
                "amount": appointment.payment.amount,
                "status": PaymentStatus::Completed,
                "paid_at": now,
            });
        }

        info!("Appointment {} status {} -> {}", id, appointment.status, new_status);

        self.update_appointment(id, body, auth_token).await
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(Self::return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }
}
