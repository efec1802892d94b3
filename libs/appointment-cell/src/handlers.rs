use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{auth::User, error::AppError};

use crate::models::{
    AppointmentError, AppointmentListFilter, CancelAppointmentRequest, ChangeStatusRequest,
    CreateAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

fn map_err(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        e @ AppointmentError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
        e @ AppointmentError::SlotUnavailable => AppError::Conflict(e.to_string()),
        AppointmentError::ValidationError(msg) => AppError::BadRequest(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn requester_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".to_string()))
}

fn requester_role(user: &User) -> &str {
    user.role.as_deref().unwrap_or("patient")
}

/// POST /appointments
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = requester_id(&user)?;
    if user_id != request.patient_id && !user.is_admin() {
        return Err(AppError::Auth(
            "Patients can only book appointments for themselves".to_string(),
        ));
    }

    info!("Create appointment request from user {}", user.id);

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .create_appointment(request, auth.token())
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

/// GET /appointments
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(mut filter): Query<AppointmentListFilter>,
) -> Result<Json<Value>, AppError> {
    // Non-admins only ever see their own appointments, whatever the filter
    // asked for.
    if !user.is_admin() {
        let user_id = requester_id(&user)?;
        if user.is_doctor() {
            filter.doctor_id = Some(user_id);
        } else {
            filter.patient_id = Some(user_id);
        }
    }

    let service = AppointmentBookingService::new(&state);
    let page = service
        .list_appointments(&filter, auth.token())
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "appointments": page.appointments,
        "pagination": page.pagination,
    })))
}

/// GET /appointments/slots
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let slots = service
        .availability()
        .list_available_slots(
            query.doctor_id,
            query.date,
            &query.start_time,
            &query.end_time,
            auth.token(),
        )
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "slots": slots,
    })))
}

/// GET /appointments/slots/check
pub async fn check_slot_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state);
    let available = service
        .availability()
        .is_slot_available(
            query.doctor_id,
            query.date,
            &query.start_time,
            &query.end_time,
            auth.token(),
        )
        .await;

    Ok(Json(json!({
        "success": true,
        "available": available,
    })))
}

/// GET /appointments/{id}
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = requester_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let details = service
        .get_details(id, user_id, requester_role(&user), auth.token())
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "appointment": details,
    })))
}

/// PUT /appointments/{id}/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = requester_id(&user)?;

    info!("Cancel request for appointment {} from user {}", id, user.id);

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .cancel_appointment(
            id,
            user_id,
            requester_role(&user),
            request.reason,
            auth.token(),
        )
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

/// PUT /appointments/{id}/status
pub async fn change_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = requester_id(&user)?;

    let service = AppointmentBookingService::new(&state);
    let appointment = service
        .change_status(
            id,
            request.status,
            user_id,
            requester_role(&user),
            auth.token(),
        )
        .await
        .map_err(map_err)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}
