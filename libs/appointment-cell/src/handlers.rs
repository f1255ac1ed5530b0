use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use professional_cell::models::{ProfessionalCategory, TimeRange};
use shared_models::auth::{Principal, Role};
use shared_models::error::AppError;
use shared_utils::extractor::CurrentPrincipal;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentView, BookAppointmentRequest,
    ChargeRequest, RescheduleAppointmentRequest, SearchFilters,
};
use crate::router::AppointmentState;
use crate::services::{available_dates, slots_on};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidRange(_) | AppointmentError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotUnavailable
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::EditNotAllowed
            | AppointmentError::Conflict => AppError::Conflict(err.to_string()),
            AppointmentError::PaymentDeclined(_) => AppError::PaymentRequired(err.to_string()),
            AppointmentError::ExternalCollaboratorFailure(msg) => AppError::ExternalService(msg),
        }
    }
}

// Query parameters for different endpoints
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub state: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    /// Comma separated.
    pub skills: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub approved_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ProfessionalAppointmentsQuery {
    /// Comma separated statuses, or `all`. Defaults to pending and accepted.
    pub status: Option<String>,
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn require_role(principal: &Principal, role: Role) -> Result<(), AppError> {
    if principal.role == role {
        return Ok(());
    }
    Err(AppError::Forbidden(format!("{} role required", role)))
}

fn ensure_patient_owner(principal: &Principal, appointment: &Appointment) -> Result<(), AppError> {
    if principal.is(appointment.patient_id) {
        return Ok(());
    }
    Err(AppError::Forbidden("Only the booking patient can do this".to_string()))
}

fn ensure_assigned_professional(principal: &Principal, appointment: &Appointment) -> Result<(), AppError> {
    if principal.is(appointment.professional_id) {
        return Ok(());
    }
    Err(AppError::Forbidden("Only the assigned professional can do this".to_string()))
}

// ==============================================================================
// SEARCH & SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_professionals(
    State(state): State<AppointmentState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let filters = SearchFilters {
        state: query.state,
        city: query.city,
        category: query.category.map(ProfessionalCategory::from),
        skills: split_list(query.skills.as_deref()).map(str::to_string).collect::<BTreeSet<_>>(),
        from: query.from,
        to: query.to,
        approved_only: Some(query.approved_only.unwrap_or(true)),
    };

    let results = state.search.search(&filters).await?;
    Ok(Json(json!({
        "results": results,
        "total": results.len()
    })))
}

#[axum::debug_handler]
pub async fn professional_slots(
    State(state): State<AppointmentState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let range = TimeRange::new(query.from, query.to);
    let slots = state.resolver.resolve(professional_id, &range, None).await?;
    let dates = available_dates(&slots);

    let slots = match query.date {
        Some(date) => slots_on(&slots, date),
        None => slots,
    };

    Ok(Json(json!({
        "professional_id": professional_id,
        "dates": dates,
        "slots": slots
    })))
}

// ==============================================================================
// BOOKING & LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&principal, Role::Patient)?;

    let appointment = state
        .booking
        .book(request.professional_id, principal.id, request.from, request.to)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;

    let allowed = principal.is(appointment.patient_id)
        || principal.is(appointment.professional_id)
        || principal.is_admin();
    if !allowed {
        return Err(AppError::Forbidden("Not allowed to view this appointment".to_string()));
    }

    Ok(Json(json!(AppointmentView::at(appointment, Utc::now()))))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    require_role(&principal, Role::Patient)?;

    let now = Utc::now();
    let appointments: Vec<AppointmentView> = state
        .repository
        .list_for_patient(principal.id)
        .await?
        .into_iter()
        .map(|a| AppointmentView::at(a, now))
        .collect();

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn professional_appointments(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<ProfessionalAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&principal, Role::Professional)?;

    let statuses: Option<Vec<AppointmentStatus>> = match query.status.as_deref() {
        Some("all") => None,
        None => Some(AppointmentStatus::capacity_consuming().to_vec()),
        raw => Some(
            split_list(raw)
                .map(str::parse::<AppointmentStatus>)
                .collect::<Result<_, _>>()?,
        ),
    };

    let now = Utc::now();
    let appointments: Vec<AppointmentView> = state
        .repository
        .list_for_professional(principal.id, statuses.as_deref())
        .await?
        .into_iter()
        .map(|a| AppointmentView::at(a, now))
        .collect();

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_assigned_professional(&principal, &appointment)?;

    let appointment = state.lifecycle.accept(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_assigned_professional(&principal, &appointment)?;

    let appointment = state.lifecycle.reject(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_patient_owner(&principal, &appointment)?;

    let appointment = state
        .lifecycle
        .reschedule(appointment_id, request.from, request.to)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_patient_owner(&principal, &appointment)?;

    let appointment = state.lifecycle.cancel(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// PAYMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_payment_order(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_patient_owner(&principal, &appointment)?;

    let order = state.lifecycle.create_payment_order(appointment_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "order": order,
            "key_id": state.config.razorpay_key_id
        })),
    ))
}

#[axum::debug_handler]
pub async fn pay_appointment(
    State(state): State<AppointmentState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<ChargeRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.repository.get(appointment_id).await?;
    ensure_patient_owner(&principal, &appointment)?;

    let appointment = state.lifecycle.pay(appointment_id, &request).await?;
    Ok(Json(json!(appointment)))
}
