use std::collections::BTreeSet;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Principal, Role};
use shared_models::error::AppError;
use shared_utils::extractor::CurrentPrincipal;

use crate::models::{
    ProfessionalCategory, ProfessionalError, ProfessionalFilters, RegisterProfessionalRequest,
    RejectProfessionalRequest, TimeRange, UpdateProfessionalRequest, WindowRequest,
};
use crate::router::ProfessionalState;

const DEFAULT_URL_TTL_SECONDS: u64 = 3600;

impl From<ProfessionalError> for AppError {
    fn from(err: ProfessionalError) -> Self {
        match err {
            ProfessionalError::NotFound
            | ProfessionalError::WindowNotFound
            | ProfessionalError::DocumentNotFound => AppError::NotFound(err.to_string()),
            ProfessionalError::InvalidRange(_) | ProfessionalError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            ProfessionalError::AlreadyRegistered
            | ProfessionalError::Conflict(_)
            | ProfessionalError::InvalidVerificationTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            ProfessionalError::NotApproved => AppError::Forbidden(err.to_string()),
            ProfessionalError::ExternalCollaboratorFailure(msg) => AppError::ExternalService(msg),
        }
    }
}

// Query parameters for different endpoints
#[derive(Debug, Deserialize)]
pub struct ProfessionalSearchQuery {
    pub state: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    /// Comma separated.
    pub skills: Option<String>,
    pub approved_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WindowRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub expires_in: Option<u64>,
}

fn ensure_self_or_admin(principal: &Principal, professional_id: Uuid) -> Result<(), AppError> {
    if principal.is(professional_id) || principal.is_admin() {
        return Ok(());
    }
    Err(AppError::Forbidden("Not allowed to act on this professional".to_string()))
}

fn ensure_self(principal: &Principal, professional_id: Uuid) -> Result<(), AppError> {
    if principal.is(professional_id) {
        return Ok(());
    }
    Err(AppError::Forbidden("Only the professional can do this".to_string()))
}

fn ensure_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        return Ok(());
    }
    Err(AppError::Forbidden("Administrator role required".to_string()))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

// ==============================================================================
// PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn register_professional(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<RegisterProfessionalRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if principal.role != Role::Professional {
        return Err(AppError::Forbidden("Only professional accounts can register a profile".to_string()));
    }

    let professional = state.professionals.register(principal.id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(professional))))
}

#[axum::debug_handler]
pub async fn get_professional(
    State(state): State<ProfessionalState>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let professional = state.professionals.get(professional_id).await?;
    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn find_professionals(
    State(state): State<ProfessionalState>,
    Query(query): Query<ProfessionalSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let skills: BTreeSet<String> = query
        .skills
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let filters = ProfessionalFilters {
        state: query.state,
        city: query.city,
        category: query.category.map(ProfessionalCategory::from),
        skills,
        approved_only: Some(query.approved_only.unwrap_or(true)),
    };

    let professionals = state.professionals.find(&filters).await?;
    Ok(Json(json!({
        "professionals": professionals,
        "total": professionals.len()
    })))
}

#[axum::debug_handler]
pub async fn update_professional(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<UpdateProfessionalRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_self_or_admin(&principal, professional_id)?;

    let professional = state.professionals.update_profile(professional_id, request).await?;
    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn upload_document(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((professional_id, name)): Path<(Uuid, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_self(&principal, professional_id)?;

    let professional = state
        .professionals
        .upload_document(professional_id, &name, body.to_vec(), &content_type(&headers))
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "documents": professional.documents }))))
}

#[axum::debug_handler]
pub async fn get_document_url(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((professional_id, name)): Path<(Uuid, String)>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_self_or_admin(&principal, professional_id)?;

    let ttl = query.expires_in.unwrap_or(DEFAULT_URL_TTL_SECONDS);
    let url = state.professionals.document_url(professional_id, &name, ttl).await?;
    Ok(Json(json!({ "url": url, "expires_in": ttl })))
}

#[axum::debug_handler]
pub async fn upload_photo(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    ensure_self(&principal, professional_id)?;

    let professional = state
        .professionals
        .upload_photo(professional_id, body.to_vec(), &content_type(&headers))
        .await?;
    Ok(Json(json!({ "photo_handle": professional.photo_handle })))
}

#[axum::debug_handler]
pub async fn get_photo_url(
    State(state): State<ProfessionalState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Json<Value>, AppError> {
    let ttl = query.expires_in.unwrap_or(DEFAULT_URL_TTL_SECONDS);
    let url = state.professionals.photo_url(professional_id, ttl).await?;
    Ok(Json(json!({ "url": url, "expires_in": ttl })))
}

// ==============================================================================
// VERIFICATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn submit_for_verification(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_self(&principal, professional_id)?;

    let professional = state.professionals.submit_for_verification(professional_id).await?;
    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn list_pending_professionals(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&principal)?;

    let pending = state.professionals.list_pending().await?;
    Ok(Json(json!({
        "professionals": pending,
        "total": pending.len()
    })))
}

#[axum::debug_handler]
pub async fn approve_professional(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&principal)?;

    let professional = state.professionals.approve(professional_id).await?;
    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn reject_professional(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<RejectProfessionalRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_admin(&principal)?;

    let professional = state.professionals.reject(professional_id, &request.reason).await?;
    Ok(Json(json!(professional)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_windows(
    State(state): State<ProfessionalState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<WindowRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let range = TimeRange::new(query.from, query.to);
    let windows = state.availability.list_windows(professional_id, Some(range)).await?;

    Ok(Json(json!({
        "windows": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn add_window(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<WindowRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_self(&principal, professional_id)?;
    state.professionals.require_approved(professional_id).await?;

    let window = state
        .availability
        .add_window(professional_id, request.from, request.to)
        .await?;
    Ok((StatusCode::CREATED, Json(json!(window))))
}

#[axum::debug_handler]
pub async fn update_window(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((professional_id, window_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<WindowRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_self(&principal, professional_id)?;
    state.professionals.require_approved(professional_id).await?;

    let window = state
        .availability
        .update_window(professional_id, window_id, request.from, request.to)
        .await?;
    Ok(Json(json!(window)))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(state): State<ProfessionalState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path((professional_id, window_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    ensure_self(&principal, professional_id)?;

    state.availability.delete_window(professional_id, window_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
