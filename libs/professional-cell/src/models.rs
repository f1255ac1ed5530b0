// libs/professional-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;

// ==============================================================================
// PROFESSIONAL PROFILE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Professional {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: ProfessionalCategory,
    pub state: String,
    pub city: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub bio: Option<String>,
    pub photo_handle: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(rename = "status")]
    pub verification_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    /// Bumped on every write; updates are conditional on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Professional {
    pub fn is_approved(&self) -> bool {
        self.verification_status == VerificationStatus::Approved
    }
}

/// Service category. Anything other than the two known categories keeps
/// the free text the professional typed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProfessionalCategory {
    Nurse,
    Physiotherapist,
    Other(String),
}

impl From<String> for ProfessionalCategory {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "nurse" => ProfessionalCategory::Nurse,
            "physiotherapist" => ProfessionalCategory::Physiotherapist,
            _ => ProfessionalCategory::Other(trimmed.to_string()),
        }
    }
}

impl From<&str> for ProfessionalCategory {
    fn from(raw: &str) -> Self {
        ProfessionalCategory::from(raw.to_string())
    }
}

impl From<ProfessionalCategory> for String {
    fn from(category: ProfessionalCategory) -> Self {
        category.to_string()
    }
}

impl fmt::Display for ProfessionalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfessionalCategory::Nurse => write!(f, "nurse"),
            ProfessionalCategory::Physiotherapist => write!(f, "physiotherapist"),
            ProfessionalCategory::Other(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::NotSubmitted => write!(f, "not_submitted"),
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Approved => write!(f, "approved"),
            VerificationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationAction {
    Submit,
    Approve,
    Reject,
}

impl fmt::Display for VerificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationAction::Submit => write!(f, "submit"),
            VerificationAction::Approve => write!(f, "approve"),
            VerificationAction::Reject => write!(f, "reject"),
        }
    }
}

impl VerificationStatus {
    /// Status reached by applying `action`, or `None` when the move is illegal.
    pub fn apply(self, action: VerificationAction) -> Option<VerificationStatus> {
        use VerificationAction::*;
        use VerificationStatus::*;

        match (self, action) {
            (NotSubmitted | Rejected, Submit) => Some(Pending),
            (Pending, Approve) => Some(Approved),
            (Pending | Approved, Reject) => Some(Rejected),
            _ => None,
        }
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// A declared open interval `[from, to)` during which a professional can be booked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub professional_id: Uuid,
    #[serde(rename = "from_datetime")]
    pub from: DateTime<Utc>,
    #[serde(rename = "to_datetime")]
    pub to: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn is_well_formed(&self) -> bool {
        self.from < self.to
    }
}

/// Optional bounds used to narrow window listings and slot searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Inclusive overlap test: `to >= range.from AND from <= range.to`.
    /// Touching intervals count as overlapping.
    pub fn touches(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.from.map_or(true, |start| to >= start) && self.to.map_or(true, |end| from <= end)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProfessionalRequest {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: ProfessionalCategory,
    pub state: String,
    pub city: String,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfessionalRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub category: Option<ProfessionalCategory>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub skills: Option<BTreeSet<String>>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectProfessionalRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRequest {
    #[serde(alias = "from_datetime")]
    pub from: DateTime<Utc>,
    #[serde(alias = "to_datetime")]
    pub to: DateTime<Utc>,
}

/// Attribute filters for professional lookup. All present filters must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfessionalFilters {
    pub state: Option<String>,
    pub city: Option<String>,
    pub category: Option<ProfessionalCategory>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub approved_only: Option<bool>,
}

impl ProfessionalFilters {
    /// `state` and `category` match exactly; `city` and every requested
    /// skill match case-insensitively as substrings.
    pub fn matches(&self, professional: &Professional) -> bool {
        if let Some(state) = &self.state {
            if professional.state != *state {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if professional.category != *category {
                return false;
            }
        }

        if let Some(city) = &self.city {
            if !contains_ignore_case(&professional.city, city) {
                return false;
            }
        }

        let skills_match = self.skills.iter().all(|wanted| {
            professional.skills.iter().any(|skill| contains_ignore_case(skill, wanted))
        });
        if !skills_match {
            return false;
        }

        if self.approved_only.unwrap_or(false) && !professional.is_approved() {
            return false;
        }

        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfessionalError {
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Professional not found")]
    NotFound,

    #[error("Availability window not found")]
    WindowNotFound,

    #[error("Document not found")]
    DocumentNotFound,

    #[error("Professional already registered")]
    AlreadyRegistered,

    #[error("Cannot {action} a professional whose verification is {from}")]
    InvalidVerificationTransition {
        from: VerificationStatus,
        action: VerificationAction,
    },

    #[error("Professional is not approved")]
    NotApproved,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Record was modified concurrently: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalCollaboratorFailure(String),
}

impl From<DatabaseError> for ProfessionalError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => ProfessionalError::NotFound,
            DatabaseError::Conflict(msg) => ProfessionalError::Conflict(msg),
            other => ProfessionalError::ExternalCollaboratorFailure(other.to_string()),
        }
    }
}
