// libs/appointment-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use professional_cell::models::{Professional, ProfessionalCategory, ProfessionalFilters, TimeRange};
use shared_database::DatabaseError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub patient_id: Uuid,
    #[serde(rename = "from_datetime")]
    pub from: DateTime<Utc>,
    #[serde(rename = "to_datetime")]
    pub to: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment_order_id: Option<String>,
    pub payment_reference: Option<String>,
    /// Bumped on every write; updates are conditional on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open overlap: touching intervals do not overlap.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.from < to && from < self.to
    }

    pub fn holds_capacity(&self) -> bool {
        self.status.consumes_capacity()
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.from >= now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl AppointmentStatus {
    /// Pending holds the interval as well, so two patients cannot race for it.
    pub fn consumes_capacity(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Accepted)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Cancelled)
    }

    pub fn capacity_consuming() -> &'static [AppointmentStatus] {
        &[AppointmentStatus::Pending, AppointmentStatus::Accepted]
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Accepted => write!(f, "accepted"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "accepted" => Ok(AppointmentStatus::Accepted),
            "rejected" => Ok(AppointmentStatus::Rejected),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!("unknown status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Cancelled,
    RefundInitiated,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
            PaymentStatus::RefundInitiated => write!(f, "refund_initiated"),
        }
    }
}

/// A bookable sub-interval `[from, to)`. Derived on demand, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl Slot {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.from <= from && to <= self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

/// Appointment as listed to a user, with the read-time `upcoming` flag.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub upcoming: bool,
}

impl AppointmentView {
    pub fn at(appointment: Appointment, now: DateTime<Utc>) -> Self {
        let upcoming = appointment.is_upcoming(now);
        Self { appointment, upcoming }
    }
}

// ==============================================================================
// SEARCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub state: Option<String>,
    pub city: Option<String>,
    pub category: Option<ProfessionalCategory>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub approved_only: Option<bool>,
}

impl SearchFilters {
    pub fn profile_filters(&self) -> ProfessionalFilters {
        ProfessionalFilters {
            state: self.state.clone(),
            city: self.city.clone(),
            category: self.category.clone(),
            skills: self.skills.clone(),
            approved_only: self.approved_only,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.from, self.to)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfessionalSlots {
    pub professional: Professional,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub professional_id: Uuid,
    #[serde(alias = "from_datetime")]
    pub from: DateTime<Utc>,
    #[serde(alias = "to_datetime")]
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    #[serde(alias = "from_datetime")]
    pub from: DateTime<Utc>,
    #[serde(alias = "to_datetime")]
    pub to: DateTime<Utc>,
}

// ==============================================================================
// PAYMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

/// What the checkout widget hands back after the payer completes a payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeRequest {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Succeeded { reference: String },
    Declined { reason: String },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Requested interval is not available")]
    SlotUnavailable,

    #[error("Cannot {action} an appointment that is {status}/{payment_status}")]
    InvalidTransition {
        status: AppointmentStatus,
        payment_status: PaymentStatus,
        action: &'static str,
    },

    #[error("Paid appointments cannot be rescheduled")]
    EditNotAllowed,

    #[error("Appointment was modified concurrently")]
    Conflict,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("External service error: {0}")]
    ExternalCollaboratorFailure(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => AppointmentError::NotFound,
            DatabaseError::Conflict(_) => AppointmentError::Conflict,
            DatabaseError::Overlap => AppointmentError::SlotUnavailable,
            other => AppointmentError::ExternalCollaboratorFailure(other.to_string()),
        }
    }
}

impl From<professional_cell::models::ProfessionalError> for AppointmentError {
    fn from(err: professional_cell::models::ProfessionalError) -> Self {
        use professional_cell::models::ProfessionalError;

        match err {
            ProfessionalError::InvalidRange(msg) => AppointmentError::InvalidRange(msg),
            ProfessionalError::ValidationError(msg) => AppointmentError::ValidationError(msg),
            other => AppointmentError::ExternalCollaboratorFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, hour, minute, 0).unwrap()
    }

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            professional_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            from: at(9, 0),
            to: at(10, 0),
            status,
            payment_status: PaymentStatus::Unpaid,
            payment_order_id: None,
            payment_reference: None,
            version: 1,
            created_at: at(0, 0),
            updated_at: at(0, 0),
        }
    }

    #[test]
    fn overlap_is_half_open() {
        let appt = appointment(AppointmentStatus::Pending);
        assert!(appt.overlaps(at(9, 30), at(10, 30)));
        assert!(appt.overlaps(at(8, 0), at(11, 0)));
        assert!(!appt.overlaps(at(10, 0), at(11, 0)));
        assert!(!appt.overlaps(at(8, 0), at(9, 0)));
    }

    #[test]
    fn capacity_and_terminal_statuses() {
        assert!(AppointmentStatus::Pending.consumes_capacity());
        assert!(AppointmentStatus::Accepted.consumes_capacity());
        assert!(!AppointmentStatus::Rejected.consumes_capacity());
        assert!(!AppointmentStatus::Cancelled.consumes_capacity());

        assert!(AppointmentStatus::Rejected.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Accepted.is_terminal());
    }

    #[test]
    fn row_shape_matches_table_columns() {
        let json = serde_json::to_value(appointment(AppointmentStatus::Accepted)).unwrap();
        assert_eq!(json["from_datetime"], "2024-01-10T09:00:00Z");
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["payment_status"], "unpaid");

        let refund = serde_json::to_value(PaymentStatus::RefundInitiated).unwrap();
        assert_eq!(refund, "refund_initiated");
    }

    #[test]
    fn views_flag_upcoming_at_read_time() {
        let appt = appointment(AppointmentStatus::Pending);
        assert!(AppointmentView::at(appt.clone(), at(9, 0)).upcoming);
        assert!(!AppointmentView::at(appt, at(9, 1)).upcoming);
    }

    #[test]
    fn database_errors_map_to_taxonomy() {
        assert_eq!(AppointmentError::from(DatabaseError::Overlap), AppointmentError::SlotUnavailable);
        assert_eq!(
            AppointmentError::from(DatabaseError::Conflict("version".to_string())),
            AppointmentError::Conflict
        );
        assert!(matches!(
            AppointmentError::from(DatabaseError::Transport("timeout".to_string())),
            AppointmentError::ExternalCollaboratorFailure(_)
        ));
    }

    #[test]
    fn slot_containment() {
        let slot = Slot::new(at(9, 0), at(12, 0));
        assert!(slot.contains(at(9, 0), at(12, 0)));
        assert!(slot.contains(at(10, 0), at(11, 0)));
        assert!(!slot.contains(at(8, 59), at(10, 0)));
        assert!(!slot.contains(at(11, 0), at(12, 1)));
    }
}
