// libs/appointment-cell/src/store/mod.rs
use async_trait::async_trait;
use uuid::Uuid;

use professional_cell::models::TimeRange;
use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentStatus};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Appointment persistence.
///
/// Backends must enforce the exclusion rule on `insert` and `update`: a
/// pending or accepted appointment may not overlap another pending or
/// accepted appointment of the same professional. Violations are reported
/// as [`DatabaseError::Overlap`].
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// Ordered by start.
    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;

    /// Ordered by start. `range` keeps appointments overlapping it (half-open).
    async fn list_for_professional(
        &self,
        professional_id: Uuid,
        statuses: Option<&[AppointmentStatus]>,
        range: &TimeRange,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    /// Writes `appointment` if the stored row still has `appointment.version`.
    /// The returned row carries the bumped version. A stale version is a
    /// `Conflict`, a missing row `NotFound`.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
}

pub(crate) fn in_range(appointment: &Appointment, range: &TimeRange) -> bool {
    range.from.map_or(true, |from| appointment.to > from)
        && range.to.map_or(true, |to| appointment.from < to)
}
