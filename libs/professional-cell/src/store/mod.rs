// libs/professional-cell/src/store/mod.rs
//
// Persistence boundary for profiles and availability windows. Services only
// talk to these traits; the backend is chosen at startup.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{AvailabilityWindow, Professional, ProfessionalCategory, TimeRange, VerificationStatus};

pub mod memory;
pub mod supabase;

pub use memory::{InMemoryAvailabilityStore, InMemoryProfessionalStore};
pub use supabase::{SupabaseAvailabilityStore, SupabaseProfessionalStore};

/// Filters the backend can apply itself. Anything finer is done by the service.
#[derive(Debug, Clone, Default)]
pub struct ProfessionalQuery {
    pub state: Option<String>,
    pub category: Option<ProfessionalCategory>,
    pub status: Option<VerificationStatus>,
}

#[async_trait]
pub trait ProfessionalStore: Send + Sync {
    /// Fails with `Conflict` when a profile with the same id exists.
    async fn insert(&self, professional: Professional) -> Result<Professional, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<Professional>, DatabaseError>;

    async fn list(&self, query: &ProfessionalQuery) -> Result<Vec<Professional>, DatabaseError>;

    /// Writes the profile only if the stored `version` still equals
    /// `professional.version`, returning it with the version bumped.
    /// `NotFound` when the row is gone, `Conflict` when another write landed
    /// since the caller read it.
    async fn update(&self, professional: Professional) -> Result<Professional, DatabaseError>;
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, DatabaseError>;

    /// Only touches the window when it belongs to `professional_id`; otherwise `NotFound`.
    async fn update(
        &self,
        professional_id: Uuid,
        window_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, DatabaseError>;

    async fn delete(&self, professional_id: Uuid, window_id: Uuid) -> Result<(), DatabaseError>;

    /// Windows touching `range` (inclusive), ordered by start.
    async fn list(
        &self,
        professional_id: Uuid,
        range: &TimeRange,
    ) -> Result<Vec<AvailabilityWindow>, DatabaseError>;
}
