pub mod availability;
pub mod documents;
pub mod professional;

pub use availability::AvailabilityService;
pub use documents::{DocumentStore, InMemoryDocumentStore, StoredDocument, SupabaseDocumentStore};
pub use professional::ProfessionalService;
