use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument};

use professional_cell::services::ProfessionalService;

use crate::models::{AppointmentError, ProfessionalSlots, SearchFilters};
use crate::services::slots::SlotResolver;

/// Matches professionals on profile attributes and attaches their slots.
/// A professional with no free slot is still a match.
pub struct SearchEngine {
    professionals: Arc<ProfessionalService>,
    resolver: Arc<SlotResolver>,
}

impl SearchEngine {
    pub fn new(professionals: Arc<ProfessionalService>, resolver: Arc<SlotResolver>) -> Self {
        Self {
            professionals,
            resolver,
        }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, filters: &SearchFilters) -> Result<Vec<ProfessionalSlots>, AppointmentError> {
        let range = filters.range();
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(AppointmentError::InvalidRange(
                    "search start must not be after search end".to_string(),
                ));
            }
        }

        // Ordered by name, then id.
        let professionals = self.professionals.find(&filters.profile_filters()).await?;

        let results = try_join_all(professionals.into_iter().map(|professional| {
            let resolver = &self.resolver;
            async move {
                let slots = resolver.resolve(professional.id, &range, None).await?;
                Ok::<_, AppointmentError>(ProfessionalSlots { professional, slots })
            }
        }))
        .await?;

        debug!("Search matched {} professionals", results.len());
        Ok(results)
    }
}
