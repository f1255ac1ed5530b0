use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{
    Professional, ProfessionalCategory, ProfessionalError, ProfessionalFilters,
    RegisterProfessionalRequest, UpdateProfessionalRequest, VerificationAction,
    VerificationStatus,
};
use crate::services::documents::DocumentStore;
use crate::store::{ProfessionalQuery, ProfessionalStore};

const PHOTO_OBJECT_NAME: &str = "avatar";

pub struct ProfessionalService {
    store: Arc<dyn ProfessionalStore>,
    documents: Arc<dyn DocumentStore>,
    documents_bucket: String,
    photos_bucket: String,
}

impl ProfessionalService {
    pub fn new(
        store: Arc<dyn ProfessionalStore>,
        documents: Arc<dyn DocumentStore>,
        documents_bucket: impl Into<String>,
        photos_bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            documents,
            documents_bucket: documents_bucket.into(),
            photos_bucket: photos_bucket.into(),
        }
    }

    // ==============================================================================
    // PROFILE
    // ==============================================================================

    /// Create the profile for an authenticated professional. The profile id
    /// is the account id.
    pub async fn register(
        &self,
        account_id: Uuid,
        request: RegisterProfessionalRequest,
    ) -> Result<Professional, ProfessionalError> {
        require_text("full_name", &request.full_name)?;
        require_text("state", &request.state)?;
        require_text("city", &request.city)?;
        validate_category(&request.category)?;

        if self.store.get(account_id).await?.is_some() {
            return Err(ProfessionalError::AlreadyRegistered);
        }

        let now = Utc::now();
        let professional = Professional {
            id: account_id,
            full_name: request.full_name.trim().to_string(),
            email: request.email,
            phone: request.phone,
            category: request.category,
            state: request.state.trim().to_string(),
            city: request.city.trim().to_string(),
            skills: clean_skills(request.skills),
            bio: request.bio,
            photo_handle: None,
            documents: Vec::new(),
            verification_status: VerificationStatus::NotSubmitted,
            rejection_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let professional = self.store.insert(professional).await.map_err(|e| match e {
            DatabaseError::Conflict(_) => ProfessionalError::AlreadyRegistered,
            other => other.into(),
        })?;

        info!("Registered professional {} ({})", professional.id, professional.category);
        Ok(professional)
    }

    pub async fn get(&self, id: Uuid) -> Result<Professional, ProfessionalError> {
        self.store.get(id).await?.ok_or(ProfessionalError::NotFound)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        request: UpdateProfessionalRequest,
    ) -> Result<Professional, ProfessionalError> {
        let mut professional = self.get(id).await?;

        if let Some(full_name) = request.full_name {
            require_text("full_name", &full_name)?;
            professional.full_name = full_name.trim().to_string();
        }
        if let Some(category) = request.category {
            validate_category(&category)?;
            professional.category = category;
        }
        if let Some(state) = request.state {
            require_text("state", &state)?;
            professional.state = state.trim().to_string();
        }
        if let Some(city) = request.city {
            require_text("city", &city)?;
            professional.city = city.trim().to_string();
        }
        if let Some(skills) = request.skills {
            professional.skills = clean_skills(skills);
        }
        if request.phone.is_some() {
            professional.phone = request.phone;
        }
        if request.bio.is_some() {
            professional.bio = request.bio;
        }

        professional.updated_at = Utc::now();
        Ok(self.store.update(professional).await?)
    }

    /// Attribute lookup. Results are ordered by name, then id.
    pub async fn find(
        &self,
        filters: &ProfessionalFilters,
    ) -> Result<Vec<Professional>, ProfessionalError> {
        let query = ProfessionalQuery {
            state: filters.state.clone(),
            category: filters.category.clone(),
            status: filters
                .approved_only
                .unwrap_or(false)
                .then_some(VerificationStatus::Approved),
        };

        let mut professionals: Vec<Professional> = self
            .store
            .list(&query)
            .await?
            .into_iter()
            .filter(|p| filters.matches(p))
            .collect();
        professionals.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));

        debug!("Professional lookup matched {} profiles", professionals.len());
        Ok(professionals)
    }

    /// Fails with `NotApproved` unless an administrator approved the profile.
    pub async fn require_approved(&self, id: Uuid) -> Result<Professional, ProfessionalError> {
        let professional = self.get(id).await?;
        if !professional.is_approved() {
            return Err(ProfessionalError::NotApproved);
        }
        Ok(professional)
    }

    // ==============================================================================
    // VERIFICATION
    // ==============================================================================

    pub async fn submit_for_verification(&self, id: Uuid) -> Result<Professional, ProfessionalError> {
        let professional = self.get(id).await?;
        if professional.documents.is_empty() {
            return Err(ProfessionalError::ValidationError(
                "at least one verification document is required".to_string(),
            ));
        }
        self.transition(professional, VerificationAction::Submit, None).await
    }

    pub async fn list_pending(&self) -> Result<Vec<Professional>, ProfessionalError> {
        let query = ProfessionalQuery {
            status: Some(VerificationStatus::Pending),
            ..ProfessionalQuery::default()
        };
        Ok(self.store.list(&query).await?)
    }

    pub async fn approve(&self, id: Uuid) -> Result<Professional, ProfessionalError> {
        let professional = self.get(id).await?;
        self.transition(professional, VerificationAction::Approve, None).await
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Professional, ProfessionalError> {
        require_text("reason", reason)?;
        let professional = self.get(id).await?;
        self.transition(professional, VerificationAction::Reject, Some(reason.trim().to_string()))
            .await
    }

    async fn transition(
        &self,
        mut professional: Professional,
        action: VerificationAction,
        reason: Option<String>,
    ) -> Result<Professional, ProfessionalError> {
        let from = professional.verification_status;
        let to = from.apply(action).ok_or_else(|| {
            warn!("Rejected verification move {} for professional {} in {}", action, professional.id, from);
            ProfessionalError::InvalidVerificationTransition { from, action }
        })?;

        professional.verification_status = to;
        professional.rejection_reason = reason;
        professional.updated_at = Utc::now();

        let professional = self.store.update(professional).await?;
        info!("Professional {} verification {} -> {}", professional.id, from, to);
        Ok(professional)
    }

    // ==============================================================================
    // DOCUMENTS & PHOTO
    // ==============================================================================

    pub async fn upload_document(
        &self,
        id: Uuid,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Professional, ProfessionalError> {
        validate_object_name(name)?;
        if bytes.is_empty() {
            return Err(ProfessionalError::ValidationError("document is empty".to_string()));
        }

        let mut professional = self.get(id).await?;
        let handle = self
            .documents
            .store(&self.documents_bucket, &format!("{}/{}", id, name), bytes, content_type)
            .await?;

        if !professional.documents.contains(&handle) {
            professional.documents.push(handle);
        }
        professional.updated_at = Utc::now();
        Ok(self.store.update(professional).await?)
    }

    pub async fn document_url(
        &self,
        id: Uuid,
        name: &str,
        ttl_seconds: u64,
    ) -> Result<String, ProfessionalError> {
        validate_object_name(name)?;
        let professional = self.get(id).await?;
        let handle = format!("{}/{}/{}", self.documents_bucket, id, name);
        if !professional.documents.contains(&handle) {
            return Err(ProfessionalError::DocumentNotFound);
        }
        self.documents
            .access_url(&handle, ttl_seconds)
            .await
            .map_err(document_error)
    }

    pub async fn upload_photo(
        &self,
        id: Uuid,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Professional, ProfessionalError> {
        if !content_type.starts_with("image/") {
            return Err(ProfessionalError::ValidationError(
                "profile photo must be an image".to_string(),
            ));
        }

        let mut professional = self.get(id).await?;
        let handle = self
            .documents
            .store(&self.photos_bucket, &format!("{}/{}", id, PHOTO_OBJECT_NAME), bytes, content_type)
            .await?;

        professional.photo_handle = Some(handle);
        professional.updated_at = Utc::now();
        Ok(self.store.update(professional).await?)
    }

    pub async fn photo_url(&self, id: Uuid, ttl_seconds: u64) -> Result<String, ProfessionalError> {
        let professional = self.get(id).await?;
        let handle = professional.photo_handle.ok_or(ProfessionalError::DocumentNotFound)?;
        self.documents
            .access_url(&handle, ttl_seconds)
            .await
            .map_err(document_error)
    }
}

fn document_error(err: DatabaseError) -> ProfessionalError {
    match err {
        DatabaseError::NotFound => ProfessionalError::DocumentNotFound,
        other => other.into(),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ProfessionalError> {
    if value.trim().is_empty() {
        return Err(ProfessionalError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_category(category: &ProfessionalCategory) -> Result<(), ProfessionalError> {
    match category {
        ProfessionalCategory::Other(text) => require_text("category", text),
        _ => Ok(()),
    }
}

fn validate_object_name(name: &str) -> Result<(), ProfessionalError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if !valid {
        return Err(ProfessionalError::ValidationError(format!("invalid document name '{}'", name)));
    }
    Ok(())
}

fn clean_skills(skills: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    skills
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
