// libs/professional-cell/src/services/documents.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

/// Blob storage for verification documents and profile photos.
///
/// Handles are opaque `bucket/path` strings. Objects are private; callers
/// obtain a time-limited URL through [`DocumentStore::access_url`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn store(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError>;

    async fn access_url(&self, handle: &str, ttl_seconds: u64) -> Result<String, DatabaseError>;
}

pub struct SupabaseDocumentStore {
    supabase: SupabaseClient,
}

impl SupabaseDocumentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl DocumentStore for SupabaseDocumentStore {
    async fn store(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        self.supabase.upload_object(bucket, object_path, bytes, content_type).await?;
        Ok(format!("{}/{}", bucket, object_path))
    }

    async fn access_url(&self, handle: &str, ttl_seconds: u64) -> Result<String, DatabaseError> {
        let (bucket, object_path) = split_handle(handle)?;
        self.supabase.create_signed_url(bucket, object_path, ttl_seconds).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in process memory. Used by the memory backend and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    objects: Mutex<HashMap<String, StoredDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object(&self, handle: &str) -> Option<StoredDocument> {
        self.objects.lock().await.get(handle).cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn store(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DatabaseError> {
        let handle = format!("{}/{}", bucket, object_path);
        debug!("Storing {} bytes at {}", bytes.len(), handle);
        self.objects.lock().await.insert(
            handle.clone(),
            StoredDocument {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(handle)
    }

    async fn access_url(&self, handle: &str, ttl_seconds: u64) -> Result<String, DatabaseError> {
        if !self.objects.lock().await.contains_key(handle) {
            return Err(DatabaseError::NotFound);
        }
        Ok(format!("memory://{}?expires_in={}", handle, ttl_seconds))
    }
}

fn split_handle(handle: &str) -> Result<(&str, &str), DatabaseError> {
    handle
        .split_once('/')
        .filter(|(bucket, path)| !bucket.is_empty() && !path.is_empty())
        .ok_or_else(|| DatabaseError::Decode(format!("Malformed document handle: {}", handle)))
}
