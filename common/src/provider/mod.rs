//! Seam between the HTTP handlers and the hosted model/vector-store API.

use std::{fmt, path::Path};

use async_trait::async_trait;

use crate::error::AppError;

pub mod openai;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    /// When set, the model may search this vector store.
    pub vector_store_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFileEntry {
    pub id: String,
    pub status: String,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: String,
    pub status: String,
    pub completed: u32,
    pub failed: u32,
    pub in_progress: u32,
    pub cancelled: u32,
    pub total: u32,
    /// Entries of the store that ended up failed, with the provider's reason.
    pub failures: Vec<StoreFileEntry>,
}

impl BatchReport {
    pub fn is_finished(&self) -> bool {
        self.status != "in_progress"
    }
}

#[async_trait]
pub trait AssistantProvider: Send + Sync {
    /// Runs one generation call and returns the concatenated output text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError>;

    async fn create_vector_store(&self, name: &str) -> Result<String, AppError>;

    /// Uploads a local file for retrieval use and returns the provider file id.
    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<String, AppError>;

    /// Attaches one uploaded file and returns its store entry.
    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<StoreFileEntry, AppError>;

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<BatchReport, AppError>;

    async fn poll_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<BatchReport, AppError>;

    async fn list_store_files(&self, vector_store_id: &str)
        -> Result<Vec<StoreFileEntry>, AppError>;

    async fn list_models(&self) -> Result<Vec<String>, AppError>;
}

/// Renders a provider status enum the way the API spells it (`InProgress` -> `in_progress`).
pub(crate) fn status_label<T: fmt::Debug>(value: &T) -> String {
    let debug = format!("{value:?}");
    let mut label = String::with_capacity(debug.len() + 4);
    for (index, ch) in debug.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                label.push('_');
            }
            label.push(ch.to_ascii_lowercase());
        } else {
            label.push(ch);
        }
    }
    label
}
