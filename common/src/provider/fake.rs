//! In-memory provider for handler tests.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{AssistantProvider, BatchReport, GenerationRequest, StoreFileEntry};
use crate::error::AppError;

#[derive(Default)]
struct FakeState {
    next_id: u32,
    stores: HashMap<String, Vec<StoreFileEntry>>,
    uploads: Vec<(String, Vec<u8>)>,
    file_names: HashMap<String, String>,
    generations: Vec<GenerationRequest>,
    calls: usize,
    /// Staged files observed on disk when each upload arrived.
    staged_seen: Vec<usize>,
}

/// Records every call; optionally fails or stalls individual steps.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
    answer: Option<String>,
    fail_all: bool,
    fail_uploads_named: Vec<String>,
    unindexable_named: Vec<String>,
    fail_batches: bool,
    stall_batches: bool,
    watch_dir: Option<std::path::PathBuf>,
}

impl FakeProvider {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            ..Default::default()
        }
    }

    /// Every call fails with a provider error.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    /// Uploads of files with this name fail.
    #[must_use]
    pub fn failing_upload_of(mut self, file_name: &str) -> Self {
        self.fail_uploads_named.push(file_name.to_string());
        self
    }

    /// Uploads succeed but indexing of files with this name fails in the batch.
    #[must_use]
    pub fn unindexable(mut self, file_name: &str) -> Self {
        self.unindexable_named.push(file_name.to_string());
        self
    }

    /// Creating a file batch fails; uploads still succeed.
    #[must_use]
    pub fn failing_batches(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    /// Batches never leave `in_progress`.
    #[must_use]
    pub fn stalling_batches(mut self) -> Self {
        self.stall_batches = true;
        self
    }

    /// Counts the entries of `dir` on every upload, see [`Self::staged_counts`].
    #[must_use]
    pub fn watching_staging_dir(mut self, dir: &Path) -> Self {
        self.watch_dir = Some(dir.to_path_buf());
        self
    }

    /// Pre-creates a store so status and upload tests can start from it.
    pub fn with_store(self, id: &str) -> Self {
        self.lock().stores.insert(id.to_string(), Vec::new());
        self
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    pub fn generations(&self) -> Vec<GenerationRequest> {
        self.lock().generations.clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.lock()
            .uploads
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn store_files(&self, id: &str) -> Option<Vec<StoreFileEntry>> {
        self.lock().stores.get(id).cloned()
    }

    pub fn staged_counts(&self) -> Vec<usize> {
        self.lock().staged_seen.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin_call(&self) -> Result<MutexGuard<'_, FakeState>, AppError> {
        let mut state = self.lock();
        state.calls += 1;
        if self.fail_all {
            return Err(AppError::ProviderPayload(
                "simulated upstream failure: invalid_api_key".into(),
            ));
        }
        Ok(state)
    }

    fn next_id(state: &mut FakeState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}{}", state.next_id)
    }
}

#[async_trait]
impl AssistantProvider for FakeProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
        let mut state = self.begin_call()?;
        state.generations.push(request);
        Ok(self.answer.clone().unwrap_or_default())
    }

    async fn create_vector_store(&self, _name: &str) -> Result<String, AppError> {
        let mut state = self.begin_call()?;
        let id = Self::next_id(&mut state, "vs_fake");
        state.stores.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<String, AppError> {
        let bytes = std::fs::read(path)?;
        let staged = self
            .watch_dir
            .as_ref()
            .and_then(|dir| std::fs::read_dir(dir).ok())
            .map(Iterator::count);

        let mut state = self.begin_call()?;
        if let Some(count) = staged {
            state.staged_seen.push(count);
        }
        if self.fail_uploads_named.iter().any(|name| name == file_name) {
            return Err(AppError::ProviderPayload(format!(
                "simulated rejection of {file_name}"
            )));
        }
        state.uploads.push((file_name.to_string(), bytes));
        let file_id = Self::next_id(&mut state, "file-");
        state.file_names.insert(file_id.clone(), file_name.to_string());
        Ok(file_id)
    }

    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<StoreFileEntry, AppError> {
        let mut state = self.begin_call()?;
        let entry = StoreFileEntry {
            id: file_id.to_string(),
            status: "completed".into(),
            last_error: None,
        };
        state
            .stores
            .get_mut(vector_store_id)
            .ok_or_else(|| AppError::ProviderPayload(format!("No vector store {vector_store_id}")))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<BatchReport, AppError> {
        let mut state = self.begin_call()?;
        if self.fail_batches {
            return Err(AppError::ProviderPayload(
                "simulated batch failure: store is full".into(),
            ));
        }
        let batch_id = Self::next_id(&mut state, "vsfb_");
        let total = u32::try_from(file_ids.len()).unwrap_or(u32::MAX);
        let store = state
            .stores
            .get_mut(vector_store_id)
            .ok_or_else(|| AppError::ProviderPayload(format!("No vector store {vector_store_id}")))?;
        store.extend(file_ids.into_iter().map(|id| StoreFileEntry {
            id,
            status: "in_progress".into(),
            last_error: None,
        }));

        Ok(BatchReport {
            batch_id,
            status: "in_progress".into(),
            completed: 0,
            failed: 0,
            in_progress: total,
            cancelled: 0,
            total,
            failures: Vec::new(),
        })
    }

    async fn poll_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<BatchReport, AppError> {
        let mut guard = self.begin_call()?;
        let state = &mut *guard;
        let store = state
            .stores
            .get_mut(vector_store_id)
            .ok_or_else(|| AppError::ProviderPayload(format!("No vector store {vector_store_id}")))?;
        let total = u32::try_from(store.len()).unwrap_or(u32::MAX);

        if self.stall_batches {
            return Ok(BatchReport {
                batch_id: batch_id.to_string(),
                status: "in_progress".into(),
                completed: 0,
                failed: 0,
                in_progress: total,
                cancelled: 0,
                total,
                failures: Vec::new(),
            });
        }

        let mut failures = Vec::new();
        for entry in store.iter_mut() {
            let unindexable = state
                .file_names
                .get(&entry.id)
                .is_some_and(|name| self.unindexable_named.contains(name));
            if unindexable {
                entry.status = "failed".into();
                entry.last_error = Some("unsupported_file".into());
                failures.push(entry.clone());
            } else {
                entry.status = "completed".into();
            }
        }
        let failed = u32::try_from(failures.len()).unwrap_or(u32::MAX);

        Ok(BatchReport {
            batch_id: batch_id.to_string(),
            status: "completed".into(),
            completed: total.saturating_sub(failed),
            failed,
            in_progress: 0,
            cancelled: 0,
            total,
            failures,
        })
    }

    async fn list_store_files(
        &self,
        vector_store_id: &str,
    ) -> Result<Vec<StoreFileEntry>, AppError> {
        let state = self.begin_call()?;
        state
            .stores
            .get(vector_store_id)
            .cloned()
            .ok_or_else(|| AppError::ProviderPayload(format!("No vector store {vector_store_id}")))
    }

    async fn list_models(&self) -> Result<Vec<String>, AppError> {
        let _state = self.begin_call()?;
        Ok(vec!["gpt-4o-mini".into(), "gpt-4o".into()])
    }
}
