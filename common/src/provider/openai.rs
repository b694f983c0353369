use std::{path::Path, sync::Arc};

use async_openai::{
    config::OpenAIConfig,
    types::{
        CreateFileRequestArgs, CreateVectorStoreFileBatchRequest, CreateVectorStoreFileRequest,
        CreateVectorStoreRequestArgs, FileInput, FilePurpose, VectorStoreFileBatchObject,
        VectorStoreFileObject,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{status_label, AssistantProvider, BatchReport, GenerationRequest, StoreFileEntry};
use crate::{error::AppError, utils::config::AppConfig};

pub type OpenAIClientType = Client<OpenAIConfig>;

/// Page size for list calls; the API caps it at 100.
const LIST_PAGE_SIZE: &str = "100";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Arc<OpenAIClientType>,
}

impl OpenAiProvider {
    pub fn new(client: Arc<OpenAIClientType>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        )))
    }
}

/// Body for `POST /responses`.
pub fn responses_payload(request: &GenerationRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "input": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user },
        ],
    });

    if let Some(vector_store_id) = &request.vector_store_id {
        payload["tools"] = json!([{
            "type": "file_search",
            "vector_store_ids": [vector_store_id],
        }]);
    }

    payload
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
    /// Set when the response ended in `failed` despite a 200 reply.
    #[serde(default)]
    error: Option<ResponseFailure>,
}

#[derive(Debug, Deserialize)]
struct ResponseFailure {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputContent {
    OutputText { text: String },
    #[serde(other)]
    Other,
}

impl ResponsesReply {
    fn into_answer(self) -> Result<String, AppError> {
        if let Some(failure) = self.error {
            let code = failure.code.as_deref().unwrap_or("unknown");
            return Err(AppError::ProviderPayload(format!(
                "{} ({code})",
                failure.message
            )));
        }

        Ok(self.output_text())
    }

    /// Joins every `output_text` part of every message item.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content } => Some(content),
                OutputItem::Other => None,
            })
            .flatten()
            .filter_map(|part| match part {
                OutputContent::OutputText { text } => Some(text.as_str()),
                OutputContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

fn store_entry(file: VectorStoreFileObject) -> StoreFileEntry {
    StoreFileEntry {
        status: status_label(&file.status),
        last_error: file.last_error.map(|error| error.message),
        id: file.id,
    }
}

fn batch_report(batch: VectorStoreFileBatchObject) -> BatchReport {
    BatchReport {
        status: status_label(&batch.status),
        completed: batch.file_counts.completed,
        failed: batch.file_counts.failed,
        in_progress: batch.file_counts.in_progress,
        cancelled: batch.file_counts.cancelled,
        total: batch.file_counts.total,
        batch_id: batch.id,
        failures: Vec::new(),
    }
}

#[async_trait]
impl AssistantProvider for OpenAiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
        debug!(
            model = %request.model,
            retrieval = request.vector_store_id.is_some(),
            "Sending generation request"
        );

        let reply: ResponsesReply = self
            .client
            .responses()
            .create_byot(responses_payload(&request))
            .await?;

        reply.into_answer()
    }

    async fn create_vector_store(&self, name: &str) -> Result<String, AppError> {
        let request = CreateVectorStoreRequestArgs::default().name(name).build()?;
        let store = self.client.vector_stores().create(request).await?;
        info!(vector_store_id = %store.id, name, "Created vector store");

        Ok(store.id)
    }

    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<String, AppError> {
        // Read from the staged copy but keep the caller's name: the API picks
        // the parser from the extension.
        let bytes = tokio::fs::read(path).await?;
        let request = CreateFileRequestArgs::default()
            .file(FileInput::from_vec_u8(file_name.to_string(), bytes))
            .purpose(FilePurpose::Assistants)
            .build()?;

        let file = self.client.files().create(request).await?;
        debug!(file_id = %file.id, file_name, "Uploaded file");

        Ok(file.id)
    }

    async fn attach_file(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<StoreFileEntry, AppError> {
        let request = CreateVectorStoreFileRequest {
            file_id: file_id.to_string(),
            ..Default::default()
        };
        let file = self
            .client
            .vector_stores()
            .files(vector_store_id)
            .create(request)
            .await?;

        Ok(store_entry(file))
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<BatchReport, AppError> {
        let request = CreateVectorStoreFileBatchRequest {
            file_ids,
            ..Default::default()
        };
        let batch = self
            .client
            .vector_stores()
            .file_batches(vector_store_id)
            .create(request)
            .await?;
        info!(batch_id = %batch.id, vector_store_id, "Created file batch");

        Ok(batch_report(batch))
    }

    async fn poll_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<BatchReport, AppError> {
        let vector_stores = self.client.vector_stores();
        let batches = vector_stores.file_batches(vector_store_id);
        let mut report = batch_report(batches.retrieve(batch_id).await?);

        if report.failed > 0 {
            let failed = batches
                .list(batch_id, &[("filter", "failed"), ("limit", LIST_PAGE_SIZE)])
                .await?;
            report.failures = failed.data.into_iter().map(store_entry).collect();
        }

        Ok(report)
    }

    async fn list_store_files(
        &self,
        vector_store_id: &str,
    ) -> Result<Vec<StoreFileEntry>, AppError> {
        let vector_stores = self.client.vector_stores();
        let files = vector_stores.files(vector_store_id);
        let mut entries = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", LIST_PAGE_SIZE.to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page = files.list(&query).await?;
            let has_more = page.has_more;
            after = page.data.last().map(|file| file.id.clone());
            entries.extend(page.data.into_iter().map(store_entry));

            if !has_more || after.is_none() {
                break;
            }
        }

        Ok(entries)
    }

    async fn list_models(&self) -> Result<Vec<String>, AppError> {
        let models = self.client.models().list().await?;

        Ok(models.data.into_iter().map(|model| model.id).collect())
    }
}
