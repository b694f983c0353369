//! POST /admin/upload: stages each multipart file on disk, forwards it to the
//! provider and attaches the result to the configured vector store.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
    time::Duration,
};

use axum::extract::{
    multipart::{Field, MultipartError, MultipartRejection},
    Multipart, State,
};
use common::{
    error::{AppError, Exposure},
    provider::BatchReport,
    storage::vector_store_id::validate_store_id,
    utils::config::{AppConfig, UploadMode},
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::{api_state::ApiState, error::ApiError};

pub const NO_STORE_MESSAGE: &str = "No vector store set. Click \"Create Vector Store\" first.";
pub const NO_FILES_MESSAGE: &str = "No files attached.";

const FILE_FIELDS: [&str; 2] = ["files", "files[]"];

/// A file held on local disk while it is forwarded. Dropping it deletes the file,
/// so every exit path of the handler releases it.
pub struct StagedUpload {
    temp: NamedTempFile,
    bytes: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn size(&self) -> u64 {
        self.bytes
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("file exceeds the {0} byte limit")]
    TooLarge(u64),
    #[error("could not stage file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not read the upload: {0}")]
    Multipart(#[from] MultipartError),
}

/// Streams one multipart field into a fresh temp file inside `dir`.
pub async fn stage_field(
    mut field: Field<'_>,
    dir: &Path,
    max_bytes: u64,
) -> Result<StagedUpload, StageError> {
    let temp = tempfile::Builder::new()
        .prefix("miq-upload-")
        .tempfile_in(dir)?;
    let mut writer = tokio::fs::File::from_std(temp.reopen()?);
    let mut bytes: u64 = 0;

    while let Some(chunk) = field.chunk().await? {
        bytes = bytes.saturating_add(chunk.len() as u64);
        if bytes > max_bytes {
            return Err(StageError::TooLarge(max_bytes));
        }
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;

    Ok(StagedUpload { temp, bytes })
}

/// Strips any client-side directories from the submitted name.
fn base_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim()
        .to_string()
}

struct UploadLog {
    lines: Vec<String>,
}

impl UploadLog {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn render(&self) -> String {
        let mut out = String::from("Uploaded:\n");
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn render_batch(report: &BatchReport) -> String {
    let mut out = format!(
        "Batch {}: {} ({} completed, {} failed, {} in progress, {} cancelled, {} total)",
        report.batch_id,
        report.status,
        report.completed,
        report.failed,
        report.in_progress,
        report.cancelled,
        report.total
    );
    for failure in &report.failures {
        let _ = write!(
            out,
            "\n- {} {}: {}",
            failure.id,
            failure.status,
            failure.last_error.as_deref().unwrap_or("no reason given")
        );
    }
    out
}

pub async fn upload_files(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let Some(resolved) = state.store_id.current().await else {
        return Err(ApiError::ValidationError(NO_STORE_MESSAGE.to_string()));
    };
    validate_store_id(&resolved.id).map_err(AppError::from)?;
    let vector_store_id = resolved.id;

    let mut multipart =
        multipart.map_err(|e| ApiError::ValidationError(format!("Could not read the upload: {e}")))?;

    let config = &state.config;
    let staging_dir = staging_dir(config).await?;

    let mut log = UploadLog::new();
    let mut uploaded: Vec<String> = Vec::new();
    let mut seen_files = 0usize;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Multipart stream broke off");
                log.push(format!("Could not read the rest of the upload: {e}"));
                return Err(interrupted(log, &uploaded));
            }
        };

        if !field.name().is_some_and(|name| FILE_FIELDS.contains(&name)) {
            continue;
        }
        let Some(file_name) = field.file_name().map(base_name).filter(|n| !n.is_empty()) else {
            continue;
        };
        seen_files = seen_files.saturating_add(1);

        if !config.extension_allowed(&file_name) {
            log.push(format!(
                "{file_name} -> skipped: file type not allowed (allowed: {})",
                config.upload_allowed_extensions.join(", ")
            ));
            continue;
        }

        let staged = match stage_field(field, &staging_dir, config.upload_max_file_bytes).await {
            Ok(staged) => staged,
            Err(StageError::Multipart(e)) => {
                warn!(file_name = %file_name, error = %e, "Multipart stream broke off mid-file");
                log.push(format!("{file_name} -> failed: could not read the upload: {e}"));
                return Err(interrupted(log, &uploaded));
            }
            Err(e) => {
                warn!(file_name = %file_name, error = %e, "Rejected upload");
                log.push(format!("{file_name} -> skipped: {e}"));
                continue;
            }
        };

        let result = state.provider.upload_file(staged.path(), &file_name).await;
        info!(file_name = %file_name, bytes = staged.size(), ok = result.is_ok(), "Forwarded staged file");
        drop(staged);

        let file_id = match result {
            Ok(file_id) => file_id,
            Err(e) => {
                let report = e.report(&format!("{file_name} -> failed"), Exposure::Detailed);
                error!(detail = %report.log_detail, "File upload failed");
                log.push(report.public_message);
                continue;
            }
        };

        match config.upload_mode {
            UploadMode::Batch => {
                log.push(format!("{file_name} -> uploaded ({file_id})"));
                uploaded.push(file_id);
            }
            UploadMode::PerFile => {
                match state.provider.attach_file(&vector_store_id, &file_id).await {
                    Ok(entry) => {
                        let mut line = format!("{file_name} -> uploaded ({file_id}), {}", entry.status);
                        if let Some(reason) = entry.last_error {
                            let _ = write!(line, ": {reason}");
                        }
                        log.push(line);
                    }
                    Err(e) => {
                        let report = e.report(
                            &format!("{file_name} -> uploaded ({file_id}) but not attached"),
                            Exposure::Detailed,
                        );
                        error!(detail = %report.log_detail, "Attaching file failed");
                        log.push(report.public_message);
                    }
                }
            }
        }
    }

    if seen_files == 0 {
        return Err(ApiError::ValidationError(NO_FILES_MESSAGE.to_string()));
    }

    if config.upload_mode == UploadMode::Batch {
        if uploaded.is_empty() {
            log.push("Nothing to attach.".to_string());
        } else {
            let report = attach_batch(&state, &vector_store_id, uploaded)
                .await
                .map_err(|e| {
                    let report = e.report("Upload failed", Exposure::Detailed);
                    error!(detail = %report.log_detail, "File batch failed");
                    log.push(report.public_message);
                    ApiError::InternalError(log.render())
                })?;
            log.push(render_batch(&report));
        }
    }

    Ok(log.render())
}

/// Ends a broken multipart request, naming files already sent to the provider
/// but not yet attached.
fn interrupted(mut log: UploadLog, pending: &[String]) -> ApiError {
    if !pending.is_empty() {
        warn!(file_ids = ?pending, "Uploaded files left unattached");
        log.push(format!(
            "Not attached because the upload was interrupted: {}",
            pending.join(", ")
        ));
    }
    ApiError::ValidationError(log.render())
}

async fn staging_dir(config: &AppConfig) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(AppError::from)?;
    Ok(config.upload_dir.clone())
}

/// Creates one file batch and polls it until the provider stops processing.
async fn attach_batch(
    state: &ApiState,
    vector_store_id: &str,
    file_ids: Vec<String>,
) -> Result<BatchReport, AppError> {
    let mut report = state
        .provider
        .create_file_batch(vector_store_id, file_ids)
        .await?;
    let interval = Duration::from_millis(state.config.upload_poll_interval_ms);
    let mut attempts = 0u32;

    while !report.is_finished() && attempts < state.config.upload_poll_max_attempts {
        tokio::time::sleep(interval).await;
        report = state
            .provider
            .poll_file_batch(vector_store_id, &report.batch_id)
            .await?;
        attempts = attempts.saturating_add(1);
    }

    if !report.is_finished() {
        warn!(batch_id = %report.batch_id, attempts, "Stopped polling unfinished file batch");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_drops_client_directories() {
        assert_eq!(base_name("C:\\Users\\me\\week1.pdf"), "week1.pdf");
        assert_eq!(base_name("docs/readings/week2.pdf"), "week2.pdf");
        assert_eq!(base_name("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn interrupted_upload_names_pending_files() {
        let mut log = UploadLog::new();
        log.push("a.pdf -> uploaded (file-1)".into());

        let err = interrupted(log, &["file-1".to_string()]);
        assert_eq!(
            err,
            ApiError::ValidationError(
                "Uploaded:\na.pdf -> uploaded (file-1)\nNot attached because the upload was interrupted: file-1\n".into()
            )
        );
    }

    #[test]
    fn batch_summary_lists_failures() {
        let report = BatchReport {
            batch_id: "vsfb_1".into(),
            status: "completed".into(),
            completed: 1,
            failed: 1,
            in_progress: 0,
            cancelled: 0,
            total: 2,
            failures: vec![common::provider::StoreFileEntry {
                id: "file-2".into(),
                status: "failed".into(),
                last_error: Some("unsupported_file".into()),
            }],
        };

        assert_eq!(
            render_batch(&report),
            "Batch vsfb_1: completed (1 completed, 1 failed, 0 in progress, 0 cancelled, 2 total)\n- file-2 failed: unsupported_file"
        );
    }
}
