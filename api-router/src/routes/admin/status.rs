use std::fmt::Write;

use axum::extract::State;
use common::provider::StoreFileEntry;

use crate::{api_state::ApiState, error::ApiError};

pub const NO_STORE_TEXT: &str = "No vector store configured yet.";

/// GET /admin/status: lists the files of the configured store.
pub async fn store_status(State(state): State<ApiState>) -> Result<String, ApiError> {
    let Some(resolved) = state.store_id.current().await else {
        return Ok(NO_STORE_TEXT.to_string());
    };

    let files = state
        .provider
        .list_store_files(&resolved.id)
        .await
        .map_err(|e| ApiError::upstream("Status error", &e))?;

    Ok(render_status(&resolved.id, &files))
}

pub fn render_status(vector_store_id: &str, files: &[StoreFileEntry]) -> String {
    let mut out = format!("Vector store: {vector_store_id}\nFiles: {}\n", files.len());
    for file in files {
        let _ = write!(out, "- {} ({})", file.id, file.status);
        if let Some(reason) = &file.last_error {
            let _ = write!(out, ": {reason}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_file() {
        let files = vec![
            StoreFileEntry {
                id: "file-1".into(),
                status: "completed".into(),
                last_error: None,
            },
            StoreFileEntry {
                id: "file-2".into(),
                status: "failed".into(),
                last_error: Some("unsupported file".into()),
            },
        ];

        assert_eq!(
            render_status("vs_abc", &files),
            "Vector store: vs_abc\nFiles: 2\n- file-1 (completed)\n- file-2 (failed): unsupported file\n"
        );
    }

    #[test]
    fn renders_empty_store() {
        assert_eq!(render_status("vs_abc", &[]), "Vector store: vs_abc\nFiles: 0\n");
    }
}
