use std::fmt::Write;

use axum::extract::State;
use common::{error::Exposure, storage::vector_store_id::validate_store_id};
use tracing::error;

use crate::api_state::ApiState;

/// Shows only the key's prefix family and last four characters.
pub fn mask_api_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return "(not set)".to_string();
    }

    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "(set, too short to display)".to_string();
    }

    let prefix: String = chars.iter().take(3).collect();
    let suffix: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{prefix}...{suffix}")
}

/// GET /admin/diag: confirms the credential works and summarises the store id.
pub async fn diagnostics(State(state): State<ApiState>) -> String {
    let mut out = String::from("Diagnostics\n");
    let _ = writeln!(out, "API key: {}", mask_api_key(&state.config.openai_api_key));
    let _ = writeln!(out, "Model: {}", state.config.openai_model);

    match state.provider.list_models().await {
        Ok(models) => {
            let _ = writeln!(out, "Credential check: OK ({} models visible)", models.len());
        }
        Err(e) => {
            error!(error = ?e, "Diagnostic model listing failed");
            let report = e.report("Credential check failed", Exposure::Detailed);
            let _ = writeln!(out, "{}", report.public_message);
        }
    }

    match state.store_id.current().await {
        Some(resolved) => {
            let shape = match validate_store_id(&resolved.id) {
                Ok(()) => "valid".to_string(),
                Err(e) => format!("INVALID: {e}"),
            };
            let _ = writeln!(out, "Vector store: {} (from {})", resolved.id, resolved.source);
            let _ = writeln!(out, "Vector store id shape: {shape}");
        }
        None => {
            let _ = writeln!(
                out,
                "Vector store: none (state file {})",
                state.store_id.path().display()
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_edges() {
        assert_eq!(mask_api_key("sk-proj-abcdefgh1234"), "sk-...1234");
    }

    #[test]
    fn short_or_missing_keys_are_not_echoed() {
        assert_eq!(mask_api_key(""), "(not set)");
        assert_eq!(mask_api_key("sk-1234"), "(set, too short to display)");
    }
}
