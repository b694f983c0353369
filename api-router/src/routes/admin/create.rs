use axum::extract::State;
use common::storage::vector_store_id::Persisted;
use tracing::{error, info};

use crate::{api_state::ApiState, error::ApiError};

/// POST /admin/create: creates a fresh vector store and remembers its id.
pub async fn create_store(State(state): State<ApiState>) -> Result<String, ApiError> {
    let name = &state.config.vector_store_name;
    let id = state
        .provider
        .create_vector_store(name)
        .await
        .map_err(|e| ApiError::upstream("Failed to create store", &e))?;

    let mut message = format!("Vector store created: {id}\n");
    match state.store_id.persist(&id).await {
        Ok(Persisted::File(path)) => {
            info!(vector_store_id = %id, path = %path.display(), "Persisted vector store id");
            message.push_str(&format!(
                "(Also add VECTOR_STORE_ID={id} to your environment for persistence.)"
            ));
        }
        Ok(Persisted::ShadowedByEnvironment(current)) => {
            info!(vector_store_id = %id, active = %current, "Environment override shadows new store");
            message.push_str(&format!(
                "VECTOR_STORE_ID is set to {current} and still takes precedence. Update it to {id} to use the new store."
            ));
        }
        Err(e) => {
            error!(vector_store_id = %id, error = %e, "Failed to write state file");
            message.push_str(&format!(
                "Could not save the id locally ({e}). Add VECTOR_STORE_ID={id} to your environment."
            ));
        }
    }

    Ok(message)
}
