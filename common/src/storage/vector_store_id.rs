//! The one piece of state this service owns: the id of the remote vector store.
//!
//! An environment override always wins. Otherwise the id lives in a small JSON
//! file that is re-read on every call, so a store created by one request is
//! visible to the next without any in-process cache.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::utils::config::AppConfig;

#[allow(clippy::expect_used)]
static STORE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^vs_[A-Za-z0-9_-]+$").expect("store id pattern is a valid literal regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreIdError {
    #[error(
        "\"{0}\" is not a valid vector store id. Expected \"vs_\" followed by letters, digits, '_' or '-'. Check VECTOR_STORE_ID or recreate the store."
    )]
    InvalidShape(String),
}

/// Checks an id against the shape the provider hands out.
pub fn validate_store_id(id: &str) -> Result<(), StoreIdError> {
    if STORE_ID_PATTERN.is_match(id) {
        Ok(())
    } else {
        Err(StoreIdError::InvalidShape(id.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreIdSource {
    Environment,
    File,
}

impl fmt::Display for StoreIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("VECTOR_STORE_ID environment variable"),
            Self::File => f.write_str("state file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStoreId {
    pub id: String,
    pub source: StoreIdSource,
}

/// Outcome of [`VectorStoreIdStore::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    File(PathBuf),
    /// Nothing was written: the environment override keeps winning.
    ShadowedByEnvironment(String),
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    #[serde(default)]
    vector_store_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VectorStoreIdStore {
    env_override: Option<String>,
    path: PathBuf,
}

impl VectorStoreIdStore {
    pub fn new(env_override: Option<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            env_override: env_override.filter(|id| !id.trim().is_empty()),
            path: path.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.vector_store_override().map(String::from),
            config.state_file.clone(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current id, if any. A missing or unreadable state file means "none".
    pub async fn current(&self) -> Option<ResolvedStoreId> {
        if let Some(id) = &self.env_override {
            return Some(ResolvedStoreId {
                id: id.trim().to_string(),
                source: StoreIdSource::Environment,
            });
        }

        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable state file");
                return None;
            }
        };

        match serde_json::from_slice::<StateFile>(&raw) {
            Ok(state) => state
                .vector_store_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(|id| ResolvedStoreId {
                    id,
                    source: StoreIdSource::File,
                }),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "State file is not valid JSON");
                None
            }
        }
    }

    /// Records a freshly created id unless the environment override shadows it.
    pub async fn persist(&self, id: &str) -> Result<Persisted, std::io::Error> {
        if let Some(existing) = &self.env_override {
            return Ok(Persisted::ShadowedByEnvironment(existing.clone()));
        }

        let state = StateFile {
            vector_store_id: Some(id.to_string()),
        };
        let body = serde_json::to_vec_pretty(&state)?;
        tokio::fs::write(&self.path, body).await?;

        Ok(Persisted::File(self.path.clone()))
    }
}
