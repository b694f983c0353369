use std::sync::Arc;

use common::{
    provider::{openai::OpenAiProvider, AssistantProvider},
    storage::vector_store_id::VectorStoreIdStore,
    utils::config::AppConfig,
};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub provider: Arc<dyn AssistantProvider>,
    pub store_id: VectorStoreIdStore,
}

impl ApiState {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_provider(config, Arc::new(OpenAiProvider::from_config(config)))
    }

    pub fn with_provider(config: &AppConfig, provider: Arc<dyn AssistantProvider>) -> Self {
        Self {
            config: config.clone(),
            provider,
            store_id: VectorStoreIdStore::from_config(config),
        }
    }
}
