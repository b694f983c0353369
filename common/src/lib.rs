pub mod error;
pub mod prompts;
pub mod provider;
pub mod storage;
pub mod utils;
