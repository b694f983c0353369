use async_openai::error::OpenAIError;
use thiserror::Error;

use crate::storage::vector_store_id::StoreIdError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Vector store id error: {0}")]
    StoreId(#[from] StoreIdError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Provider reported an error: {0}")]
    ProviderPayload(String),
}

/// What a caller is allowed to see next to what goes into the server log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub public_message: String,
    pub log_detail: String,
}

/// How much of an error may be echoed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// Public endpoints: only the fixed message leaves the process.
    Generic,
    /// Operator endpoints: the error text is appended to the message.
    Detailed,
}

impl AppError {
    /// Builds the public/log pair for this error.
    ///
    /// `context` is the fixed, caller-facing lead-in such as `"Upload failed"`.
    pub fn report(&self, context: &str, exposure: Exposure) -> ErrorReport {
        let log_detail = format!("{context}: {self:?}");
        let public_message = match exposure {
            Exposure::Generic => context.to_string(),
            Exposure::Detailed => format!("{context}: {}", self.detail()),
        };

        ErrorReport {
            public_message,
            log_detail,
        }
    }

    /// Best-effort short description without the variant prefix.
    fn detail(&self) -> String {
        match self {
            Self::OpenAI(OpenAIError::ApiError(api)) => api.message.clone(),
            Self::OpenAI(other) => other.to_string(),
            Self::ProviderPayload(msg) => msg.clone(),
            Self::StoreId(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_report_hides_detail() {
        let err = AppError::ProviderPayload("quota exceeded for key sk-123".into());
        let report = err.report("Sorry, there was a server error.", Exposure::Generic);

        assert_eq!(report.public_message, "Sorry, there was a server error.");
        assert!(report.log_detail.contains("quota exceeded"));
    }

    #[test]
    fn detailed_report_appends_detail() {
        let err = AppError::Io(std::io::Error::other("disk full"));
        let report = err.report("Upload failed", Exposure::Detailed);

        assert_eq!(report.public_message, "Upload failed: disk full");
        assert!(report.log_detail.starts_with("Upload failed: Io("));
    }

    #[test]
    fn store_id_detail_names_the_bad_id() {
        let err = AppError::from(crate::storage::vector_store_id::StoreIdError::InvalidShape(
            "store-1".into(),
        ));
        let report = err.report("Upload failed", Exposure::Detailed);

        assert!(report.public_message.contains("\"store-1\" is not a valid vector store id"));
    }
}
