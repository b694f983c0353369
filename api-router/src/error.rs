use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::{AppError, Exposure};
use thiserror::Error;

/// Failures of the admin surface. Rendered as plain text for the admin page log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    InternalError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotConfigured(String),
}

impl ApiError {
    /// Logs the full error and keeps the operator-facing summary.
    pub fn upstream(context: &str, err: &AppError) -> Self {
        let report = err.report(context, Exposure::Detailed);
        tracing::error!(detail = %report.log_detail, "Provider call failed");
        Self::InternalError(report.public_message)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError(_) | Self::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::StoreId(e) => Self::ValidationError(e.to_string()),
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::vector_store_id::StoreIdError;

    fn assert_status_code<T: IntoResponse>(response: T, expected_status: StatusCode) {
        let response = response.into_response();
        assert_eq!(response.status(), expected_status);
    }

    #[test]
    fn test_app_error_to_api_error_conversion() {
        let store_id = AppError::StoreId(StoreIdError::InvalidShape("abc".into()));
        assert!(matches!(ApiError::from(store_id), ApiError::ValidationError(msg) if msg.contains("abc")));

        let io = AppError::Io(std::io::Error::other("disk full at /var/secret"));
        assert_eq!(
            ApiError::from(io),
            ApiError::InternalError("Internal server error".to_string())
        );

        let upstream = AppError::ProviderPayload("quota exceeded".into());
        assert_eq!(
            ApiError::from(upstream),
            ApiError::InternalError("Internal server error".to_string())
        );
    }

    #[test]
    fn test_api_error_response_status_codes() {
        assert_status_code(
            ApiError::InternalError("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(
            ApiError::NotConfigured("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_status_code(ApiError::ValidationError("x".into()), StatusCode::BAD_REQUEST);
        assert_status_code(ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN);
    }

    #[test]
    fn upstream_errors_keep_best_effort_detail() {
        let err = AppError::ProviderPayload("store is full".into());
        let api_error = ApiError::upstream("Upload failed", &err);

        assert_eq!(
            api_error,
            ApiError::InternalError("Upload failed: store is full".into())
        );
    }
}
