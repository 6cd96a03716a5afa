//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carbon_verification::VerificationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no verification in flight for credit {0}")]
    NoActiveWave(String),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoActiveWave(_) => StatusCode::NOT_FOUND,
            Self::Verification(e) => match e {
                VerificationError::PublishFailed { .. } => StatusCode::BAD_GATEWAY,
                VerificationError::Cancelled(_) => StatusCode::CONFLICT,
                VerificationError::WaveLost(_) | VerificationError::AtCapacity { .. } => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                VerificationError::InvariantViolation { .. } | VerificationError::NoRegistries => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Server(e.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "rpc request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
