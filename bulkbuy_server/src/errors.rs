use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use bulkbuy_engine::GroupFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    FlowError(#[from] GroupFlowError),
}

impl ServerError {
    /// Stable machine-readable code included in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InitializeError(_) => "INITIALIZE_ERROR",
            Self::BackendError(_) => "BACKEND_ERROR",
            Self::InvalidRequestBody(_) => "INVALID_REQUEST",
            Self::IOError(_) => "IO_ERROR",
            Self::ConfigurationError(_) => "CONFIGURATION_ERROR",
            Self::AuthenticationError(_) => "UNAUTHORIZED",
            Self::FlowError(e) => e.code(),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::FlowError(e) => match e {
                GroupFlowError::GroupNotFound(_) |
                GroupFlowError::CommitmentNotFound(_) |
                GroupFlowError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                GroupFlowError::GroupClosed(_) | GroupFlowError::DuplicateCommitment => StatusCode::CONFLICT,
                GroupFlowError::InvalidQuantity |
                GroupFlowError::GroupExpired |
                GroupFlowError::ExceedsStock { .. } |
                GroupFlowError::OutsideRadius { .. } |
                GroupFlowError::CommitmentNotPending |
                GroupFlowError::InvalidGroupConfig(_) => StatusCode::BAD_REQUEST,
                GroupFlowError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
                GroupFlowError::ProcessorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                GroupFlowError::NotCommitmentOwner => StatusCode::FORBIDDEN,
                GroupFlowError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "code": self.code() }).to_string())
    }
}

/// Rejections from the webhook signature verifier middleware.
#[derive(Debug, Clone, Error)]
pub enum SignatureError {
    #[error("The delivery carries no signature header.")]
    MissingSignature,
    #[error("The delivery signature does not verify.")]
    InvalidSignature,
    #[error("The request body could not be read.")]
    UnreadableBody,
}

impl SignatureError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::UnreadableBody => "INVALID_REQUEST",
        }
    }
}

impl ResponseError for SignatureError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnreadableBody => StatusCode::BAD_REQUEST,
            Self::MissingSignature | Self::InvalidSignature => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string(), "code": self.code() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Access token signature is invalid.")]
    ValidationError,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token has expired.")]
    TokenExpired,
}
