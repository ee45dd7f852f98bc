use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayGateApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The processor declined the hold: {0}")]
    Declined(String),
    #[error("Unknown hold reference: {0}")]
    UnknownHold(String),
}
