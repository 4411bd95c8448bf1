use thiserror::Error;

use crate::controller::Mode;

#[derive(Debug, Error)]
pub enum Error {
    /// Required input was not supplied. Reported to the user before any call is made.
    #[error("{0}")]
    MissingInput(&'static str),

    #[error("Operation not available in {0} mode")]
    Unsupported(Mode),

    #[error("Only the contract owner can manage supported tokens")]
    NotOwner,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Contract call failed: {0}")]
    Contract(String),

    #[error("Gemini API error: {0}")]
    Ai(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
