//! Validation errors for shared domain types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid fmid: {0}")]
    InvalidFmid(String),

    #[error("invalid uri pattern: {0}")]
    InvalidPattern(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
