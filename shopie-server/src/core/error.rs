use thiserror::Error;

/// Server lifecycle errors
///
/// Request-level failures use [`shared::AppError`]; this type covers
/// startup and shutdown only.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
