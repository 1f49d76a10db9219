use thiserror::Error;

use crate::application::repos::RepoError;
use crate::cache::CacheError;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(RepoError),
    #[error(transparent)]
    Cache(CacheError),
    #[error("resource not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            RepoError::Duplicate { constraint } => {
                Self::Conflict(format!("violates `{constraint}`"))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<CacheError<RepoError>> for AppError {
    fn from(err: CacheError<RepoError>) -> Self {
        match err {
            CacheError::Fetch(source) => Self::from(source),
            CacheError::InvalidKey => Self::Cache(CacheError::InvalidKey),
            CacheError::TypeMismatch { key } => Self::Cache(CacheError::TypeMismatch { key }),
        }
    }
}
