// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache error types

use pfk_core::PfkError;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Task(err.to_string())
    }
}

impl From<CacheError> for PfkError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => PfkError::Io(e),
            other => PfkError::Cache(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_pfk_error() {
        let io = CacheError::Io(std::io::Error::other("disk full"));
        assert!(matches!(PfkError::from(io), PfkError::Io(_)));

        let key = CacheError::InvalidKey(".hidden".into());
        assert!(matches!(PfkError::from(key), PfkError::Cache(m) if m.contains(".hidden")));
    }
}
