//! Vector storage trait definitions

use crate::graph::PubKey;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("vector for {key} has dimension {actual}, store expects {expected}")]
    DimensionMismatch {
        key: PubKey,
        expected: usize,
        actual: usize,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored vector for {0} is corrupt")]
    Corrupt(PubKey),
}

/// Result type for vector store operations
pub type VectorResult<T> = Result<T, VectorError>;

/// A single failed row within a batch upsert.
#[derive(Debug)]
pub struct BatchFailure {
    pub key: PubKey,
    pub error: VectorError,
}

/// A batch upsert that did not fully succeed.
///
/// Rows not listed in `failures` were committed and stay committed;
/// callers retry just the failed keys.
#[derive(Debug, Error)]
#[error("batch upsert failed for {} of {attempted} rows", .failures.len())]
pub struct BatchError {
    pub attempted: usize,
    pub failures: Vec<BatchFailure>,
}

/// Trait for embedding vector storage backends
///
/// A durable publication-key → fixed-length-vector map. No graph knowledge.
/// Implementations must be thread-safe; concurrent writes to the same key
/// resolve last-writer-wins with no partial-vector visibility.
pub trait VectorStore: Send + Sync {
    /// The fixed dimension every stored vector must have.
    fn dimension(&self) -> usize;

    /// Insert-or-replace one vector. Idempotent.
    fn upsert(&self, key: &PubKey, vector: &[f32]) -> VectorResult<()>;

    /// Bulk insert-or-replace.
    ///
    /// Either the whole batch succeeds, or the error names exactly which
    /// keys failed and why; rows committed before a failure are unaffected.
    fn batch_upsert(&self, pairs: &[(PubKey, Vec<f32>)]) -> Result<(), BatchError> {
        let mut failures = Vec::new();
        for (key, vector) in pairs {
            if let Err(error) = self.upsert(key, vector) {
                failures.push(BatchFailure {
                    key: key.clone(),
                    error,
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError {
                attempted: pairs.len(),
                failures,
            })
        }
    }

    /// Fetch the subset of `keys` that have a stored vector.
    ///
    /// Missing keys are simply absent from the result, never an error.
    fn get(&self, keys: &[PubKey]) -> VectorResult<HashMap<PubKey, Vec<f32>>>;

    /// Single-key convenience form of `get`.
    fn get_one(&self, key: &PubKey) -> VectorResult<Option<Vec<f32>>> {
        Ok(self.get(std::slice::from_ref(key))?.remove(key))
    }

    /// Whether a vector is stored for `key`.
    fn contains(&self, key: &PubKey) -> VectorResult<bool>;

    /// Number of stored vectors.
    fn len(&self) -> VectorResult<usize>;

    fn is_empty(&self) -> VectorResult<bool> {
        Ok(self.len()? == 0)
    }
}
