//! In-memory vector store
//!
//! Thread-safe via RwLock. Test/fallback backend; the production path is
//! `SqliteVectorStore`.

use super::traits::{VectorError, VectorResult, VectorStore};
use crate::encoder::DEFAULT_DIMENSIONS;
use crate::graph::PubKey;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory publication-key → vector map.
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<PubKey, Vec<f32>>>,
    dimension: usize,
}

impl InMemoryVectorStore {
    /// Create an empty store with the default encoder dimension.
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSIONS)
    }

    /// Create an empty store with a specific dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
            dimension,
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, key: &PubKey, vector: &[f32]) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                key: key.clone(),
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors
            .write()
            .unwrap()
            .insert(key.clone(), vector.to_vec());
        Ok(())
    }

    fn get(&self, keys: &[PubKey]) -> VectorResult<HashMap<PubKey, Vec<f32>>> {
        let vectors = self.vectors.read().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| vectors.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }

    fn contains(&self, key: &PubKey) -> VectorResult<bool> {
        Ok(self.vectors.read().unwrap().contains_key(key))
    }

    fn len(&self) -> VectorResult<usize> {
        Ok(self.vectors.read().unwrap().len())
    }
}
