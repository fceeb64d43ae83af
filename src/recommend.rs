//! Hybrid recommendation: structural candidates reranked by content
//!
//! Candidates come from SIMILAR edges inside the target's community
//! (structure); their final order comes from cosine similarity between
//! title embeddings (content). Two fixed policies keep results
//! deterministic: a zero-norm vector has content similarity 0, and equal
//! content scores tie-break by ascending candidate key.

use crate::graph::{BibGraph, GraphError, PubKey};
use crate::vector::{VectorError, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while computing recommendations
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("unknown publication: {0}")]
    NotFound(PubKey),

    #[error("publication {0} has no community assignment yet")]
    NoCommunity(PubKey),

    #[error("no embedding stored for {0}")]
    NoEmbedding(PubKey),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// One recommended publication, carrying both scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub key: PubKey,
    /// Structural similarity from the citation/authorship graph
    pub node_similarity: f64,
    /// Cosine similarity between title embeddings
    pub content_similarity: f64,
}

/// The hybrid recommendation engine
///
/// Reads the graph store for structure and the vector store for content;
/// owns no state of its own.
pub struct RecommendationEngine {
    graph: Arc<BibGraph>,
    vectors: Arc<dyn VectorStore>,
}

impl RecommendationEngine {
    pub fn new(graph: Arc<BibGraph>, vectors: Arc<dyn VectorStore>) -> Self {
        Self { graph, vectors }
    }

    /// Recommend up to `k` publications related to `key`.
    ///
    /// Candidates lacking a stored vector are dropped (logged, non-fatal);
    /// an empty result is valid and distinct from any error.
    pub fn recommend(&self, key: &PubKey, k: usize) -> Result<Vec<Recommendation>, RecommendError> {
        let community = self.graph.community_of(key).map_err(|e| match e {
            GraphError::NotFound(key) => RecommendError::NotFound(key),
            GraphError::NoCommunity(key) => RecommendError::NoCommunity(key),
            other => RecommendError::Graph(other),
        })?;

        // cheap no-op when the community's subgraph is already built
        self.graph.ensure_similarity_subgraph(community)?;
        let candidates = self.graph.top_k_similar(key, k)?;

        let mut wanted: Vec<PubKey> = Vec::with_capacity(candidates.len() + 1);
        wanted.push(key.clone());
        wanted.extend(candidates.iter().map(|c| c.key.clone()));
        let vectors = self.vectors.get(&wanted)?;

        let target = vectors
            .get(key)
            .ok_or_else(|| RecommendError::NoEmbedding(key.clone()))?;

        let mut results: Vec<Recommendation> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match vectors.get(&candidate.key) {
                Some(vector) => results.push(Recommendation {
                    content_similarity: cosine_similarity(target, vector),
                    node_similarity: candidate.score,
                    key: candidate.key,
                }),
                None => {
                    tracing::warn!(
                        candidate = %candidate.key,
                        target = %key,
                        "candidate has no stored embedding; dropping from results"
                    );
                }
            }
        }

        results.sort_by(|a, b| {
            b.content_similarity
                .total_cmp(&a.content_similarity)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(results)
    }
}

/// Cosine similarity between two vectors: `dot(a,b) / (‖a‖·‖b‖)`.
///
/// Defined as 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
