//! Ingestion coordination: partition rebuild + embedding backfill
//!
//! Runs after the external parser has committed new records to the graph.
//! The rebuild is mandatory — new nodes change topology and therefore
//! community assignment, which implicitly invalidates every cached SIMILAR
//! edge. The backfill then encodes every titled publication that still
//! lacks an embedding, so retrying a partially-failed ingestion is always
//! safe.

use crate::encoder::TextEncoder;
use crate::graph::{BibGraph, GraphError, IngestRecord, PubKey, RebuildStats};
use crate::vector::VectorStore;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Default number of titles per encoder batch.
pub const ENCODER_BATCH_SIZE: usize = 500;

/// Errors that abort an ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    /// The partition rebuild failed; the graph stays on its last valid
    /// partition and no embeddings were attempted.
    #[error("community partition rebuild failed: {0}")]
    Rebuild(#[source] GraphError),

    #[error("ingest source failed: {0}")]
    Source(String),
}

/// Outcome of one ingestion: rebuild counts plus the embedding ledger.
///
/// A non-empty `failed` list means the ingestion is graph-complete but
/// embedding-incomplete; `backfill_embeddings` can be retried on its own.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub node_count: usize,
    pub relationship_count: usize,
    pub community_count: usize,
    /// Keys that received a new embedding
    pub embedded: Vec<PubKey>,
    /// Keys whose encoding or storage failed (retryable)
    pub failed: Vec<PubKey>,
}

/// Supplier of parsed bibliographic records (the external parser).
#[async_trait]
pub trait RawIngestSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<IngestRecord>, IngestError>;
}

/// Coordinates the two stores after a bulk load.
pub struct IngestionCoordinator {
    graph: Arc<BibGraph>,
    vectors: Arc<dyn VectorStore>,
    encoder: Arc<dyn TextEncoder>,
    batch_size: usize,
}

impl IngestionCoordinator {
    pub fn new(
        graph: Arc<BibGraph>,
        vectors: Arc<dyn VectorStore>,
        encoder: Arc<dyn TextEncoder>,
    ) -> Self {
        Self {
            graph,
            vectors,
            encoder,
            batch_size: ENCODER_BATCH_SIZE,
        }
    }

    /// Set the encoder batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The graph store this coordinator drives.
    pub fn graph(&self) -> Arc<BibGraph> {
        Arc::clone(&self.graph)
    }

    /// Rebuild the community partition, then backfill missing embeddings.
    ///
    /// `new_keys` are the publications the parser just committed; they are
    /// logged for traceability, but the backfill scans every titled
    /// publication without an embedding so that earlier gaps (placeholders
    /// that since gained a title, previously-failed batches) close too.
    pub fn ingest_batch(&self, new_keys: &[PubKey]) -> Result<IngestSummary, IngestError> {
        tracing::info!(new_publications = new_keys.len(), "starting ingestion");
        let stats = self
            .graph
            .rebuild_community_partition()
            .map_err(IngestError::Rebuild)?;

        let (embedded, failed) = self.backfill_embeddings();
        Ok(summary(stats, embedded, failed))
    }

    /// Encode and store embeddings for every titled publication that lacks
    /// one. Idempotent; failures are absorbed per batch and reported.
    pub fn backfill_embeddings(&self) -> (Vec<PubKey>, Vec<PubKey>) {
        let mut embedded = Vec::new();
        let mut failed = Vec::new();

        let mut missing: Vec<(PubKey, String)> = Vec::new();
        for (key, title) in self.graph.titled_publications() {
            match self.vectors.contains(&key) {
                Ok(true) => {}
                Ok(false) => missing.push((key, title)),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "vector lookup failed; key left for retry");
                    failed.push(key);
                }
            }
        }
        if missing.is_empty() {
            return (embedded, failed);
        }
        tracing::info!(count = missing.len(), "backfilling embeddings");

        for chunk in missing.chunks(self.batch_size) {
            let titles: Vec<&str> = chunk.iter().map(|(_, title)| title.as_str()).collect();
            let vectors = match self.encoder.encode(&titles) {
                Ok(vectors) if vectors.len() == titles.len() => vectors,
                Ok(vectors) => {
                    tracing::warn!(
                        titles = titles.len(),
                        vectors = vectors.len(),
                        "encoder returned a short batch; keys left for retry"
                    );
                    failed.extend(chunk.iter().map(|(key, _)| key.clone()));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(batch = chunk.len(), error = %e, "encoder batch failed; keys left for retry");
                    failed.extend(chunk.iter().map(|(key, _)| key.clone()));
                    continue;
                }
            };

            let pairs: Vec<(PubKey, Vec<f32>)> = chunk
                .iter()
                .map(|(key, _)| key.clone())
                .zip(vectors)
                .collect();
            match self.vectors.batch_upsert(&pairs) {
                Ok(()) => embedded.extend(pairs.into_iter().map(|(key, _)| key)),
                Err(batch) => {
                    for failure in &batch.failures {
                        tracing::warn!(key = %failure.key, error = %failure.error, "embedding upsert failed");
                    }
                    let bad: std::collections::HashSet<&PubKey> =
                        batch.failures.iter().map(|f| &f.key).collect();
                    for (key, _) in pairs {
                        if bad.contains(&key) {
                            failed.push(key);
                        } else {
                            embedded.push(key);
                        }
                    }
                }
            }
        }

        (embedded, failed)
    }
}

fn summary(stats: RebuildStats, embedded: Vec<PubKey>, failed: Vec<PubKey>) -> IngestSummary {
    IngestSummary {
        node_count: stats.node_count,
        relationship_count: stats.relationship_count,
        community_count: stats.community_count,
        embedded,
        failed,
    }
}
