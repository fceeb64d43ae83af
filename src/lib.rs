//! Citemesh: Hybrid Publication Recommendation Engine
//!
//! Recommends related publications by combining structural similarity from
//! a citation/authorship graph with content similarity from text
//! embeddings.
//!
//! # Core Concepts
//!
//! - **Graph store**: publications, authors and streams with their
//!   structural relations, partitioned into communities
//! - **Similarity subgraphs**: lazily-built, per-community SIMILAR edges
//!   carrying structural scores, invalidated by every partition rebuild
//! - **Vector store**: a durable publication-key → embedding map
//! - **Hybrid ranking**: structural candidates reranked by cosine
//!   similarity between title embeddings
//!
//! # Example
//!
//! ```
//! use citemesh::BibGraph;
//!
//! let graph = BibGraph::new();
//! assert!(!graph.has_community_partition());
//! ```

pub mod encoder;
pub mod graph;
pub mod ingest;
pub mod jobs;
pub mod recommend;
pub mod vector;

pub use encoder::{EncoderError, TextEncoder, DEFAULT_DIMENSIONS};
pub use graph::{
    AnalyticsError, BibGraph, CommunityId, GraphAnalytics, GraphError, GraphProjection,
    GraphResult, GraphStats, IngestRecord, NeighborhoodAnalytics, NodeKind, PubKey, Publication,
    RebuildStats, Relation, SimilarCandidate, SimilarityPair,
};
pub use ingest::{IngestError, IngestSummary, IngestionCoordinator, RawIngestSource};
pub use jobs::{JobId, JobState, JobStatus, JobTracker};
pub use recommend::{cosine_similarity, Recommendation, RecommendationEngine, RecommendError};
pub use vector::{
    BatchError, BatchFailure, InMemoryVectorStore, SqliteVectorStore, VectorError, VectorResult,
    VectorStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
