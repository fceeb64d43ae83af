//! The bibliographic graph: nodes, relations, partition, similarity cache

mod analytics;
mod edge;
mod node;
mod store;

pub use analytics::{
    AnalyticsError, GraphAnalytics, GraphProjection, NeighborhoodAnalytics, NodeKind,
    SimilarityPair,
};
pub use edge::{Relation, SimilarCandidate};
pub use node::{CommunityId, IngestRecord, PubKey, Publication};
pub use store::{BibGraph, GraphError, GraphResult, GraphStats, RebuildStats};
