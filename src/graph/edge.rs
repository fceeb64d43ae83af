//! Structural relations and derived similarity candidates

use super::node::PubKey;
use serde::{Deserialize, Serialize};

/// Structural relationship types of the bibliographic graph.
///
/// These are the substrate community detection runs on. `CitedBy` is
/// directed publication→publication; the other two are undirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    /// Publication ↔ Author
    AuthoredBy,
    /// Publication → Publication
    CitedBy,
    /// Publication ↔ Stream
    GroupedBy,
}

impl Relation {
    /// The relationship label as stored/exported (e.g. "CITED_BY")
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::AuthoredBy => "AUTHORED_BY",
            Relation::CitedBy => "CITED_BY",
            Relation::GroupedBy => "GROUPED_BY",
        }
    }
}

/// A structural candidate drawn from a SIMILAR edge.
///
/// SIMILAR edges exist only between publications of the same community and
/// only after that community's similarity subgraph has been built since the
/// last partition rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCandidate {
    pub key: PubKey,
    /// Structural similarity score from graph topology
    pub score: f64,
}
