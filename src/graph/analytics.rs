//! Graph analytics collaborator: community detection and node similarity
//!
//! The store orchestrates, caches, and invalidates these computations; the
//! math itself lives behind the `GraphAnalytics` trait so deployments can
//! delegate to an external analytics service while tests use small
//! deterministic backends.
//!
//! The crate ships `NeighborhoodAnalytics` as a usable default: synchronous
//! label propagation for partitioning, and neighborhood-overlap (Jaccard)
//! scoring bounded to distance-2 pairs for similarity.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors from an analytics backend.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics backend failed: {0}")]
    Backend(String),
}

/// What kind of node a projection slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Publication,
    Author,
    Stream,
}

/// A projected view of (a subset of) the graph handed to analytics.
///
/// Slots are arena indices local to the projection; `ids`, `kinds` and
/// `adjacency` are parallel. Adjacency is undirected, sorted, deduplicated.
#[derive(Debug, Clone)]
pub struct GraphProjection {
    /// Node identifiers (publication key, author name, or stream key)
    pub ids: Vec<String>,
    pub kinds: Vec<NodeKind>,
    pub adjacency: Vec<Vec<usize>>,
}

impl GraphProjection {
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }
}

/// A directed structural-similarity score between two projected publications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityPair {
    pub source: usize,
    pub target: usize,
    pub score: f64,
}

/// Trait for graph analytics backends.
///
/// Both operations must be deterministic for identical projections: the
/// store caches their output and callers rely on stable results between
/// rebuilds.
pub trait GraphAnalytics: Send + Sync {
    /// Assign a community label to every projected node.
    ///
    /// Labels are arbitrary (the store renumbers them densely); the returned
    /// vector must be parallel to the projection's slots.
    fn partition(&self, graph: &GraphProjection) -> Result<Vec<i64>, AnalyticsError>;

    /// Pairwise structural similarity between projected publication nodes.
    ///
    /// Only publication→publication pairs are meaningful; scores are
    /// positive and bounded to a reasonable neighborhood (implementations
    /// should not emit a full N² matrix).
    fn similarity(&self, graph: &GraphProjection) -> Result<Vec<SimilarityPair>, AnalyticsError>;
}

/// Default analytics backend: label propagation + neighborhood overlap.
///
/// Deterministic: nodes are visited in slot order, label ties resolve to the
/// smallest label, and similarity candidates are capped per node with a
/// stable ordering.
pub struct NeighborhoodAnalytics {
    /// Label propagation iteration cap
    max_iterations: usize,
    /// Per-node cap on retained similarity candidates
    candidate_cap: usize,
}

impl NeighborhoodAnalytics {
    pub fn new() -> Self {
        Self {
            max_iterations: 20,
            candidate_cap: 50,
        }
    }

    /// Set the per-node candidate cap
    pub fn with_candidate_cap(mut self, cap: usize) -> Self {
        self.candidate_cap = cap;
        self
    }
}

impl Default for NeighborhoodAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphAnalytics for NeighborhoodAnalytics {
    fn partition(&self, graph: &GraphProjection) -> Result<Vec<i64>, AnalyticsError> {
        let n = graph.node_count();
        let mut labels: Vec<i64> = (0..n as i64).collect();
        let neighbor_sets: Vec<HashSet<usize>> = graph
            .adjacency
            .iter()
            .map(|adj| adj.iter().copied().collect())
            .collect();

        for _ in 0..self.max_iterations {
            let mut changed = false;
            for v in 0..n {
                let neighbors = &graph.adjacency[v];
                if neighbors.is_empty() {
                    continue;
                }
                // per label: (frequency, shared-neighbor support). The support
                // term keeps single bridge edges from flooding a label across
                // otherwise dense clusters; remaining ties resolve to the
                // smallest label so the result is deterministic.
                let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
                for &u in neighbors {
                    let overlap = neighbor_sets[v].intersection(&neighbor_sets[u]).count();
                    let entry = counts.entry(labels[u]).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 += overlap;
                }
                let best = counts
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                    .map(|(label, _)| label)
                    .unwrap_or(labels[v]);
                if best != labels[v] {
                    labels[v] = best;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        Ok(labels)
    }

    fn similarity(&self, graph: &GraphProjection) -> Result<Vec<SimilarityPair>, AnalyticsError> {
        let n = graph.node_count();
        let neighbor_sets: Vec<HashSet<usize>> = graph
            .adjacency
            .iter()
            .map(|adj| adj.iter().copied().collect())
            .collect();

        let mut pairs = Vec::new();
        for v in 0..n {
            if graph.kinds[v] != NodeKind::Publication {
                continue;
            }
            // candidates: publications reachable in one or two hops
            let mut candidates: HashSet<usize> = HashSet::new();
            for &u in &graph.adjacency[v] {
                if graph.kinds[u] == NodeKind::Publication {
                    candidates.insert(u);
                }
                for &w in &graph.adjacency[u] {
                    if w != v && graph.kinds[w] == NodeKind::Publication {
                        candidates.insert(w);
                    }
                }
            }
            candidates.remove(&v);

            let mut scored: Vec<(usize, f64)> = candidates
                .into_iter()
                .filter_map(|w| {
                    let intersection = neighbor_sets[v].intersection(&neighbor_sets[w]).count();
                    let union = neighbor_sets[v].union(&neighbor_sets[w]).count();
                    if intersection == 0 || union == 0 {
                        return None;
                    }
                    Some((w, intersection as f64 / union as f64))
                })
                .collect();

            // descending score, stable tie-break on slot index
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            scored.truncate(self.candidate_cap);

            for (w, score) in scored {
                pairs.push(SimilarityPair {
                    source: v,
                    target: w,
                    score,
                });
            }
        }

        Ok(pairs)
    }
}
