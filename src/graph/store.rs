//! The bibliographic graph store
//!
//! Owns the publication/author/stream graph, partitions it into communities,
//! and lazily materializes per-community structural-similarity subgraphs.
//! Nodes live in an arena (`Vec` + index maps keyed by publication key,
//! author name, and stream key); relations are an adjacency list over arena
//! indices, so there is no object graph to cycle-own.
//!
//! Concurrency contract:
//! - `rebuild_community_partition` is globally exclusive. While one runs,
//!   similarity reads/builds are rejected with `PartitionStale`. The new
//!   partition, the SIMILAR wipe, and the cache reset are committed under a
//!   single write lock, so readers observe the old partition or the new one,
//!   never a mixture.
//! - `ensure_similarity_subgraph` is single-flight per community: concurrent
//!   callers for the same unbuilt community share one build.

use super::analytics::{
    AnalyticsError, GraphAnalytics, GraphProjection, NeighborhoodAnalytics, NodeKind,
};
use super::edge::{Relation, SimilarCandidate};
use super::node::{CommunityId, IngestRecord, PubKey, Publication};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, RwLock};
use thiserror::Error;

/// Errors that can occur in graph store operations
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown publication: {0}")]
    NotFound(PubKey),

    #[error("publication {0} has no community assignment yet")]
    NoCommunity(PubKey),

    #[error("community {0} is not part of the current partition")]
    UnknownCommunity(CommunityId),

    #[error("no similarity data for community {0}; build its subgraph first")]
    NoSimilarityData(CommunityId),

    #[error("partition rebuild in progress; retry after it completes")]
    PartitionStale,

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// Result type for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Counts reported by a completed partition rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub node_count: usize,
    pub relationship_count: usize,
    pub community_count: usize,
}

/// Node counts for the browse layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub publications: usize,
    pub authors: usize,
    pub streams: usize,
}

/// An arena slot. Community membership lives in a parallel vector so a
/// rebuild can swap the whole assignment at once.
enum NodeSlot {
    Publication {
        key: PubKey,
        title: Option<String>,
        year: Option<i32>,
    },
    Author {
        name: String,
    },
    Stream {
        key: String,
    },
}

impl NodeSlot {
    fn kind(&self) -> NodeKind {
        match self {
            NodeSlot::Publication { .. } => NodeKind::Publication,
            NodeSlot::Author { .. } => NodeKind::Author,
            NodeSlot::Stream { .. } => NodeKind::Stream,
        }
    }

    fn id(&self) -> &str {
        match self {
            NodeSlot::Publication { key, .. } => key.as_str(),
            NodeSlot::Author { name } => name.as_str(),
            NodeSlot::Stream { key } => key.as_str(),
        }
    }
}

struct PartitionMeta {
    community_count: usize,
}

#[derive(Default)]
struct GraphInner {
    nodes: Vec<NodeSlot>,
    adjacency: Vec<Vec<(usize, Relation)>>,
    community: Vec<Option<CommunityId>>,
    pubs: HashMap<PubKey, usize>,
    authors: HashMap<String, usize>,
    streams: HashMap<String, usize>,
    relationship_count: usize,
    partition: Option<PartitionMeta>,
    /// Outgoing SIMILAR edges, sorted by descending score then ascending key
    similar: HashMap<usize, Vec<(usize, f64)>>,
    /// Communities whose similarity subgraph exists under the current partition
    built: HashSet<CommunityId>,
    /// Bumped on every completed rebuild; in-flight similarity builds that
    /// observe a bump abort instead of committing stale edges
    epoch: u64,
}

impl GraphInner {
    fn intern_publication(&mut self, key: &PubKey) -> (usize, bool) {
        if let Some(&idx) = self.pubs.get(key) {
            return (idx, false);
        }
        let idx = self.push_slot(NodeSlot::Publication {
            key: key.clone(),
            title: None,
            year: None,
        });
        self.pubs.insert(key.clone(), idx);
        (idx, true)
    }

    fn intern_author(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.authors.get(name) {
            return idx;
        }
        let idx = self.push_slot(NodeSlot::Author {
            name: name.to_string(),
        });
        self.authors.insert(name.to_string(), idx);
        idx
    }

    fn intern_stream(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.streams.get(key) {
            return idx;
        }
        let idx = self.push_slot(NodeSlot::Stream {
            key: key.to_string(),
        });
        self.streams.insert(key.to_string(), idx);
        idx
    }

    fn push_slot(&mut self, slot: NodeSlot) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(slot);
        self.adjacency.push(Vec::new());
        self.community.push(None);
        idx
    }

    fn add_relation(&mut self, a: usize, b: usize, relation: Relation) {
        if a == b {
            return;
        }
        if self.adjacency[a].iter().any(|&(n, r)| n == b && r == relation) {
            return;
        }
        self.adjacency[a].push((b, relation));
        self.adjacency[b].push((a, relation));
        self.relationship_count += 1;
    }

    fn publication_at(&self, idx: usize) -> Option<Publication> {
        match &self.nodes[idx] {
            NodeSlot::Publication { key, title, year } => Some(Publication {
                key: key.clone(),
                title: title.clone(),
                year: *year,
                community: self.community[idx],
            }),
            _ => None,
        }
    }

    fn pub_key_at(&self, idx: usize) -> Option<&PubKey> {
        match &self.nodes[idx] {
            NodeSlot::Publication { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Project the full node/edge set for community detection.
    fn project_all(&self) -> GraphProjection {
        GraphProjection {
            ids: self.nodes.iter().map(|n| n.id().to_string()).collect(),
            kinds: self.nodes.iter().map(NodeSlot::kind).collect(),
            adjacency: self
                .adjacency
                .iter()
                .map(|adj| {
                    let mut out: Vec<usize> = adj.iter().map(|&(n, _)| n).collect();
                    out.sort_unstable();
                    out.dedup();
                    out
                })
                .collect(),
        }
    }

    /// Project the subgraph restricted to one community's members.
    ///
    /// Returns the projection plus the member list mapping projection slots
    /// back to arena indices.
    fn project_community(&self, community: CommunityId) -> (GraphProjection, Vec<usize>) {
        let members: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.community[idx] == Some(community))
            .collect();
        let positions: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(local, &idx)| (idx, local))
            .collect();
        let adjacency = members
            .iter()
            .map(|&idx| {
                let mut out: Vec<usize> = self.adjacency[idx]
                    .iter()
                    .filter_map(|(n, _)| positions.get(n).copied())
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            })
            .collect();
        let projection = GraphProjection {
            ids: members
                .iter()
                .map(|&idx| self.nodes[idx].id().to_string())
                .collect(),
            kinds: members.iter().map(|&idx| self.nodes[idx].kind()).collect(),
            adjacency,
        };
        (projection, members)
    }
}

/// Single-flight build states for per-community similarity subgraphs
enum BuildState {
    Building,
    Ready,
}

/// The bibliographic graph store
pub struct BibGraph {
    inner: RwLock<GraphInner>,
    analytics: Box<dyn GraphAnalytics>,
    /// Mutual exclusion between rebuilds
    rebuild_gate: Mutex<()>,
    /// Set for the whole duration of a rebuild; similarity reads/builds
    /// observe it and fail with `PartitionStale`
    rebuilding: AtomicBool,
    builds: Mutex<HashMap<CommunityId, BuildState>>,
    build_done: Condvar,
}

impl Default for BibGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BibGraph {
    /// Create a store with the default analytics backend
    pub fn new() -> Self {
        Self::with_analytics(Box::new(NeighborhoodAnalytics::new()))
    }

    /// Create a store with a custom analytics backend
    pub fn with_analytics(analytics: Box<dyn GraphAnalytics>) -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            analytics,
            rebuild_gate: Mutex::new(()),
            rebuilding: AtomicBool::new(false),
            builds: Mutex::new(HashMap::new()),
            build_done: Condvar::new(),
        }
    }

    // === Ingestion write path ===

    /// Commit parsed records: publications, authors, streams and their
    /// relations, deduplicated. Returns the keys of publications that did
    /// not exist before (including placeholders created for cited keys).
    ///
    /// New nodes carry no community assignment until the next rebuild.
    pub fn apply_records(&self, records: &[IngestRecord]) -> Vec<PubKey> {
        let mut inner = self.inner.write().unwrap();
        let mut new_keys = Vec::new();
        for record in records {
            let (idx, created) = inner.intern_publication(&record.key);
            if created {
                new_keys.push(record.key.clone());
            }
            if let NodeSlot::Publication { title, year, .. } = &mut inner.nodes[idx] {
                if record.title.is_some() {
                    *title = record.title.clone();
                }
                *year = Some(record.year);
            }
            for author in &record.authors {
                let a = inner.intern_author(author);
                inner.add_relation(idx, a, Relation::AuthoredBy);
            }
            for cited in &record.citations {
                let (c, created_cited) = inner.intern_publication(cited);
                if created_cited {
                    new_keys.push(cited.clone());
                }
                inner.add_relation(idx, c, Relation::CitedBy);
            }
            if let Some(stream) = &record.stream {
                let s = inner.intern_stream(stream);
                inner.add_relation(idx, s, Relation::GroupedBy);
            }
        }
        tracing::debug!(
            records = records.len(),
            new_publications = new_keys.len(),
            "committed ingest records"
        );
        new_keys
    }

    // === Partition lifecycle ===

    /// Whether any community partition currently exists.
    pub fn has_community_partition(&self) -> bool {
        self.inner.read().unwrap().partition.is_some()
    }

    /// Drop all projected analysis state and SIMILAR edges, re-run community
    /// detection over the current node/edge set, and write the new
    /// assignment to every node.
    ///
    /// Exclusive with itself. On analytics failure the previous partition
    /// stays fully intact.
    pub fn rebuild_community_partition(&self) -> GraphResult<RebuildStats> {
        let _gate = self.rebuild_gate.lock().unwrap();
        self.rebuilding.store(true, Ordering::Release);
        let result = self.rebuild_locked();
        self.rebuilding.store(false, Ordering::Release);
        // wake ensure() waiters so they observe the new partition state
        self.build_done.notify_all();
        result
    }

    fn rebuild_locked(&self) -> GraphResult<RebuildStats> {
        let (projection, relationship_count) = {
            let inner = self.inner.read().unwrap();
            (inner.project_all(), inner.relationship_count)
        };
        let node_count = projection.node_count();

        let labels = self.analytics.partition(&projection)?;

        // renumber labels densely in first-appearance order
        let mut dense: HashMap<i64, i64> = HashMap::new();
        let mut assignment = Vec::with_capacity(labels.len());
        for label in labels {
            let next = dense.len() as i64;
            assignment.push(*dense.entry(label).or_insert(next));
        }
        let community_count = dense.len();

        {
            let mut inner = self.inner.write().unwrap();
            let mut community = vec![None; inner.nodes.len()];
            for (idx, label) in assignment.into_iter().enumerate() {
                community[idx] = Some(CommunityId::from(label));
            }
            inner.community = community;
            inner.similar.clear();
            inner.built.clear();
            inner.partition = Some(PartitionMeta { community_count });
            inner.epoch += 1;
        }
        {
            let mut builds = self.builds.lock().unwrap();
            builds.clear();
        }
        self.build_done.notify_all();

        tracing::info!(
            node_count,
            relationship_count,
            community_count,
            "community partition rebuilt"
        );
        Ok(RebuildStats {
            node_count,
            relationship_count,
            community_count,
        })
    }

    // === Similarity subgraph lifecycle ===

    /// Lazily build the similarity subgraph for one community.
    ///
    /// Idempotent: a no-op when the subgraph already exists under the
    /// current partition. Single-flight: concurrent callers for the same
    /// unbuilt community share exactly one build and all observe its result.
    pub fn ensure_similarity_subgraph(&self, community: CommunityId) -> GraphResult<()> {
        if self.rebuilding.load(Ordering::Acquire) {
            return Err(GraphError::PartitionStale);
        }
        {
            let inner = self.inner.read().unwrap();
            Self::check_community(&inner, community)?;
            if inner.built.contains(&community) {
                return Ok(());
            }
        }

        // single-flight: first caller becomes the builder, the rest wait
        {
            let mut builds = self.builds.lock().unwrap();
            loop {
                match builds.get(&community) {
                    Some(BuildState::Ready) => return Ok(()),
                    Some(BuildState::Building) => {
                        builds = self.build_done.wait(builds).unwrap();
                        if self.rebuilding.load(Ordering::Acquire) {
                            return Err(GraphError::PartitionStale);
                        }
                    }
                    None => {
                        builds.insert(community, BuildState::Building);
                        break;
                    }
                }
            }
        }

        let result = self.build_similarity(community);
        let mut builds = self.builds.lock().unwrap();
        match result {
            Ok(()) => {
                builds.insert(community, BuildState::Ready);
                self.build_done.notify_all();
                Ok(())
            }
            Err(e) => {
                builds.remove(&community);
                self.build_done.notify_all();
                Err(e)
            }
        }
    }

    fn build_similarity(&self, community: CommunityId) -> GraphResult<()> {
        let (projection, members, epoch) = {
            let inner = self.inner.read().unwrap();
            Self::check_community(&inner, community)?;
            let (projection, members) = inner.project_community(community);
            (projection, members, inner.epoch)
        };

        let pairs = self.analytics.similarity(&projection)?;

        let mut inner = self.inner.write().unwrap();
        if inner.epoch != epoch {
            // a rebuild won the race; these scores belong to a dead partition
            return Err(GraphError::PartitionStale);
        }
        let mut lists: HashMap<usize, Vec<(usize, f64)>> = HashMap::new();
        for pair in &pairs {
            let (Some(&source), Some(&target)) =
                (members.get(pair.source), members.get(pair.target))
            else {
                continue;
            };
            if inner.pub_key_at(source).is_none() || inner.pub_key_at(target).is_none() {
                continue;
            }
            lists.entry(source).or_default().push((target, pair.score));
        }
        let GraphInner { nodes, similar, built, .. } = &mut *inner;
        let key_at = |idx: usize| match &nodes[idx] {
            NodeSlot::Publication { key, .. } => key.as_str(),
            _ => "",
        };
        for (source, mut edges) in lists {
            edges.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| key_at(a.0).cmp(key_at(b.0))));
            similar.insert(source, edges);
        }
        built.insert(community);
        tracing::debug!(%community, edges = pairs.len(), "similarity subgraph built");
        Ok(())
    }

    fn check_community(inner: &GraphInner, community: CommunityId) -> GraphResult<()> {
        let count = inner
            .partition
            .as_ref()
            .map(|meta| meta.community_count)
            .unwrap_or(0);
        if community.value() < 0 || community.value() >= count as i64 {
            return Err(GraphError::UnknownCommunity(community));
        }
        Ok(())
    }

    /// Up to `k` structural candidates for `key`, descending score, drawn
    /// only from SIMILAR edges of its community.
    pub fn top_k_similar(&self, key: &PubKey, k: usize) -> GraphResult<Vec<SimilarCandidate>> {
        if self.rebuilding.load(Ordering::Acquire) {
            return Err(GraphError::PartitionStale);
        }
        let inner = self.inner.read().unwrap();
        let &idx = inner
            .pubs
            .get(key)
            .ok_or_else(|| GraphError::NotFound(key.clone()))?;
        let community = inner.community[idx].ok_or_else(|| GraphError::NoCommunity(key.clone()))?;
        if !inner.built.contains(&community) {
            return Err(GraphError::NoSimilarityData(community));
        }
        let candidates = inner
            .similar
            .get(&idx)
            .map(|edges| {
                edges
                    .iter()
                    .take(k)
                    .filter_map(|&(target, score)| {
                        inner.pub_key_at(target).map(|key| SimilarCandidate {
                            key: key.clone(),
                            score,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(candidates)
    }

    // === Read path ===

    /// The community of one publication.
    pub fn community_of(&self, key: &PubKey) -> GraphResult<CommunityId> {
        let inner = self.inner.read().unwrap();
        let &idx = inner
            .pubs
            .get(key)
            .ok_or_else(|| GraphError::NotFound(key.clone()))?;
        inner.community[idx].ok_or_else(|| GraphError::NoCommunity(key.clone()))
    }

    /// Look up one publication.
    pub fn publication(&self, key: &PubKey) -> Option<Publication> {
        let inner = self.inner.read().unwrap();
        inner.pubs.get(key).and_then(|&idx| inner.publication_at(idx))
    }

    /// Node counts for the browse layer.
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.read().unwrap();
        GraphStats {
            publications: inner.pubs.len(),
            authors: inner.authors.len(),
            streams: inner.streams.len(),
        }
    }

    /// Case-insensitive substring search over titled publications,
    /// newest first.
    pub fn search_by_title(&self, query: &str, limit: usize) -> Vec<Publication> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<Publication> = inner
            .pubs
            .values()
            .filter_map(|&idx| inner.publication_at(idx))
            .filter(|p| {
                p.title
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .collect();
        matches.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.key.cmp(&b.key)));
        matches.truncate(limit);
        matches
    }

    /// Publications sharing a stream with `key` (the browse-page
    /// "related publications" query).
    pub fn stream_neighbors(&self, key: &PubKey) -> GraphResult<Vec<Publication>> {
        let inner = self.inner.read().unwrap();
        let &idx = inner
            .pubs
            .get(key)
            .ok_or_else(|| GraphError::NotFound(key.clone()))?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &(stream, relation) in &inner.adjacency[idx] {
            if relation != Relation::GroupedBy {
                continue;
            }
            for &(other, back) in &inner.adjacency[stream] {
                if back != Relation::GroupedBy || other == idx || !seen.insert(other) {
                    continue;
                }
                if let Some(p) = inner.publication_at(other) {
                    out.push(p);
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    /// `(key, title)` pairs for every publication that has a title,
    /// in stable key order. The embedding backfill iterates this.
    pub fn titled_publications(&self) -> Vec<(PubKey, String)> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<(PubKey, String)> = inner
            .nodes
            .iter()
            .filter_map(|slot| match slot {
                NodeSlot::Publication {
                    key,
                    title: Some(title),
                    ..
                } => Some((key.clone(), title.clone())),
                _ => None,
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::analytics::SimilarityPair;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    /// Everything in one community; similarity pairs are scripted.
    struct ScriptedAnalytics {
        pairs: Vec<(String, String, f64)>,
        partition_calls: AtomicUsize,
        similarity_calls: AtomicUsize,
        similarity_delay: Option<Duration>,
        partition_delay: Option<Duration>,
    }

    impl ScriptedAnalytics {
        fn new(pairs: &[(&str, &str, f64)]) -> Self {
            Self {
                pairs: pairs
                    .iter()
                    .map(|(s, t, score)| (s.to_string(), t.to_string(), *score))
                    .collect(),
                partition_calls: AtomicUsize::new(0),
                similarity_calls: AtomicUsize::new(0),
                similarity_delay: None,
                partition_delay: None,
            }
        }

        fn with_similarity_delay(mut self, delay: Duration) -> Self {
            self.similarity_delay = Some(delay);
            self
        }

        fn with_partition_delay(mut self, delay: Duration) -> Self {
            self.partition_delay = Some(delay);
            self
        }
    }

    impl GraphAnalytics for ScriptedAnalytics {
        fn partition(&self, graph: &GraphProjection) -> Result<Vec<i64>, AnalyticsError> {
            self.partition_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.partition_delay {
                std::thread::sleep(delay);
            }
            Ok(vec![0; graph.node_count()])
        }

        fn similarity(&self, graph: &GraphProjection) -> Result<Vec<SimilarityPair>, AnalyticsError> {
            self.similarity_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.similarity_delay {
                std::thread::sleep(delay);
            }
            let slot_of = |id: &str| graph.ids.iter().position(|i| i == id);
            Ok(self
                .pairs
                .iter()
                .filter_map(|(s, t, score)| {
                    Some(SimilarityPair {
                        source: slot_of(s)?,
                        target: slot_of(t)?,
                        score: *score,
                    })
                })
                .collect())
        }
    }

    fn seed_records() -> Vec<IngestRecord> {
        vec![
            IngestRecord::new("conf/a", Some("Graph partitions"), 2019)
                .with_authors(&["Ada"])
                .with_citations(&["conf/b"])
                .with_stream("conf/graphs"),
            IngestRecord::new("conf/b", Some("Community detection"), 2020)
                .with_authors(&["Ada", "Grace"])
                .with_stream("conf/graphs"),
            IngestRecord::new("conf/c", Some("Vector reranking"), 2021)
                .with_authors(&["Grace"])
                .with_citations(&["conf/a"]),
        ]
    }

    fn scripted_graph(pairs: &[(&str, &str, f64)]) -> BibGraph {
        let graph = BibGraph::with_analytics(Box::new(ScriptedAnalytics::new(pairs)));
        graph.apply_records(&seed_records());
        graph
    }

    #[test]
    fn apply_records_reports_new_keys_and_placeholders() {
        let graph = BibGraph::new();
        let new_keys = graph.apply_records(&[IngestRecord::new(
            "conf/a",
            Some("Graph partitions"),
            2019,
        )
        .with_citations(&["conf/ghost"])]);

        assert_eq!(new_keys.len(), 2, "record plus cited placeholder");
        let ghost = graph.publication(&PubKey::from("conf/ghost")).unwrap();
        assert!(ghost.title.is_none(), "placeholder has no title");

        // re-applying the same record adds nothing
        let again = graph.apply_records(&[IngestRecord::new(
            "conf/a",
            Some("Graph partitions"),
            2019,
        )
        .with_citations(&["conf/ghost"])]);
        assert!(again.is_empty());
    }

    #[test]
    fn records_fill_in_placeholders() {
        let graph = BibGraph::new();
        graph.apply_records(&[
            IngestRecord::new("conf/a", Some("A"), 2019).with_citations(&["conf/b"])
        ]);
        graph.apply_records(&[IngestRecord::new("conf/b", Some("B"), 2020)]);

        let b = graph.publication(&PubKey::from("conf/b")).unwrap();
        assert_eq!(b.title.as_deref(), Some("B"));
        assert_eq!(b.year, Some(2020));
    }

    #[test]
    fn rebuild_assigns_every_node_and_reports_counts() {
        let graph = scripted_graph(&[]);
        assert!(!graph.has_community_partition());

        let stats = graph.rebuild_community_partition().unwrap();
        // 3 publications + 2 authors + 1 stream
        assert_eq!(stats.node_count, 6);
        // 4 AUTHORED_BY + 2 CITED_BY + 2 GROUPED_BY
        assert_eq!(stats.relationship_count, 8);
        assert_eq!(stats.community_count, 1);
        assert!(graph.has_community_partition());

        let a = graph.publication(&PubKey::from("conf/a")).unwrap();
        assert_eq!(a.community, Some(CommunityId::from(0)));
    }

    #[test]
    fn nodes_added_after_rebuild_have_no_community() {
        let graph = scripted_graph(&[]);
        graph.rebuild_community_partition().unwrap();
        graph.apply_records(&[IngestRecord::new("conf/late", Some("Late"), 2022)]);

        let late = PubKey::from("conf/late");
        assert!(matches!(
            graph.community_of(&late),
            Err(GraphError::NoCommunity(_))
        ));
        // the key exists but has no membership yet
        assert!(graph.publication(&late).unwrap().community.is_none());
    }

    #[test]
    fn top_k_before_build_is_no_similarity_data() {
        let graph = scripted_graph(&[("conf/a", "conf/b", 0.9)]);
        graph.rebuild_community_partition().unwrap();
        assert!(matches!(
            graph.top_k_similar(&PubKey::from("conf/a"), 5),
            Err(GraphError::NoSimilarityData(_))
        ));
    }

    #[test]
    fn ensure_then_top_k_returns_sorted_candidates() {
        let graph = scripted_graph(&[
            ("conf/a", "conf/b", 0.9),
            ("conf/a", "conf/c", 0.1),
            ("conf/b", "conf/a", 0.9),
        ]);
        graph.rebuild_community_partition().unwrap();
        let community = graph.community_of(&PubKey::from("conf/a")).unwrap();
        graph.ensure_similarity_subgraph(community).unwrap();

        let candidates = graph.top_k_similar(&PubKey::from("conf/a"), 5).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key, PubKey::from("conf/b"));
        assert!((candidates[0].score - 0.9).abs() < 1e-12);
        assert_eq!(candidates[1].key, PubKey::from("conf/c"));

        let top1 = graph.top_k_similar(&PubKey::from("conf/a"), 1).unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].key, PubKey::from("conf/b"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let graph = scripted_graph(&[("conf/a", "conf/b", 0.9)]);
        graph.rebuild_community_partition().unwrap();
        let community = graph.community_of(&PubKey::from("conf/a")).unwrap();

        graph.ensure_similarity_subgraph(community).unwrap();
        let first = graph.top_k_similar(&PubKey::from("conf/a"), 5).unwrap();
        graph.ensure_similarity_subgraph(community).unwrap();
        let second = graph.top_k_similar(&PubKey::from("conf/a"), 5).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn rebuild_invalidates_similarity_subgraphs() {
        let graph = scripted_graph(&[("conf/a", "conf/b", 0.9)]);
        graph.rebuild_community_partition().unwrap();
        let community = graph.community_of(&PubKey::from("conf/a")).unwrap();
        graph.ensure_similarity_subgraph(community).unwrap();
        assert!(!graph.top_k_similar(&PubKey::from("conf/a"), 5).unwrap().is_empty());

        // the second rebuild drops every SIMILAR edge
        graph.rebuild_community_partition().unwrap();
        assert!(matches!(
            graph.top_k_similar(&PubKey::from("conf/a"), 5),
            Err(GraphError::NoSimilarityData(_))
        ));
    }

    #[test]
    fn unknown_and_missing_keys_are_distinct_errors() {
        let graph = scripted_graph(&[]);
        assert!(matches!(
            graph.top_k_similar(&PubKey::from("conf/nope"), 5),
            Err(GraphError::NotFound(_))
        ));
        assert!(matches!(
            graph.top_k_similar(&PubKey::from("conf/a"), 5),
            Err(GraphError::NoCommunity(_))
        ));
        assert!(matches!(
            graph.ensure_similarity_subgraph(CommunityId::from(7)),
            Err(GraphError::UnknownCommunity(_))
        ));
    }

    #[test]
    fn similarity_calls_counted_once_across_concurrent_ensures() {
        let analytics = Arc::new(
            ScriptedAnalytics::new(&[("conf/a", "conf/b", 0.9)])
                .with_similarity_delay(Duration::from_millis(50)),
        );
        let graph = Arc::new(BibGraph::with_analytics(Box::new(SharedAnalytics(
            Arc::clone(&analytics),
        ))));
        graph.apply_records(&seed_records());
        graph.rebuild_community_partition().unwrap();
        let community = graph.community_of(&PubKey::from("conf/a")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let graph = Arc::clone(&graph);
                std::thread::spawn(move || graph.ensure_similarity_subgraph(community))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(
            analytics.similarity_calls.load(Ordering::SeqCst),
            1,
            "exactly one underlying build"
        );
    }

    /// Forwards to a shared ScriptedAnalytics so tests can observe call counts.
    struct SharedAnalytics(Arc<ScriptedAnalytics>);

    impl GraphAnalytics for SharedAnalytics {
        fn partition(&self, graph: &GraphProjection) -> Result<Vec<i64>, AnalyticsError> {
            self.0.partition(graph)
        }

        fn similarity(&self, graph: &GraphProjection) -> Result<Vec<SimilarityPair>, AnalyticsError> {
            self.0.similarity(graph)
        }
    }

    #[test]
    fn rebuild_in_progress_rejects_similarity_calls() {
        let analytics = ScriptedAnalytics::new(&[("conf/a", "conf/b", 0.9)])
            .with_partition_delay(Duration::from_millis(100));
        let graph = Arc::new(BibGraph::with_analytics(Box::new(analytics)));
        graph.apply_records(&seed_records());
        graph.rebuild_community_partition().unwrap();
        let community = graph.community_of(&PubKey::from("conf/a")).unwrap();
        graph.ensure_similarity_subgraph(community).unwrap();

        let rebuilder = {
            let graph = Arc::clone(&graph);
            std::thread::spawn(move || graph.rebuild_community_partition())
        };
        std::thread::sleep(Duration::from_millis(30));

        assert!(matches!(
            graph.ensure_similarity_subgraph(community),
            Err(GraphError::PartitionStale)
        ));
        assert!(matches!(
            graph.top_k_similar(&PubKey::from("conf/a"), 5),
            Err(GraphError::PartitionStale)
        ));

        rebuilder.join().unwrap().unwrap();
        // once the rebuild completes, similarity is rebuildable again
        graph.ensure_similarity_subgraph(community).unwrap();
    }

    #[test]
    fn browse_queries_cover_search_and_stream_neighbors() {
        let graph = scripted_graph(&[]);
        let hits = graph.search_by_title("DETECTION", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, PubKey::from("conf/b"));

        // newest first when several match
        let all = graph.search_by_title("o", 10);
        assert!(all.len() >= 2);
        assert!(all.windows(2).all(|w| w[0].year >= w[1].year));

        let neighbors = graph.stream_neighbors(&PubKey::from("conf/a")).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].key, PubKey::from("conf/b"));

        let stats = graph.stats();
        assert_eq!(stats.publications, 3);
        assert_eq!(stats.authors, 2);
        assert_eq!(stats.streams, 1);
    }

    #[test]
    fn titled_publications_skip_placeholders() {
        let graph = BibGraph::new();
        graph.apply_records(&[
            IngestRecord::new("conf/a", Some("A"), 2019).with_citations(&["conf/ghost"])
        ]);
        let titled = graph.titled_publications();
        assert_eq!(titled.len(), 1);
        assert_eq!(titled[0].0, PubKey::from("conf/a"));
    }
}
