//! Node types of the bibliographic graph

use serde::{Deserialize, Serialize};

/// Stable unique identifier of a publication (e.g. a DBLP record key).
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PubKey(String);

impl PubKey {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PubKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PubKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PubKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a community produced by one partition rebuild.
///
/// Assignments are dense (`0..community_count`) and only comparable within
/// a single partition: a rebuild renumbers everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(i64);

impl CommunityId {
    /// Get the inner numeric value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CommunityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CommunityId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// A publication as seen by readers of the store.
///
/// `community` is `None` before the first partition rebuild and for
/// publications added since the last one. Citations may reference keys that
/// were never ingested themselves; those exist as placeholders without a
/// title or year until a later record fills them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub key: PubKey,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub community: Option<CommunityId>,
}

/// A parsed bibliographic record, as emitted by the external parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub key: PubKey,
    pub title: Option<String>,
    pub year: i32,
    pub authors: Vec<String>,
    pub citations: Vec<PubKey>,
    pub stream: Option<String>,
}

impl IngestRecord {
    /// Create a record with the required fields
    pub fn new(key: impl Into<PubKey>, title: Option<&str>, year: i32) -> Self {
        Self {
            key: key.into(),
            title: title.map(str::to_string),
            year,
            authors: Vec::new(),
            citations: Vec::new(),
            stream: None,
        }
    }

    /// Add authors
    pub fn with_authors(mut self, authors: &[&str]) -> Self {
        self.authors.extend(authors.iter().map(|a| a.to_string()));
        self
    }

    /// Add cited publication keys
    pub fn with_citations(mut self, citations: &[&str]) -> Self {
        self.citations.extend(citations.iter().map(|c| PubKey::from(*c)));
        self
    }

    /// Set the publication stream (journal/conference series)
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = Some(stream.into());
        self
    }
}
