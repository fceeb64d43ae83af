//! Background ingestion jobs
//!
//! The coordinator itself is synchronous; this module is the thin async
//! wrapper an out-of-scope web layer schedules and polls. Jobs move through
//! Pending → Progress → Success/Failure and carry a JSON info payload (the
//! ingest summary on success, the error string on failure).

use crate::ingest::{IngestionCoordinator, RawIngestSource};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Progress,
    Success,
    Failure,
}

/// Poll-able status of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub info: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Success | JobState::Failure)
    }
}

/// Registry of job statuses, shared between the runner and pollers.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: DashMap<JobId, JobStatus>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// Register a new pending job
    pub fn create(&self) -> JobId {
        let id = JobId::new();
        self.jobs.insert(
            id,
            JobStatus {
                state: JobState::Pending,
                info: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        id
    }

    /// Get a snapshot of a job's status
    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.get(id).map(|s| s.clone())
    }

    fn set_progress(&self, id: &JobId, info: serde_json::Value) {
        if let Some(mut status) = self.jobs.get_mut(id) {
            status.state = JobState::Progress;
            status.info = Some(info);
        }
    }

    fn finish(&self, id: &JobId, info: serde_json::Value) {
        if let Some(mut status) = self.jobs.get_mut(id) {
            status.state = JobState::Success;
            status.info = Some(info);
            status.finished_at = Some(Utc::now());
        }
    }

    fn fail(&self, id: &JobId, error: String) {
        if let Some(mut status) = self.jobs.get_mut(id) {
            status.state = JobState::Failure;
            status.info = Some(serde_json::json!({ "error": error }));
            status.finished_at = Some(Utc::now());
        }
    }
}

/// Fetch records from `source`, commit them to the graph, and run a full
/// ingestion on a blocking task. Returns immediately; poll the tracker.
///
/// Must be called from within a tokio runtime.
pub fn spawn_ingest(
    tracker: Arc<JobTracker>,
    source: Arc<dyn RawIngestSource>,
    coordinator: Arc<IngestionCoordinator>,
) -> JobId {
    let id = tracker.create();
    tokio::spawn(async move {
        tracker.set_progress(&id, serde_json::json!({ "stage": "fetching" }));
        let records = match source.fetch().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(job = %id, error = %e, "ingest source failed");
                tracker.fail(&id, e.to_string());
                return;
            }
        };
        tracker.set_progress(
            &id,
            serde_json::json!({ "stage": "ingesting", "records": records.len() }),
        );

        let worker = Arc::clone(&coordinator);
        let result = tokio::task::spawn_blocking(move || {
            let new_keys = worker.graph().apply_records(&records);
            worker.ingest_batch(&new_keys)
        })
        .await;

        match result {
            Ok(Ok(summary)) => {
                let info = serde_json::to_value(&summary)
                    .unwrap_or(serde_json::Value::Null);
                tracker.finish(&id, info);
            }
            Ok(Err(e)) => tracker.fail(&id, e.to_string()),
            Err(e) => tracker.fail(&id, e.to_string()),
        }
    });
    id
}
