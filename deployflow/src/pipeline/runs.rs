//! Run identity and the in-flight run registry.

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::stage::StageKind;

/// Identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The wrapped UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Entry in the registry.
#[derive(Debug)]
struct RunRecord {
    cancel: CancelToken,
    stage: Option<StageKind>,
    started_at: DateTime<Utc>,
}

/// A point-in-time view of one in-flight run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// The run's id.
    pub run_id: RunId,
    /// The stage the run is currently executing, if any has started.
    pub stage: Option<StageKind>,
    /// When the run was registered (UTC).
    pub started_at: DateTime<Utc>,
}

/// Registry of in-flight pipeline runs.
///
/// Each entry pairs the run's cancellation token with a coarse stage
/// cursor so a host can enumerate or abort runs. The registry holds no
/// cloud state; a removed entry says nothing about what the backend did.
#[derive(Debug, Default)]
pub struct ActiveRuns {
    runs: DashMap<RunId, RunRecord>,
}

impl ActiveRuns {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run, keeping a handle on its cancellation token.
    pub fn register(&self, run_id: RunId, cancel: CancelToken) {
        self.runs.insert(
            run_id,
            RunRecord {
                cancel,
                stage: None,
                started_at: Utc::now(),
            },
        );
    }

    /// Moves a run's stage cursor. Unknown ids are ignored.
    pub fn advance(&self, run_id: RunId, stage: StageKind) {
        if let Some(mut entry) = self.runs.get_mut(&run_id) {
            entry.stage = Some(stage);
        }
    }

    /// Removes a finished run.
    pub fn finish(&self, run_id: RunId) {
        self.runs.remove(&run_id);
    }

    /// Requests cancellation of a registered run.
    ///
    /// Returns false when the run is unknown (already finished or never
    /// registered). The entry stays until the run observes the token and
    /// winds down.
    pub fn cancel(&self, run_id: RunId, reason: impl Into<String>) -> bool {
        match self.runs.get(&run_id) {
            Some(entry) => {
                entry.cancel.cancel(reason);
                true
            }
            None => false,
        }
    }

    /// A snapshot of one run, if it is in flight.
    #[must_use]
    pub fn snapshot(&self, run_id: RunId) -> Option<RunSnapshot> {
        self.runs.get(&run_id).map(|entry| RunSnapshot {
            run_id,
            stage: entry.stage,
            started_at: entry.started_at,
        })
    }

    /// Snapshots of every in-flight run, in no particular order.
    #[must_use]
    pub fn list(&self) -> Vec<RunSnapshot> {
        self.runs
            .iter()
            .map(|entry| RunSnapshot {
                run_id: *entry.key(),
                stage: entry.stage,
                started_at: entry.started_at,
            })
            .collect()
    }

    /// Number of in-flight runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true when no runs are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_run_id_serializes_as_string() {
        let id = RunId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json.as_str(), Some(id.to_string().as_str()));
    }

    #[test]
    fn test_register_and_snapshot() {
        let runs = ActiveRuns::new();
        let id = RunId::new();
        assert!(runs.is_empty());

        runs.register(id, CancelToken::new());
        assert_eq!(runs.len(), 1);

        let snapshot = runs.snapshot(id).unwrap();
        assert_eq!(snapshot.run_id, id);
        assert_eq!(snapshot.stage, None);
    }

    #[test]
    fn test_advance_moves_cursor() {
        let runs = ActiveRuns::new();
        let id = RunId::new();
        runs.register(id, CancelToken::new());

        runs.advance(id, StageKind::Proxy);
        assert_eq!(runs.snapshot(id).unwrap().stage, Some(StageKind::Proxy));

        runs.advance(id, StageKind::Consumer);
        assert_eq!(runs.snapshot(id).unwrap().stage, Some(StageKind::Consumer));
    }

    #[test]
    fn test_cancel_fires_registered_token() {
        let runs = ActiveRuns::new();
        let id = RunId::new();
        let token = CancelToken::new();
        runs.register(id, token.clone());

        assert!(runs.cancel(id, "operator abort"));
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("operator abort".to_string()));

        // Entry is kept until the run itself finishes
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_cancel_unknown_run() {
        let runs = ActiveRuns::new();
        assert!(!runs.cancel(RunId::new(), "nothing to abort"));
    }

    #[test]
    fn test_finish_removes_entry() {
        let runs = ActiveRuns::new();
        let id = RunId::new();
        runs.register(id, CancelToken::new());
        runs.finish(id);

        assert!(runs.is_empty());
        assert!(runs.snapshot(id).is_none());
    }

    #[test]
    fn test_list_covers_all_runs() {
        let runs = ActiveRuns::new();
        let a = RunId::new();
        let b = RunId::new();
        runs.register(a, CancelToken::new());
        runs.register(b, CancelToken::new());

        let mut listed: Vec<RunId> = runs.list().into_iter().map(|s| s.run_id).collect();
        listed.sort_by_key(RunId::to_string);
        let mut expected = vec![a, b];
        expected.sort_by_key(RunId::to_string);
        assert_eq!(listed, expected);
    }
}
