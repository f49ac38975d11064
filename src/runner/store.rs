//! Caller-owned record of the latest run reports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::core::errors::Result;
use crate::runner::orchestrator::{RunReport, RunRequest, TestOrchestrator};

#[derive(Debug, Default)]
struct StoreState {
    latest: Option<Arc<RunReport>>,
    by_project: HashMap<PathBuf, Arc<RunReport>>,
}

/// Shared handle to the most recent report overall and per project root.
///
/// Clones share the same state. Only successful runs are recorded; a failed
/// run leaves the previous report in place.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<StoreState>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `report`, replacing the previous one for its project
    pub async fn record(&self, report: RunReport) -> Arc<RunReport> {
        let report = Arc::new(report);
        let mut state = self.inner.write().await;
        state
            .by_project
            .insert(report.project_root.clone(), Arc::clone(&report));
        state.latest = Some(Arc::clone(&report));
        debug!(
            project_root = %report.project_root.display(),
            projects = state.by_project.len(),
            "recorded run report"
        );
        report
    }

    /// The most recently recorded report
    pub async fn latest(&self) -> Option<Arc<RunReport>> {
        self.inner.read().await.latest.clone()
    }

    /// The most recent report for `project_root`
    pub async fn latest_for(&self, project_root: &Path) -> Option<Arc<RunReport>> {
        self.inner.read().await.by_project.get(project_root).cloned()
    }

    /// Project roots with a recorded report
    pub async fn projects(&self) -> Vec<PathBuf> {
        let mut projects: Vec<PathBuf> = self.inner.read().await.by_project.keys().cloned().collect();
        projects.sort();
        projects
    }

    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        state.latest = None;
        state.by_project.clear();
    }
}

impl TestOrchestrator {
    /// Run `request` and record a successful report in `store`
    pub async fn run_and_record(
        &self,
        store: &ResultStore,
        request: &RunRequest,
    ) -> Result<Arc<RunReport>> {
        let report = self.run(request).await?;
        Ok(store.record(report).await)
    }
}
