//! Background analysis jobs.
//!
//! A job owns an [`Analysis`] and evaluates all of its metric stages on the
//! tokio runtime. Results are written back into the job when evaluation
//! finishes, so readers always see a consistent analysis.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::analysis::Analysis;
use crate::distance::{DistanceMode, DistanceService};
use crate::domain::SequenceKind;
use crate::metrics::DrivingSource;

/// Status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    /// Created, evaluation not started.
    Pending,
    Evaluating,
    Completed,
    Failed,
    /// Stopped before evaluation finished.
    Cancelled,
}

impl AnalysisStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use last_mile_analyzer::service::AnalysisStatus;
    ///
    /// assert_eq!(AnalysisStatus::Evaluating.as_str(), "EVALUATING");
    /// assert_eq!(AnalysisStatus::Completed.as_str(), "COMPLETED");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Evaluating => "EVALUATING",
            AnalysisStatus::Completed => "COMPLETED",
            AnalysisStatus::Failed => "FAILED",
            AnalysisStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::Failed | AnalysisStatus::Cancelled
        )
    }
}

/// An analysis with its evaluation settings and state.
pub struct AnalysisJob {
    pub id: String,
    pub status: AnalysisStatus,
    pub analysis: Analysis,
    pub distance_mode: DistanceMode,
    pub sequence: SequenceKind,
    /// Message of the error that failed the evaluation.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    stop_signal: Option<oneshot::Sender<()>>,
}

impl AnalysisJob {
    pub fn new(
        id: String,
        analysis: Analysis,
        distance_mode: DistanceMode,
        sequence: SequenceKind,
    ) -> Self {
        Self {
            id,
            status: AnalysisStatus::Pending,
            analysis,
            distance_mode,
            sequence,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
            stop_signal: None,
        }
    }
}

/// Manages analysis jobs.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::demo_data::DemoDataset;
/// use last_mile_analyzer::distance::{DistanceMode, DistanceService};
/// use last_mile_analyzer::domain::SequenceKind;
/// use last_mile_analyzer::service::{AnalysisService, AnalysisStatus};
///
/// let service = AnalysisService::new(DistanceService::default());
/// let analysis = DemoDataset::Hartford.generate().unwrap().into_analysis().unwrap();
///
/// // Creating a job does not start the evaluation
/// let job = service.create_job("test-1".to_string(), analysis, DistanceMode::Haversine, SequenceKind::Actual);
/// assert_eq!(job.read().status, AnalysisStatus::Pending);
/// assert_eq!(service.list_jobs(), vec!["test-1".to_string()]);
/// ```
pub struct AnalysisService {
    jobs: RwLock<HashMap<String, Arc<RwLock<AnalysisJob>>>>,
    distances: Arc<DistanceService>,
}

impl AnalysisService {
    pub fn new(distances: DistanceService) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            distances: Arc::new(distances),
        }
    }

    pub fn distances(&self) -> &DistanceService {
        &self.distances
    }

    pub fn create_job(
        &self,
        id: String,
        analysis: Analysis,
        distance_mode: DistanceMode,
        sequence: SequenceKind,
    ) -> Arc<RwLock<AnalysisJob>> {
        let job = Arc::new(RwLock::new(AnalysisJob::new(
            id.clone(),
            analysis,
            distance_mode,
            sequence,
        )));
        self.jobs.write().insert(id, job.clone());
        job
    }

    pub fn get_job(&self, id: &str) -> Option<Arc<RwLock<AnalysisJob>>> {
        self.jobs.read().get(id).cloned()
    }

    /// Lists all job IDs, sorted.
    pub fn list_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn remove_job(&self, id: &str) -> Option<Arc<RwLock<AnalysisJob>>> {
        self.jobs.write().remove(id)
    }

    /// Starts evaluating a job in the background. Must be called from
    /// within a tokio runtime.
    pub fn start_evaluation(&self, job: Arc<RwLock<AnalysisJob>>) {
        let (tx, rx) = oneshot::channel();
        let (mut analysis, mode, kind, id) = {
            let mut guard = job.write();
            guard.status = AnalysisStatus::Evaluating;
            guard.stop_signal = Some(tx);
            (
                guard.analysis.clone(),
                guard.distance_mode,
                guard.sequence,
                guard.id.clone(),
            )
        };
        let distances = self.distances.clone();

        tokio::spawn(async move {
            info!(job = %id, routes = analysis.len(), %mode, sequence = %kind, "Evaluation started");
            let source = DrivingSource::Service {
                service: &distances,
                mode,
            };
            let outcome = tokio::select! {
                result = analysis.evaluate(kind, source) => Some(result),
                _ = rx => None,
            };

            let mut guard = job.write();
            match outcome {
                Some(Ok(())) => {
                    guard.analysis = analysis;
                    guard.status = AnalysisStatus::Completed;
                    info!(job = %id, "Evaluation completed");
                }
                Some(Err(e)) => {
                    warn!(job = %id, error = %e, "Evaluation failed");
                    guard.status = AnalysisStatus::Failed;
                    guard.error = Some(e.to_string());
                }
                None => {
                    info!(job = %id, "Evaluation cancelled");
                    guard.status = AnalysisStatus::Cancelled;
                }
            }
            guard.stop_signal = None;
            guard.finished_at = Some(Utc::now());
        });
    }

    /// Signals a running evaluation to stop. Returns false when the job is
    /// unknown or not running.
    pub fn stop_evaluation(&self, id: &str) -> bool {
        let Some(job) = self.get_job(id) else {
            return false;
        };
        let signal = job.write().stop_signal.take();
        match signal {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::DemoDataset;
    use std::time::Duration;

    async fn wait_until_finished(job: &Arc<RwLock<AnalysisJob>>) -> AnalysisStatus {
        for _ in 0..200 {
            let status = job.read().status;
            if status.is_finished() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        job.read().status
    }

    #[tokio::test]
    async fn test_haversine_evaluation_completes() {
        let service = AnalysisService::new(DistanceService::default());
        let analysis = DemoDataset::Hartford.generate().unwrap().into_analysis().unwrap();
        let job = service.create_job("h".into(), analysis, DistanceMode::Haversine, SequenceKind::Planned);

        service.start_evaluation(job.clone());
        assert_eq!(wait_until_finished(&job).await, AnalysisStatus::Completed);

        let guard = job.read();
        assert!(guard.finished_at.is_some());
        assert!(guard.error.is_none());
        let summary = guard.analysis.circuity_summary(SequenceKind::Planned).unwrap();
        assert_eq!(summary.evaluated_routes, 5);
        assert!((summary.mean - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_remove_and_stop_unknown() {
        let service = AnalysisService::new(DistanceService::default());
        assert!(!service.stop_evaluation("missing"));
        assert!(service.remove_job("missing").is_none());

        let analysis = DemoDataset::Firenze.generate().unwrap().into_analysis().unwrap();
        service.create_job("f".into(), analysis, DistanceMode::Haversine, SequenceKind::Actual);
        // Not started, nothing to stop
        assert!(!service.stop_evaluation("f"));
        assert!(service.remove_job("f").is_some());
        assert!(service.list_jobs().is_empty());
    }
}
