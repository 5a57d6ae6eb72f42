//! Background video jobs
//!
//! `enqueue` records a queued job and returns its id immediately; a tokio
//! task then runs the video analyzer under a concurrency limit and a timeout.
//! The analyzer itself runs in a child task, so a panicking model still ends
//! the job in `error`.
//! Every state change builds a complete new [`VideoJob`] and swaps it into the
//! table under one write lock, so a status read always sees a whole record.
//! Jobs are kept for the life of the process.

use crate::media::VideoAnalyzer;
use biaslab_core::MediaVerdict;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Video job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// Whether the job has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// Snapshot of one video job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub job_id: Uuid,

    pub status: JobStatus,

    /// Present once the job is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MediaVerdict>,

    /// Present once the job has failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub submitted_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VideoJob {
    fn queued(job_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Queued,
            result: None,
            error: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    fn running(&self) -> Self {
        Self {
            status: JobStatus::Running,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    fn done(&self, verdict: MediaVerdict) -> Self {
        Self {
            status: JobStatus::Done,
            result: Some(verdict),
            error: None,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    fn failed(&self, message: String) -> Self {
        Self {
            status: JobStatus::Error,
            result: None,
            error: Some(message),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Owns the job table and runs video analysis in the background
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<RwLock<HashMap<Uuid, VideoJob>>>,
    analyzer: Arc<VideoAnalyzer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl JobManager {
    /// Create a manager running at most `max_concurrent` analyses at a time
    pub fn new(analyzer: VideoAnalyzer, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            analyzer: Arc::new(analyzer),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// Queue a video for analysis and return its id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, bytes: Vec<u8>) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.write().insert(job_id, VideoJob::queued(job_id));
        metrics::counter!("biaslab_video_jobs_total", "status" => "queued").increment(1);
        info!(%job_id, bytes = bytes.len(), "Video job queued");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run(job_id, bytes).await;
        });

        job_id
    }

    /// Current snapshot of a job, or `None` for an unknown id
    pub fn status(&self, job_id: &Uuid) -> Option<VideoJob> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Number of jobs ever submitted
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    async fn run(&self, job_id: Uuid, bytes: Vec<u8>) {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.transition(job_id, |job| job.failed("job queue is closed".to_string()));
                return;
            }
        };

        self.transition(job_id, VideoJob::running);
        debug!(%job_id, "Video job running");

        let analyzer = Arc::clone(&self.analyzer);
        let analysis = tokio::spawn(async move { analyzer.analyze(&bytes).await });
        let abort = analysis.abort_handle();

        match tokio::time::timeout(self.timeout, analysis).await {
            Ok(Ok(Ok(verdict))) => {
                info!(%job_id, label = %verdict.label, "Video job done");
                self.transition(job_id, |job| job.done(verdict));
            }
            Ok(Ok(Err(e))) => {
                warn!(%job_id, error = %e, "Video job failed");
                self.transition(job_id, |job| job.failed(e.to_string()));
            }
            Ok(Err(e)) => {
                let message = if e.is_panic() {
                    "video analysis panicked".to_string()
                } else {
                    format!("video analysis was cancelled: {e}")
                };
                warn!(%job_id, "{message}");
                self.transition(job_id, |job| job.failed(message));
            }
            Err(_) => {
                abort.abort();
                let message = format!(
                    "video analysis timed out after {}s",
                    self.timeout.as_secs()
                );
                warn!(%job_id, "{message}");
                self.transition(job_id, |job| job.failed(message));
            }
        }
    }

    /// Replace a job record in one write
    fn transition(&self, job_id: Uuid, next: impl FnOnce(&VideoJob) -> VideoJob) {
        let mut jobs = self.jobs.write();
        if let Some(current) = jobs.get(&job_id) {
            let updated = next(current);
            metrics::counter!("biaslab_video_jobs_total", "status" => updated.status.as_str())
                .increment(1);
            jobs.insert(job_id, updated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaScorer, UnavailableScorer};
    use async_trait::async_trait;
    use biaslab_core::Result;

    struct FixedScorer(f64);

    #[async_trait]
    impl MediaScorer for FixedScorer {
        async fn score(&self, _bytes: &[u8]) -> Result<f64> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct SlowScorer(Duration);

    #[async_trait]
    impl MediaScorer for SlowScorer {
        async fn score(&self, _bytes: &[u8]) -> Result<f64> {
            tokio::time::sleep(self.0).await;
            Ok(0.9)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct PanickingScorer;

    #[async_trait]
    impl MediaScorer for PanickingScorer {
        async fn score(&self, _bytes: &[u8]) -> Result<f64> {
            panic!("decoder crashed");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    fn manager(scorer: impl MediaScorer + 'static, max_concurrent: usize, timeout: Duration) -> JobManager {
        JobManager::new(VideoAnalyzer::new(Arc::new(scorer)), max_concurrent, timeout)
    }

    async fn wait_for_terminal(manager: &JobManager, job_id: &Uuid) -> VideoJob {
        loop {
            let job = manager.status(job_id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[test]
    fn test_unknown_job_is_none() {
        let manager = manager(FixedScorer(0.5), 1, Duration::from_secs(1));
        assert!(manager.status(&Uuid::new_v4()).is_none());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_job_completes() {
        let manager = manager(FixedScorer(0.8), 2, Duration::from_secs(5));
        let job_id = manager.enqueue(b"video".to_vec());

        let job = wait_for_terminal(&manager, &job_id).await;
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.job_id, job_id);
        let verdict = job.result.unwrap();
        assert_eq!(verdict.label, "deepfake");
        assert!((verdict.score - 0.8).abs() < 1e-12);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_scorer_failure_marks_job_error() {
        let manager = manager(UnavailableScorer::new("video"), 1, Duration::from_secs(5));
        let job_id = manager.enqueue(b"video".to_vec());

        let job = wait_for_terminal(&manager, &job_id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.result.is_none());
        assert_eq!(
            job.error.as_deref(),
            Some("media error: video model is not configured")
        );
    }

    #[tokio::test]
    async fn test_scorer_panic_marks_job_error() {
        let manager = manager(PanickingScorer, 1, Duration::from_secs(5));
        let job_id = manager.enqueue(b"video".to_vec());

        let job = wait_for_terminal(&manager, &job_id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.result.is_none());
        assert_eq!(job.error.as_deref(), Some("video analysis panicked"));

        // The permit was released, so later jobs still run
        let next = manager.enqueue(b"video".to_vec());
        assert_eq!(
            wait_for_terminal(&manager, &next).await.status,
            JobStatus::Error
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_job_error() {
        let manager = manager(SlowScorer(Duration::from_secs(600)), 1, Duration::from_secs(300));
        let job_id = manager.enqueue(b"video".to_vec());

        let job = wait_for_terminal(&manager, &job_id).await;
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(
            job.error.as_deref(),
            Some("video analysis timed out after 300s")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit_keeps_second_job_queued() {
        let manager = manager(SlowScorer(Duration::from_secs(10)), 1, Duration::from_secs(60));
        let first = manager.enqueue(b"one".to_vec());
        let second = manager.enqueue(b"two".to_vec());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let statuses = [
            manager.status(&first).unwrap().status,
            manager.status(&second).unwrap().status,
        ];
        assert!(statuses.contains(&JobStatus::Running));
        assert!(statuses.contains(&JobStatus::Queued));

        wait_for_terminal(&manager, &first).await;
        let last = wait_for_terminal(&manager, &second).await;
        assert_eq!(last.status, JobStatus::Done);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_job_serialization_omits_missing_fields() {
        let job = VideoJob::queued(Uuid::nil());
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "queued");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }
}
