//! Web一括処理のジョブ状態
//!
//! プロセス内で同時に走るバッチは1つだけ。
//! `idle → processing → {complete, error} → idle`
//!
//! 状態は1つの Mutex で守り、ステータス取得はスナップショットを返すだけで
//! ジョブの完了を待たない。処理中の `start` / `reset` は即座に拒否する。

use crate::error::{RenamerError, Result};
use artifact_renamer_common::BatchResult;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Processing,
    Complete,
    Error,
}

/// `/api/status` の応答
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub results: Option<BatchResult>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    progress: u8,
    message: String,
    results: Option<BatchResult>,
    /// start のたびに増える。古いハンドルからの書き込みを弾く
    generation: u64,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::Idle,
            progress: 0,
            message: "Ready".into(),
            results: None,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobStatusTracker {
    state: Arc<Mutex<JobState>>,
}

impl JobStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 新しいジョブを開始する（処理中なら ConcurrentJobConflict）
    pub fn start(&self, message: &str) -> Result<JobHandle> {
        let mut state = self.lock();
        if state.status == JobStatus::Processing {
            return Err(RenamerError::ConcurrentJobConflict);
        }

        state.generation += 1;
        state.status = JobStatus::Processing;
        state.progress = 0;
        state.message = message.to_string();
        state.results = None;
        debug!("Job {} started", state.generation);

        Ok(JobHandle {
            tracker: self.clone(),
            generation: state.generation,
        })
    }

    pub fn status(&self) -> JobSnapshot {
        let state = self.lock();
        JobSnapshot {
            status: state.status,
            progress: state.progress,
            message: state.message.clone(),
            results: state.results.clone(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.lock().status == JobStatus::Processing
    }

    /// 終了済みのジョブを片付けて idle に戻す
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        if state.status == JobStatus::Processing {
            return Err(RenamerError::ConcurrentJobConflict);
        }

        let generation = state.generation;
        *state = JobState {
            generation,
            ..JobState::default()
        };
        Ok(())
    }

    fn update<F>(&self, generation: u64, apply: F)
    where
        F: FnOnce(&mut JobState),
    {
        let mut state = self.lock();
        if state.generation != generation || state.status != JobStatus::Processing {
            warn!("Ignoring update from finished job {}", generation);
            return;
        }
        apply(&mut state);
    }
}

/// 実行中ジョブへの書き込み口（ワーカーが持つ）
#[derive(Debug, Clone)]
pub struct JobHandle {
    tracker: JobStatusTracker,
    generation: u64,
}

impl JobHandle {
    /// 進捗は減らない（並列ワーカーの通知順が前後しても戻らない）
    pub fn update_progress(&self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        self.tracker.update(self.generation, |state| {
            state.progress = state.progress.max(percent.min(100));
            state.message = message;
        });
    }

    pub fn complete(&self, results: BatchResult, message: impl Into<String>) {
        let message = message.into();
        self.tracker.update(self.generation, |state| {
            state.status = JobStatus::Complete;
            state.progress = 100;
            state.message = message;
            state.results = Some(results);
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.tracker.update(self.generation, |state| {
            state.status = JobStatus::Error;
            state.message = message;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifact_renamer_common::FileOutcome;
    use std::sync::Barrier;

    #[test]
    fn test_initial_state_is_idle() {
        let tracker = JobStatusTracker::new();
        let snapshot = tracker.status();
        assert_eq!(snapshot.status, JobStatus::Idle);
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.results.is_none());
    }

    #[test]
    fn test_lifecycle() {
        let tracker = JobStatusTracker::new();
        let job = tracker.start("Starting...").unwrap();
        assert_eq!(tracker.status().status, JobStatus::Processing);

        job.update_progress(50, "Processing 1/2");
        assert_eq!(tracker.status().progress, 50);
        assert_eq!(tracker.status().message, "Processing 1/2");

        let results: BatchResult = vec![FileOutcome::succeeded("a.jpg", "ok")]
            .into_iter()
            .collect();
        job.complete(results, "Completed! Processed 1 of 1 photos");

        let snapshot = tracker.status();
        assert_eq!(snapshot.status, JobStatus::Complete);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.results.unwrap().success(), 1);

        tracker.reset().unwrap();
        assert_eq!(tracker.status().status, JobStatus::Idle);
    }

    #[test]
    fn test_progress_never_goes_back() {
        let tracker = JobStatusTracker::new();
        let job = tracker.start("first").unwrap();
        job.update_progress(70, "Processing 3/4");
        job.update_progress(50, "Processing 2/4");

        let snapshot = tracker.status();
        assert_eq!(snapshot.progress, 70);
        assert_eq!(snapshot.message, "Processing 2/4");
    }

    #[test]
    fn test_start_while_processing_is_rejected() {
        let tracker = JobStatusTracker::new();
        let job = tracker.start("first").unwrap();
        job.update_progress(30, "working");

        assert!(matches!(
            tracker.start("second"),
            Err(RenamerError::ConcurrentJobConflict)
        ));
        // 最初のジョブは影響を受けない
        let snapshot = tracker.status();
        assert_eq!(snapshot.progress, 30);
        assert_eq!(snapshot.message, "working");
    }

    #[test]
    fn test_reset_while_processing_is_rejected() {
        let tracker = JobStatusTracker::new();
        let _job = tracker.start("first").unwrap();
        assert!(matches!(
            tracker.reset(),
            Err(RenamerError::ConcurrentJobConflict)
        ));
        assert!(tracker.is_processing());
    }

    #[test]
    fn test_error_state_can_restart() {
        let tracker = JobStatusTracker::new();
        tracker.start("first").unwrap().fail("Error: disk full");
        assert_eq!(tracker.status().status, JobStatus::Error);
        assert!(tracker.start("second").is_ok());
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let tracker = JobStatusTracker::new();
        let old = tracker.start("first").unwrap();
        old.fail("boom");
        tracker.reset().unwrap();

        let _new = tracker.start("second").unwrap();
        old.update_progress(99, "stale");

        let snapshot = tracker.status();
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.message, "second");
    }

    #[test]
    fn test_concurrent_start_exactly_one_wins() {
        let tracker = JobStatusTracker::new();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    tracker.start("race").is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
