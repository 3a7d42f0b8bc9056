use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::transcoder::MergeProgress;

/// Latest byte counters of one stream. `total` stays 0 until the server tells us.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSample {
    pub downloaded: u64,
    pub total: u64,
}

impl ProgressSample {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.downloaded as f64 / self.total as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.downloaded >= self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => f.write_str("audio"),
            StreamKind::Video => f.write_str("video"),
        }
    }
}

/// A consistent copy of the session, taken under the lock.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub elapsed: Duration,
    pub audio: ProgressSample,
    pub video: ProgressSample,
    pub merge: MergeProgress,
}

#[derive(Debug)]
struct Tracker {
    audio: ProgressSample,
    video: ProgressSample,
    merge: MergeProgress,
    last_activity: Instant,
}

/// Progress of one download invocation, shared between the transfer tasks,
/// the progress reader and the renderer.
#[derive(Debug)]
pub struct DownloadSession {
    started: Instant,
    tracker: Mutex<Tracker>,
}

impl Default for DownloadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadSession {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            tracker: Mutex::new(Tracker {
                audio: ProgressSample::default(),
                video: ProgressSample::default(),
                merge: MergeProgress::default(),
                last_activity: now,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracker> {
        // every update replaces whole fields, so a poisoned tracker is still coherent
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, kind: StreamKind, sample: ProgressSample) {
        let mut tracker = self.lock();
        match kind {
            StreamKind::Audio => tracker.audio = sample,
            StreamKind::Video => tracker.video = sample,
        }
        tracker.last_activity = Instant::now();
    }

    pub fn record_merge(&self, progress: MergeProgress) {
        let mut tracker = self.lock();
        tracker.merge = progress;
        tracker.last_activity = Instant::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let tracker = self.lock();
        SessionSnapshot {
            elapsed: self.started.elapsed(),
            audio: tracker.audio,
            video: tracker.video,
            merge: tracker.merge.clone(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since the last recorded update of any kind.
    pub fn idle_for(&self) -> Duration {
        self.lock().last_activity.elapsed()
    }
}
