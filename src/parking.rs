//! Parking queue for archives whose transfer is still running
//!
//! Parked paths are re-checked by the watcher's background loop through
//! [`ParkingQueue::sweep`]. The queue is bounded: admitting into a full queue evicts the
//! entry parked longest ago.

use crate::config::ParkingConfig;
use crate::readiness::{Readiness, ReadinessDetector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of [`ParkingQueue::park`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParkResult {
    /// The path is now parked
    Admitted,
    /// The path was already parked; its park time is unchanged
    AlreadyParked,
    /// The path is now parked and the oldest entry was dropped to make room
    AdmittedWithEviction(PathBuf),
}

/// Per-entry result of one sweep
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Transfer finished; the entry was unparked and should be extracted
    Ready,
    /// Residency timeout exceeded; the entry was unparked and the file is left alone
    Expired(Duration),
    /// The file is gone; the entry was unparked
    Vanished,
    /// Still in transfer (or still empty); stays parked. Carries the residency age.
    Waiting(Duration),
}

#[derive(Clone, Copy, Debug)]
struct ParkedEntry {
    parked_at: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<PathBuf, ParkedEntry>,
    next_seq: u64,
}

/// Bounded, time-ordered holding area for not-yet-ready archives
#[derive(Debug)]
pub struct ParkingQueue {
    inner: Mutex<Inner>,
    max_entries: usize,
    max_residency: Duration,
}

impl ParkingQueue {
    /// Create an empty queue
    pub fn new(config: &ParkingConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: config.max_entries.max(1),
            max_residency: config.max_residency,
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a poisoned
    // lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Park `path`, evicting the oldest entry when the queue is full
    pub fn park(&self, path: &Path) -> ParkResult {
        let mut inner = self.lock();

        if inner.entries.contains_key(path) {
            return ParkResult::AlreadyParked;
        }

        let mut evicted = None;
        if inner.entries.len() >= self.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.parked_at, entry.seq))
                .map(|(path, _)| path.clone());

            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                warn!(
                    evicted = ?oldest,
                    capacity = self.max_entries,
                    "parking queue full, evicting oldest entry"
                );
                evicted = Some(oldest);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            path.to_path_buf(),
            ParkedEntry {
                parked_at: Instant::now(),
                seq,
            },
        );
        debug!(?path, parked = inner.entries.len(), "parked file");

        match evicted {
            Some(evicted) => ParkResult::AdmittedWithEviction(evicted),
            None => ParkResult::Admitted,
        }
    }

    /// Stop tracking `path`; returns whether it was parked
    pub fn unpark(&self, path: &Path) -> bool {
        self.lock().entries.remove(path).is_some()
    }

    /// Whether `path` is parked
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    /// Number of parked entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing is parked
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Parked paths with their residency age, oldest first
    pub fn snapshot(&self) -> Vec<(PathBuf, Duration)> {
        self.ordered()
            .into_iter()
            .map(|(path, entry)| (path, entry.parked_at.elapsed()))
            .collect()
    }

    fn ordered(&self) -> Vec<(PathBuf, ParkedEntry)> {
        let mut entries: Vec<_> = self
            .lock()
            .entries
            .iter()
            .map(|(path, entry)| (path.clone(), *entry))
            .collect();
        entries.sort_by_key(|(_, entry)| (entry.parked_at, entry.seq));
        entries
    }

    /// Remove `path` only if it is still the same admission
    fn remove_if_current(&self, path: &Path, seq: u64) -> bool {
        let mut inner = self.lock();
        match inner.entries.get(path) {
            Some(entry) if entry.seq == seq => {
                inner.entries.remove(path);
                true
            }
            _ => false,
        }
    }

    /// Re-check every parked entry once, oldest first
    ///
    /// Entries judged `Ready`, `Expired` or `Vanished` are unparked before this returns,
    /// so each `Ready` path is handed to exactly one caller. Filesystem checks run
    /// without holding the lock.
    pub fn sweep(&self, detector: &ReadinessDetector) -> Vec<(PathBuf, Verdict)> {
        let mut verdicts = Vec::new();

        for (path, entry) in self.ordered() {
            let age = entry.parked_at.elapsed();
            let readiness = detector.inspect(&path);

            let verdict = if readiness == Readiness::Vanished {
                Verdict::Vanished
            } else if age > self.max_residency {
                Verdict::Expired(age)
            } else if readiness.is_ready() {
                Verdict::Ready
            } else {
                verdicts.push((path, Verdict::Waiting(age)));
                continue;
            };

            // Unparked or re-parked concurrently: someone else owns it now
            if self.remove_if_current(&path, entry.seq) {
                verdicts.push((path, verdict));
            }
        }

        verdicts
    }
}
