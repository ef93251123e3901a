//! Folder watching for automatic archive extraction
//!
//! This module ties the pipeline together:
//! - notify subscription on the input directory (non-recursive)
//! - startup scan of archives already present
//! - readiness check after a short grace period, then immediate extraction or parking
//! - a background loop re-checking parked files until they are ready, gone or expired
//!
//! # Example
//!
//! ```no_run
//! use auto_unpack::config::Config;
//! use auto_unpack::extraction::PasswordList;
//! use auto_unpack::folder_watcher::FolderWatcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let passwords = PasswordList::collect(&config.passwords, config.password_file.as_deref()).await;
//!
//! let mut watcher = FolderWatcher::new(config, passwords)?;
//! watcher.start()?;
//!
//! // Run the watcher (returns once the event channel closes)
//! watcher.run().await;
//! watcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extraction::{PasswordList, is_supported};
use crate::parking::{ParkResult, ParkingQueue, Verdict};
use crate::readiness::{Readiness, ReadinessDetector};
use crate::types::{Event, ExtractionOutcome, WatchedFile};
use crate::unpacker::Unpacker;
use chrono::Utc;
use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode,
    Watcher,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// What happened to a path handed to [`FolderWatcher::on_file_appeared`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Appearance {
    /// Not a supported archive, or not a regular file
    Ignored,
    /// Already waiting in the parking queue
    AlreadyParked,
    /// Another task is checking or extracting this path
    AlreadyClaimed,
    /// The file disappeared before it could be checked
    Vanished,
    /// Transfer still running (or file still empty); parked for later
    Parked,
    /// Extraction ran with this outcome
    Extracted(ExtractionOutcome),
}

/// Paths currently being checked or extracted
#[derive(Debug, Default)]
struct Claims(Mutex<HashSet<PathBuf>>);

impl Claims {
    fn try_claim(&self, path: &Path) -> Option<ClaimGuard<'_>> {
        let mut claimed = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if claimed.insert(path.to_path_buf()) {
            Some(ClaimGuard {
                claims: self,
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }
}

/// Releases the claim on drop
struct ClaimGuard<'a> {
    claims: &'a Claims,
    path: PathBuf,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.claims
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.path);
    }
}

/// State shared between the event loop, per-file tasks and the parking loop
struct WatchContext {
    detector: ReadinessDetector,
    parking: ParkingQueue,
    unpacker: Unpacker,
    claims: Claims,
    event_tx: broadcast::Sender<Event>,
}

impl WatchContext {
    async fn on_file_appeared(&self, path: &Path) -> Appearance {
        let Some(mut file) = WatchedFile::new(path) else {
            return Appearance::Ignored;
        };
        if path.is_dir() {
            return Appearance::Ignored;
        }

        if self.parking.contains(path) {
            debug!(?path, "file already parked");
            return Appearance::AlreadyParked;
        }

        let Some(_claim) = self.claims.try_claim(path) else {
            debug!(?path, "file already being processed");
            return Appearance::AlreadyClaimed;
        };

        info!(
            ?path,
            grace_ms = self.detector.grace_period().as_millis() as u64,
            "detected archive"
        );
        self.event_tx
            .send(Event::Detected {
                path: path.to_path_buf(),
            })
            .ok();

        match self.detector.detect(path).await {
            Readiness::Vanished => {
                debug!(?path, "file vanished before readiness check");
                Appearance::Vanished
            }
            Readiness::Ready { size } => {
                file.last_known_size = size;
                debug!(
                    ?path,
                    size = file.last_known_size,
                    archive_type = %file.archive_type,
                    waited_ms = (Utc::now() - file.detected_at).num_milliseconds(),
                    "file ready, extracting"
                );
                let outcome = self.unpacker.process(path).await;
                // a sweep that lost the claim race may have parked it again
                self.parking.unpark(path);
                Appearance::Extracted(outcome)
            }
            Readiness::Pending { companions } => {
                info!(?path, ?companions, "transfer still in progress, parking");
                self.park(path, companions)
            }
            Readiness::Empty => {
                info!(?path, "file is empty, parking until it grows");
                self.park(path, Vec::new())
            }
        }
    }

    fn park(&self, path: &Path, companions: Vec<PathBuf>) -> Appearance {
        match self.parking.park(path) {
            ParkResult::AlreadyParked => return Appearance::AlreadyParked,
            ParkResult::AdmittedWithEviction(evicted) => {
                self.event_tx.send(Event::Evicted { path: evicted }).ok();
            }
            ParkResult::Admitted => {}
        }

        self.event_tx
            .send(Event::Parked {
                path: path.to_path_buf(),
                companions,
            })
            .ok();
        Appearance::Parked
    }

    /// Extract a path the parking sweep found ready
    async fn dispatch_ready(&self, path: &Path) -> Option<ExtractionOutcome> {
        let Some(_claim) = self.claims.try_claim(path) else {
            // the task that parked it may still hold the claim; retry on the next sweep
            debug!(?path, "parked file still claimed, parking it again");
            if let ParkResult::AdmittedWithEviction(evicted) = self.parking.park(path) {
                self.event_tx.send(Event::Evicted { path: evicted }).ok();
            }
            return None;
        };

        info!(?path, "parked file is ready, extracting");
        Some(self.unpacker.process(path).await)
    }

    /// One parking cycle: classify every entry and act on the verdicts
    async fn sweep_once(self: &Arc<Self>, cycle: u64, progress_every: u64, tracker: &TaskTracker) {
        if self.parking.is_empty() {
            return;
        }

        let ctx = Arc::clone(self);
        let verdicts = match tokio::task::spawn_blocking(move || ctx.parking.sweep(&ctx.detector))
            .await
        {
            Ok(verdicts) => verdicts,
            Err(e) => {
                error!(error = %e, "parking sweep panicked");
                return;
            }
        };

        let log_progress = progress_every > 0 && cycle % progress_every == 0;

        for (path, verdict) in verdicts {
            match verdict {
                Verdict::Ready => {
                    let ctx = Arc::clone(self);
                    tracker.spawn(async move {
                        ctx.dispatch_ready(&path).await;
                    });
                }
                Verdict::Expired(parked_for) => {
                    warn!(
                        ?path,
                        parked_secs = parked_for.as_secs(),
                        "gave up waiting for transfer to finish, file left in place"
                    );
                    self.event_tx.send(Event::Expired { path, parked_for }).ok();
                }
                Verdict::Vanished => {
                    debug!(?path, "parked file vanished");
                }
                Verdict::Waiting(age) if log_progress => {
                    info!(
                        ?path,
                        parked_secs = age.as_secs(),
                        "still waiting for transfer to finish"
                    );
                }
                Verdict::Waiting(_) => {}
            }
        }
    }
}

/// Watches the input directory and extracts archives once their transfer completes
pub struct FolderWatcher {
    /// Filesystem watcher instance
    watcher: RecommendedWatcher,

    /// Channel for receiving filesystem events
    rx: mpsc::UnboundedReceiver<notify::Result<NotifyEvent>>,

    /// Pipeline state shared with spawned tasks
    ctx: Arc<WatchContext>,

    config: Config,

    /// Stops the event loop and the parking loop
    cancel_token: CancellationToken,

    /// Per-file tasks and the parking loop
    tracker: TaskTracker,
}

impl FolderWatcher {
    /// Create a new folder watcher
    ///
    /// Validates `config` and creates the output directory.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the output directory cannot be
    /// created or the filesystem watcher cannot be initialized
    pub fn new(config: Config, passwords: PasswordList) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            Error::FolderWatch(format!(
                "Failed to create output directory {}: {}",
                config.output_dir.display(),
                e
            ))
        })?;

        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to send filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        let (event_tx, _) = broadcast::channel(1000);

        info!(
            password_count = passwords.len(),
            output_dir = ?config.output_dir,
            "folder watcher initialised"
        );

        let ctx = Arc::new(WatchContext {
            detector: ReadinessDetector::new(&config.readiness),
            parking: ParkingQueue::new(&config.parking),
            unpacker: Unpacker::new(config.output_dir.clone(), passwords, event_tx.clone()),
            claims: Claims::default(),
            event_tx,
        });

        Ok(Self {
            watcher,
            rx,
            ctx,
            config,
            cancel_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.event_tx.subscribe()
    }

    /// Parked files, for inspection
    pub fn parking(&self) -> &ParkingQueue {
        &self.ctx.parking
    }

    /// Start watching the input directory
    ///
    /// Creates the directory if needed, subscribes to it, starts the parking loop and
    /// schedules every archive already present.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created, watched or listed
    pub fn start(&mut self) -> Result<()> {
        let input_dir = self.config.input_dir.clone();

        if !input_dir.exists() {
            std::fs::create_dir_all(&input_dir).map_err(|e| {
                Error::FolderWatch(format!("Failed to create input directory: {}", e))
            })?;
            info!("Created input directory: {}", input_dir.display());
        }

        self.watcher
            .watch(&input_dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::FolderWatch(format!("Failed to watch folder: {}", e)))?;
        info!("Watching folder: {}", input_dir.display());

        self.spawn_parking_loop();

        let scheduled = self.scan_existing()?;
        if scheduled > 0 {
            info!(count = scheduled, "scheduled {} existing archive(s)", scheduled);
        }

        Ok(())
    }

    fn spawn_parking_loop(&self) {
        let ctx = Arc::clone(&self.ctx);
        let cancel_token = self.cancel_token.clone();
        let tracker = self.tracker.clone();
        let check_interval = self.config.parking.check_interval;
        let progress_every = self.config.parking.progress_log_every;

        self.tracker.spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut cycle: u64 = 0;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cycle += 1;
                        ctx.sweep_once(cycle, progress_every, &tracker).await;
                    }
                    _ = cancel_token.cancelled() => {
                        break;
                    }
                }
            }

            debug!("parking loop stopped");
        });
    }

    /// Schedule every supported archive already in the input directory
    ///
    /// Returns the number of archives scheduled.
    pub fn scan_existing(&self) -> Result<usize> {
        let entries = std::fs::read_dir(&self.config.input_dir).map_err(|e| {
            Error::FolderWatch(format!("Failed to scan input directory: {}", e))
        })?;

        let mut scheduled = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read directory entry during scan");
                    continue;
                }
            };
            let path = entry.path();

            if path.is_file() && is_supported(&path) {
                self.dispatch(path);
                scheduled += 1;
            }
        }

        Ok(scheduled)
    }

    /// Handle one path that appeared in the input directory
    ///
    /// Waits the readiness grace period, then extracts or parks the file. Returns once
    /// that decision (and any extraction) is done.
    pub async fn on_file_appeared(&self, path: &Path) -> Appearance {
        self.ctx.on_file_appeared(path).await
    }

    fn dispatch(&self, path: PathBuf) {
        let ctx = Arc::clone(&self.ctx);
        self.tracker.spawn(async move {
            ctx.on_file_appeared(&path).await;
        });
    }

    /// Run the folder watcher event loop
    ///
    /// Returns when the watcher is cancelled or the event channel closes.
    pub async fn run(&mut self) {
        info!("Folder watcher started");

        loop {
            tokio::select! {
                result = self.rx.recv() => {
                    match result {
                        Some(Ok(event)) => {
                            self.handle_event(event);
                        }
                        Some(Err(e)) => {
                            error!("Filesystem watcher error: {}", e);
                        }
                        None => break,
                    }
                }
                _ = self.cancel_token.cancelled() => {
                    break;
                }
            }
        }

        info!("Folder watcher event loop stopped");
    }

    /// Route a filesystem event, returning how many paths were scheduled
    ///
    /// Creation and rename-into-place events are handled; everything else (writes,
    /// removals, metadata changes) is ignored.
    fn handle_event(&self, event: NotifyEvent) -> usize {
        let paths: Vec<PathBuf> = match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths
            }
            // paths = [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.into_iter().last().into_iter().collect()
            }
            _ => return 0,
        };

        let mut scheduled = 0;
        for path in paths {
            if is_supported(&path) {
                self.dispatch(path);
                scheduled += 1;
            }
        }
        scheduled
    }

    /// Stop the watcher
    ///
    /// Cancels the parking loop at its next wait, drops the filesystem subscription and
    /// waits up to `shutdown_grace` for in-flight extractions.
    pub async fn shutdown(self) {
        info!("Shutting down folder watcher");

        self.cancel_token.cancel();
        // Dropping the watcher stops watching
        drop(self.watcher);
        self.tracker.close();

        match tokio::time::timeout(self.config.shutdown_grace, self.tracker.wait()).await {
            Ok(()) => info!("All in-flight tasks finished"),
            Err(_) => warn!(
                remaining = self.tracker.len(),
                "Timeout waiting for in-flight extractions to finish"
            ),
        }

        self.ctx.event_tx.send(Event::Shutdown).ok();
        info!("Folder watcher stopped");
    }
}
