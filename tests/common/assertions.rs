//! Waiting helpers for scenario tests

use auto_unpack::Event;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Wait until `predicate` matches an event, returning that event
///
/// Returns `None` on timeout or when the channel closes.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Option<Event>
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Whether `event` is the completion of `path`
pub fn is_completion_of(event: &Event, path: &Path) -> bool {
    matches!(event, Event::Completed { path: p, .. } if p == path)
}

/// Count completions of `path` still queued on the receiver
pub fn drain_completions(events: &mut broadcast::Receiver<Event>, path: &Path) -> usize {
    let mut count = 0;
    while let Ok(event) = events.try_recv() {
        if is_completion_of(&event, path) {
            count += 1;
        }
    }
    count
}
