//! Debounced room watcher
//!
//! Consumes a room's change notices and keeps one client's view fresh.
//! Notices arriving in a burst (a reorder of five stories fires five of
//! them) are coalesced with a trailing-edge timer: each notice re-arms the
//! deadline, and a single snapshot refetch runs once the stream has been
//! quiet for the window. Without this, N changes would trigger N redundant
//! full-room reads.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use pokerplan_core::{RoomCode, RoomSnapshot};

use crate::error::{Result, SyncError};
use crate::protocol::{ChangeNotice, RoomEvent};

/// Buffered events between the watch task and its consumer.
const EVENT_BUFFER: usize = 16;

/// A running watch over one room subscription.
///
/// Dropping the watcher stops the background task.
pub struct RoomWatcher {
    events: mpsc::Receiver<RoomEvent>,
    task: JoinHandle<()>,
}

impl RoomWatcher {
    /// Spawn a watcher over a notice subscription.
    ///
    /// `participant` is the locally-known identity; when a refetched roster
    /// no longer contains it, a single [`RoomEvent::Kicked`] is emitted and
    /// the identity is cleared so a rejoin is required. `fetch` loads the
    /// full room snapshot - the watcher never trusts notice payloads.
    pub fn spawn<F, Fut>(
        code: RoomCode,
        participant: Option<String>,
        notices: broadcast::Receiver<ChangeNotice>,
        window: Duration,
        fetch: F,
    ) -> Self
    where
        F: Fn(RoomCode) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = pokerplan_core::Result<RoomSnapshot>> + Send + 'static,
    {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(watch(code, participant, notices, window, fetch, events));
        Self {
            events: receiver,
            task,
        }
    }

    /// Next event, or [`SyncError::StreamClosed`] once the watch has ended.
    pub async fn recv(&mut self) -> Result<RoomEvent> {
        self.events.recv().await.ok_or(SyncError::StreamClosed)
    }
}

impl Drop for RoomWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn watch<F, Fut>(
    code: RoomCode,
    mut participant: Option<String>,
    mut notices: broadcast::Receiver<ChangeNotice>,
    window: Duration,
    fetch: F,
    events: mpsc::Sender<RoomEvent>,
) where
    F: Fn(RoomCode) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = pokerplan_core::Result<RoomSnapshot>> + Send,
{
    // Initial fetch so the consumer renders without waiting for a change
    if !refetch(&code, &mut participant, &fetch, &events).await {
        return;
    }

    let mut deadline: Option<Instant> = None;
    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    debug!(code = %code, entity = ?notice.entity, "Change notice, re-arming debounce");
                    deadline = Some(Instant::now() + window);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Old notices are interchangeable; one refetch catches up
                    warn!(code = %code, missed, "Notice stream lagged");
                    deadline = Some(Instant::now() + window);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = events.send(RoomEvent::Closed).await;
                    break;
                }
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if !refetch(&code, &mut participant, &fetch, &events).await {
                    break;
                }
            }
        }
    }
}

/// Fetch a snapshot and forward it. Returns false when the consumer is gone.
async fn refetch<F, Fut>(
    code: &RoomCode,
    participant: &mut Option<String>,
    fetch: &F,
    events: &mpsc::Sender<RoomEvent>,
) -> bool
where
    F: Fn(RoomCode) -> Fut,
    Fut: Future<Output = pokerplan_core::Result<RoomSnapshot>>,
{
    match fetch(code.clone()).await {
        Ok(snapshot) => {
            if let Some(name) = participant.as_deref() {
                if !snapshot.contains_participant(name) {
                    *participant = None;
                    if events.send(RoomEvent::Kicked).await.is_err() {
                        return false;
                    }
                }
            }
            events.send(RoomEvent::Snapshot(snapshot)).await.is_ok()
        }
        Err(err) => {
            // Transient failures are not surfaced; the next notice retries
            warn!(code = %code, error = %err, "Room refetch failed");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use pokerplan_core::{Error, Room};

    use super::*;
    use crate::hub::ChangeHub;
    use crate::protocol::EntityKind;

    const WINDOW: Duration = Duration::from_millis(150);

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn code() -> RoomCode {
        RoomCode::parse("ABC234").unwrap()
    }

    fn snapshot_with(names: &[&str]) -> RoomSnapshot {
        RoomSnapshot {
            room: Room::new(code()),
            participants: names
                .iter()
                .map(|name| pokerplan_core::ParticipantView {
                    name: name.to_string(),
                    is_facilitator: false,
                    is_voter: true,
                    vote: None,
                })
                .collect(),
            stories: Vec::new(),
        }
    }

    /// Fetch closure that counts calls and serves a fixed roster.
    fn counting_fetch(
        counter: Arc<AtomicUsize>,
        names: &'static [&'static str],
    ) -> impl Fn(RoomCode) -> std::future::Ready<pokerplan_core::Result<RoomSnapshot>> {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(snapshot_with(names)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_single_refetch() {
        init_logging();
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut watcher = RoomWatcher::spawn(
            code(),
            None,
            notices,
            WINDOW,
            counting_fetch(fetches.clone(), &["ana"]),
        );

        // Initial snapshot arrives without any notice
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // A reorder-style burst: five notices back to back
        for _ in 0..5 {
            hub.publish(ChangeNotice::new(code(), EntityKind::Story)).await;
        }

        // One coalesced refetch after the quiet period
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
        time::sleep(WINDOW * 4).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_edge_rearms_on_each_notice() {
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let fetches = Arc::new(AtomicUsize::new(0));
        let _watcher = RoomWatcher::spawn(
            code(),
            None,
            notices,
            WINDOW,
            counting_fetch(fetches.clone(), &["ana"]),
        );

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // Notices spaced inside the window keep pushing the deadline out
        for _ in 0..4 {
            hub.publish(ChangeNotice::new(code(), EntityKind::Vote)).await;
            time::sleep(WINDOW / 2).await;
        }
        // No refetch has fired yet - the stream was never quiet long enough
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        time::sleep(WINDOW * 2).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_detected_once_and_identity_cleared() {
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let fetches = Arc::new(AtomicUsize::new(0));
        // The roster never contains "ben"
        let mut watcher = RoomWatcher::spawn(
            code(),
            Some("ben".to_string()),
            notices,
            WINDOW,
            counting_fetch(fetches.clone(), &["ana"]),
        );

        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Kicked));
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));

        // Further refetches must not raise the signal again
        hub.publish(ChangeNotice::new(code(), EntityKind::Participant)).await;
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_participant_is_not_kicked() {
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut watcher = RoomWatcher::spawn(
            code(),
            Some("ana".to_string()),
            notices,
            WINDOW,
            counting_fetch(fetches.clone(), &["ana"]),
        );

        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
        hub.publish(ChangeNotice::new(code(), EntityKind::Vote)).await;
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_is_swallowed_and_retried() {
        init_logging();
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_fetch = calls.clone();
        // First fetch fails; later ones succeed
        let fetch = move |_| {
            let call = calls_in_fetch.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if call == 0 {
                Err(Error::NotFound("room gone".into()))
            } else {
                Ok(snapshot_with(&["ana"]))
            })
        };
        let mut watcher = RoomWatcher::spawn(code(), None, notices, WINDOW, fetch);

        // The failed initial fetch produced no event; the next notice
        // triggers a successful refetch
        hub.publish(ChangeNotice::new(code(), EntityKind::Room)).await;
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_emits_closed_event() {
        let hub = ChangeHub::new();
        let notices = hub.subscribe(&code()).await;
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut watcher = RoomWatcher::spawn(
            code(),
            None,
            notices,
            WINDOW,
            counting_fetch(fetches.clone(), &["ana"]),
        );
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Snapshot(_)));

        // Dropping the hub drops every sender
        drop(hub);
        assert!(matches!(watcher.recv().await.unwrap(), RoomEvent::Closed));
        assert!(matches!(watcher.recv().await, Err(SyncError::StreamClosed)));
    }
}
