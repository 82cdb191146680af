//! Debounced write-behind persistence.
//!
//! Message-list changes arrive in bursts; the saver coalesces them so one
//! quiet period produces one write of the latest conversation snapshot.
//! Persistence failures are the sink's problem to log — the conversation is
//! never blocked by storage.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use palika_core::types::Chat;

/// One pending save: the full conversation snapshot for one user.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub user_id: String,
    pub chat: Chat,
}

/// Function invoked with the coalesced snapshot once the quiet period ends.
pub type SaveSink = Arc<dyn Fn(SaveRequest) + Send + Sync>;

enum SaverMessage {
    Save(SaveRequest),
    Flush(oneshot::Sender<()>),
}

/// Coalescing write-behind queue with a quiet-period timer.
pub struct DebouncedSaver {
    tx: mpsc::UnboundedSender<SaverMessage>,
}

impl DebouncedSaver {
    /// Spawn the saver worker. `quiet` is the debounce window; `sink`
    /// receives the newest snapshot once the window elapses.
    pub fn new(quiet: Duration, sink: SaveSink) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, quiet, sink));
        Self { tx }
    }

    /// Queue a snapshot, replacing any snapshot still waiting out its
    /// quiet period.
    pub fn schedule(&self, user_id: impl Into<String>, chat: Chat) {
        let _ = self.tx.send(SaverMessage::Save(SaveRequest {
            user_id: user_id.into(),
            chat,
        }));
    }

    /// Write any pending snapshot immediately and wait for it.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SaverMessage::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<SaverMessage>, quiet: Duration, sink: SaveSink) {
    loop {
        let mut pending = match rx.recv().await {
            Some(SaverMessage::Save(request)) => Some(request),
            Some(SaverMessage::Flush(ack)) => {
                let _ = ack.send(());
                None
            }
            // Channel closed with nothing pending.
            None => return,
        };

        while let Some(request) = pending.take() {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(SaverMessage::Save(newer)) => {
                        // A newer snapshot resets the quiet period.
                        pending = Some(newer);
                    }
                    Some(SaverMessage::Flush(ack)) => {
                        sink(request);
                        let _ = ack.send(());
                    }
                    None => {
                        sink(request);
                        return;
                    }
                },
                _ = tokio::time::sleep(quiet) => {
                    debug!(chat = %request.chat.id, "Debounced save fired");
                    sink(request);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use palika_core::types::Message;

    fn make_chat(preview: &str) -> Chat {
        Chat {
            id: "c1".to_string(),
            title: "title".to_string(),
            preview: preview.to_string(),
            messages: vec![Message::user("hi", false)],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recording_sink() -> (SaveSink, Arc<Mutex<Vec<SaveRequest>>>) {
        let saved: Arc<Mutex<Vec<SaveRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_saves = saved.clone();
        let sink: SaveSink = Arc::new(move |request| {
            sink_saves.lock().unwrap().push(request);
        });
        (sink, saved)
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_fires_after_quiet_period() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_millis(1500), sink);

        saver.schedule("u1", make_chat("one"));
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].user_id, "u1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write_of_latest() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_millis(1500), sink);

        saver.schedule("u1", make_chat("one"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        saver.schedule("u1", make_chat("two"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        saver.schedule("u1", make_chat("three"));

        tokio::time::sleep(Duration::from_millis(1600)).await;

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].chat.preview, "three");
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_fire_separately() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_millis(1500), sink);

        saver.schedule("u1", make_chat("one"));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        saver.schedule("u1", make_chat("two"));
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(saved.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_pending_immediately() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_secs(3600), sink);

        saver.schedule("u1", make_chat("one"));
        saver.flush().await;

        assert_eq!(saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending_is_noop() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_millis(10), sink);

        saver.flush().await;
        assert!(saved.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_writes_pending_snapshot() {
        let (sink, saved) = recording_sink();
        let saver = DebouncedSaver::new(Duration::from_secs(3600), sink);

        saver.schedule("u1", make_chat("last words"));
        drop(saver);

        // Give the worker a chance to observe the closed channel.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].chat.preview, "last words");
    }
}
