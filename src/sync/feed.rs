//! Owner-scoped change feed subscription.
//!
//! [`ChangeFeedClient`] owns at most one [`Subscription`]. The subscription's
//! reader task connects through a [`FeedTransport`], reconnects with backoff,
//! and forwards decoded events plus connection-state transitions into a
//! bounded queue that the UI loop drains with [`ChangeFeedClient::recv`].

use super::transport::{FeedError, FeedFrame, FeedTransport, FrameStream};
use crate::config::FeedSettings;
use crate::model::{Bookmark, BookmarkId, OwnerId};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Health of the change feed as shown in the header chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connected => "Live",
            ConnectionState::Connecting => "Syncing...",
            ConnectionState::Disconnected => "Offline",
        }
    }
}

/// A validated change for the subscribed owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Inserted(Bookmark),
    Updated(Bookmark),
    Deleted(BookmarkId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    Event(FeedEvent),
    State(ConnectionState),
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub max_backoff: Duration,
    pub idle_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_backoff: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
            queue_capacity: 64,
        }
    }
}

impl From<&FeedSettings> for FeedConfig {
    fn from(settings: &FeedSettings) -> Self {
        Self {
            max_backoff: Duration::from_secs(settings.max_backoff_secs.max(1)),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs.max(1)),
            queue_capacity: settings.queue_capacity.max(1),
        }
    }
}

/// Live subscription handle.
///
/// Owns the reader task and the receiving end of its queue. Released exactly
/// once, either by [`Subscription::release`] or on drop; after release no
/// further message is handed out, even one already buffered.
pub struct Subscription {
    owner: OwnerId,
    task: Option<JoinHandle<()>>,
    rx: mpsc::Receiver<FeedMessage>,
}

impl Subscription {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the reader task and close the queue. Returns false if already
    /// released.
    pub fn release(&mut self) -> bool {
        let Some(task) = self.task.take() else {
            return false;
        };
        task.abort();
        self.rx.close();
        tracing::debug!(owner = %self.owner, "Feed subscription released");
        true
    }

    async fn recv(&mut self) -> Option<FeedMessage> {
        if self.task.is_none() {
            return None;
        }
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct ChangeFeedClient<T: FeedTransport> {
    transport: Arc<T>,
    config: FeedConfig,
    subscription: Option<Subscription>,
}

impl<T: FeedTransport> ChangeFeedClient<T> {
    pub fn new(transport: T, config: FeedConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            subscription: None,
        }
    }

    /// Subscribe to `owner`'s changes, replacing (and releasing) any
    /// existing subscription. Connection failures are reported as
    /// [`ConnectionState::Disconnected`] messages, never as errors.
    pub fn subscribe(&mut self, owner: OwnerId) {
        if let Some(mut previous) = self.subscription.take() {
            previous.release();
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let task = tokio::spawn(run_feed(
            Arc::clone(&self.transport),
            owner.clone(),
            self.config.clone(),
            tx,
        ));
        tracing::info!(owner = %owner, "Subscribed to change feed");

        self.subscription = Some(Subscription {
            owner,
            task: Some(task),
            rx,
        });
    }

    /// Release the current subscription. A second call is a no-op and
    /// returns false.
    pub fn teardown(&mut self) -> bool {
        match self.subscription.take() {
            Some(mut subscription) => subscription.release(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    pub fn owner(&self) -> Option<&OwnerId> {
        self.subscription.as_ref().map(Subscription::owner)
    }

    /// Next message from the current subscription.
    ///
    /// Pends forever while unsubscribed, so it can sit in a `tokio::select!`
    /// branch unconditionally. Cancel-safe.
    pub async fn recv(&mut self) -> FeedMessage {
        if let Some(subscription) = self.subscription.as_mut() {
            if let Some(message) = subscription.recv().await {
                return message;
            }
            tracing::debug!("Feed subscription ended");
            self.subscription = None;
        }
        std::future::pending().await
    }
}

/// Doubling backoff, capped.
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Why a connected stream stopped.
enum StreamEnd {
    Closed,
    Failed(FeedError),
    Idle,
    ReceiverGone,
}

async fn run_feed<T: FeedTransport>(
    transport: Arc<T>,
    owner: OwnerId,
    config: FeedConfig,
    tx: mpsc::Sender<FeedMessage>,
) {
    let mut backoff = INITIAL_BACKOFF.min(config.max_backoff);

    loop {
        if tx
            .send(FeedMessage::State(ConnectionState::Connecting))
            .await
            .is_err()
        {
            return;
        }

        match transport.open(&owner).await {
            Ok(mut frames) => {
                backoff = INITIAL_BACKOFF.min(config.max_backoff);
                if tx
                    .send(FeedMessage::State(ConnectionState::Connected))
                    .await
                    .is_err()
                {
                    return;
                }

                match pump(&mut frames, &owner, config.idle_timeout, &tx).await {
                    StreamEnd::ReceiverGone => return,
                    StreamEnd::Closed => tracing::info!("Change stream closed by server"),
                    StreamEnd::Idle => tracing::warn!(
                        idle_secs = config.idle_timeout.as_secs(),
                        "Change stream idle, reconnecting"
                    ),
                    StreamEnd::Failed(e) => tracing::warn!(error = %e, "Change stream failed"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, retry_in_secs = backoff.as_secs(), "Failed to open change stream");
            }
        }

        if tx
            .send(FeedMessage::State(ConnectionState::Disconnected))
            .await
            .is_err()
        {
            return;
        }

        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff, config.max_backoff);
    }
}

async fn pump(
    frames: &mut FrameStream,
    owner: &OwnerId,
    idle_timeout: Duration,
    tx: &mpsc::Sender<FeedMessage>,
) -> StreamEnd {
    loop {
        let next = match tokio::time::timeout(idle_timeout, frames.next()).await {
            Ok(next) => next,
            Err(_) => return StreamEnd::Idle,
        };

        let frame = match next {
            None => return StreamEnd::Closed,
            Some(Err(e)) => return StreamEnd::Failed(e),
            Some(Ok(frame)) => frame,
        };

        if let Some(event) = to_event(frame, owner) {
            if tx.send(FeedMessage::Event(event)).await.is_err() {
                return StreamEnd::ReceiverGone;
            }
        }
    }
}

/// Filter a frame down to an event for `owner`. Heartbeats, other owners'
/// rows, and invalid records yield nothing.
fn to_event(frame: FeedFrame, owner: &OwnerId) -> Option<FeedEvent> {
    let (record, wrap): (Bookmark, fn(Bookmark) -> FeedEvent) = match frame {
        FeedFrame::Heartbeat => return None,
        FeedFrame::Delete { old_record } => {
            if old_record.owner_id.as_ref().is_some_and(|o| o != owner) {
                tracing::debug!(id = %old_record.id, "Dropping delete for another owner");
                return None;
            }
            return Some(FeedEvent::Deleted(old_record.id));
        }
        FeedFrame::Insert { record } => (record, FeedEvent::Inserted),
        FeedFrame::Update { record } => (record, FeedEvent::Updated),
    };

    if &record.owner_id != owner {
        tracing::debug!(id = %record.id, "Dropping change for another owner");
        return None;
    }
    if let Err(e) = record.validate() {
        tracing::warn!(id = %record.id, error = %e, "Dropping invalid feed record");
        return None;
    }
    Some(wrap(record))
}
