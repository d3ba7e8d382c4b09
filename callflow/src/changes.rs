//! Realtime change notifications.
//!
//! Every successful write publishes a [`ChangeEvent`] on the [`ChangeFeed`]. Clients subscribe
//! through [`ChangeFeed::subscribe`]; the returned [`Subscription`] owns a broadcast receiver, so
//! dropping it unsubscribes. Subscribers that fall behind skip the events they missed rather than
//! slowing down writers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{Collection, UserId};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    #[schema(value_type = String, format = "uuid")]
    pub id: Uuid,
    /// Creator of the group a changed group or student belongs to. Never sent to clients.
    #[serde(skip)]
    pub owner: Option<UserId>,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind, id: Uuid) -> Self {
        Self {
            collection,
            kind,
            id,
            owner: None,
        }
    }

    pub fn owned_by(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Fan-out of change events to every live subscriber
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    /// `capacity` is how many events a slow subscriber may fall behind before it starts skipping
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(collection = %event.collection, kind = ?event.kind, id = %event.id, "Publishing change");
        // An error only means nobody is listening right now
        if self.tx.send(event).is_err() {
            tracing::trace!("No change subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::info!(lagged_count = n, "Change subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        BroadcastStream::new(self.rx).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::info!("Change stream lagged: {e}");
                None
            }
        })
    }
}
