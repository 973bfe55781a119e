//! Typed publish/subscribe bus for catalog notifications.
//!
//! The bus is owned by the application root and handed to the services
//! that publish on it. Each [`EventBus::subscribe`] call returns an
//! independent [`Subscription`] receiving every event published after it
//! was created. Dropped subscriptions are pruned on the next publish.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::progress::{IngestProgress, IngestSummary};

/// Notifications emitted by the catalog services and the ingest pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    EntryCreated {
        id: String,
        title: String,
    },
    EntryUpdated {
        id: String,
        version: i64,
    },
    EntryReplaced {
        id: String,
        old_path: String,
        new_path: String,
    },
    EntryDeleted {
        id: String,
    },
    /// `existing_id` is `None` when the file repeats an earlier file of the
    /// same ingest run.
    DuplicateSkipped {
        file_name: String,
        existing_id: Option<String>,
    },
    /// A storage object lost its catalog row and could not be removed.
    OrphanedObject {
        path: String,
        reason: String,
    },
    IngestProgress(IngestProgress),
    IngestFinished(IngestSummary),
}

/// Fan-out channel of `E` values. Cloning shares the subscriber list.
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<Sender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone + Send> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        Subscription { rx }
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: E) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<E>>> {
        // A panicking subscriber cannot corrupt a Vec of senders.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receiving side of one subscription.
pub struct Subscription<E> {
    rx: Receiver<E>,
}

impl<E> Subscription<E> {
    /// Next pending event, if any, without blocking.
    pub fn try_next(&self) -> Option<E> {
        match self.rx.try_recv() {
            Ok(e) => Some(e),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// All events published so far and not yet consumed.
    pub fn drain(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }
}
