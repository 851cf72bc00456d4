//! Bounded drop-oldest event delivery.
//!
//! Publishing never blocks. A subscriber that falls more than `capacity`
//! events behind loses the oldest ones; the screen is still authoritative and
//! a later `terminal_output` event supersedes any lost rendering.

use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use ptyrender_core::SessionEvent;

/// Fan-out queue of session events.
#[derive(Debug)]
pub struct EventQueue {
    sender: Mutex<Option<broadcast::Sender<SessionEvent>>>,
}

impl EventQueue {
    /// Create a queue holding `capacity` undelivered events per subscriber.
    ///
    /// The capacity is rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Subscribe to events published from now on.
    ///
    /// Subscribing to a closed queue yields a receiver that is already finished.
    pub fn subscribe(&self) -> EventReceiver {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        EventReceiver {
            inner: sender.as_ref().map(broadcast::Sender::subscribe),
            dropped: 0,
        }
    }

    /// Publish an event. Returns the number of subscribers it reached.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                trace!("Publishing {} event", event.kind());
                // No subscribers is not an error
                sender.send(event).unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Close the queue; subscribers drain what is buffered and then finish.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Check if the queue was closed.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Receiving end of an [`EventQueue`].
#[derive(Debug)]
pub struct EventReceiver {
    inner: Option<broadcast::Receiver<SessionEvent>>,
    dropped: u64,
}

impl EventReceiver {
    /// Wait for the next event; `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        let inner = self.inner.as_mut()?;
        loop {
            match inner.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event subscriber lagged, oldest events dropped");
                    self.dropped += n;
                }
                Err(RecvError::Closed) => {
                    self.inner = None;
                    return None;
                }
            }
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        let inner = self.inner.as_mut()?;
        loop {
            match inner.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event subscriber lagged, oldest events dropped");
                    self.dropped += n;
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.inner = None;
                    return None;
                }
            }
        }
    }

    /// Total events this receiver lost to lag.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
