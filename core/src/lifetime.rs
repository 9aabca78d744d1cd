//! Cooperative cancellation shared by every request a `Client` issues.
//!
//! A `Lifetime` is a node in a tree. Cancelling a node cancels it and every
//! lifetime derived from it with `child()`, never its ancestors. Each node
//! owns a `watch` channel; a child keeps receivers for its own channel and
//! for all of its ancestors', so waiting on it means waiting on any of them.

use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Lifetime {
    cancel: Arc<watch::Sender<bool>>,
    signals: Vec<watch::Receiver<bool>>,
}

impl Lifetime {
    /// A root lifetime that ends only when cancelled.
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cancel: Arc::new(tx),
            signals: vec![rx],
        }
    }

    /// Derive a lifetime that ends when either it or `self` is cancelled.
    pub fn child(&self) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut signals = self.signals.clone();
        signals.push(rx);
        Self {
            cancel: Arc::new(tx),
            signals,
        }
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    /// Resolves once this lifetime or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let waits = self.signals.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|cancelled| *cancelled).await.map(|_| ()).is_err();
                if closed {
                    // Every handle to that node is gone without a cancel: it can never fire.
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::background()
    }
}
