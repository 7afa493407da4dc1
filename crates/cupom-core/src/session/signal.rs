//! Operator confirmation and interrupt signals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, watch};

use crate::models::receipt::AccessKey;

/// The manual challenge suspension point.
///
/// The session calls this once the key is typed and waits, without a timeout,
/// until it resolves. `Err` carries the reason the operator gave up.
#[async_trait]
pub trait ChallengeSignal: Send + Sync {
    async fn wait_for_confirmation(&self, key: &AccessKey) -> Result<(), String>;
}

/// In-process challenge signal, confirmed from another task.
///
/// A confirmation sent before the session starts waiting is not lost.
#[derive(Debug, Clone, Default)]
pub struct OperatorSignal {
    inner: Arc<OperatorInner>,
}

#[derive(Debug, Default)]
struct OperatorInner {
    notify: Notify,
    abandoned: AtomicBool,
}

impl OperatorSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the challenge as solved.
    pub fn confirm(&self) {
        self.inner.notify.notify_one();
    }

    /// Give up on the challenge; the waiting session fails.
    pub fn abandon(&self) {
        self.inner.abandoned.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }
}

#[async_trait]
impl ChallengeSignal for OperatorSignal {
    async fn wait_for_confirmation(&self, _key: &AccessKey) -> Result<(), String> {
        self.inner.notify.notified().await;
        // An abandon applies to one session only
        if self.inner.abandoned.swap(false, Ordering::SeqCst) {
            Err("operator abandoned the challenge".to_string())
        } else {
            Ok(())
        }
    }
}

/// Cooperative cancellation shared between a caller and running sessions.
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`raise`](Self::raise) has been called.
    pub async fn raised(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|raised| *raised).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
