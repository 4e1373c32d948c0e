//! Cooperative cancellation for runs and the scheduler loop

use crate::error::{DcaError, Result};
use std::time::Duration;
use tokio::sync::watch;

/// Sending half; flipping it asks every [`Shutdown`] clone to stop
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half handed to long-running work
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A handle that is never triggered
    pub fn never() -> Shutdown {
        let (_trigger, shutdown) = Self::new();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested; pends forever if the trigger is gone
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep that aborts immediately on shutdown
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if self.is_triggered() {
            return Err(DcaError::Cancelled("shutdown requested".to_string()));
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.triggered() => Err(DcaError::Cancelled("shutdown requested".to_string())),
        }
    }
}
