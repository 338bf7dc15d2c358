//! Cooperative cancellation for an in-flight install.

use tokio::sync::watch;

/// Triggers cancellation for every [`Cancellation`] cloned from its pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/observer pair.
#[must_use]
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl Cancellation {
    /// An observer that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        cancellation().1
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_handle_cancels_all_clones() {
        let (handle, cancel) = cancellation();
        let other = cancel.clone();
        assert!(!cancel.is_cancelled());

        handle.cancel();
        assert!(cancel.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let (handle, mut cancel) = cancellation();
        let waiter = tokio::spawn(async move { cancel.cancelled().await });

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("cancellation should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_does_not_resolve() {
        let mut cancel = Cancellation::never();
        assert!(!cancel.is_cancelled());
        let result = tokio::time::timeout(Duration::from_millis(50), cancel.cancelled()).await;
        assert!(result.is_err());
    }
}
