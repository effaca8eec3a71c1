use std::sync::Arc;

use tokio::sync::watch;

/// Cancels the session of an [`Agent`](crate::Agent) from anywhere.
///
/// Cancellation is sticky: once cancelled, the current run stops at the
/// next check point and every later run fails immediately.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Requests cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` if cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// The agent side of a [`CancelHandle`].
#[derive(Debug)]
pub(crate) struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    #[inline]
    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.tx),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The token owns a sender, so the channel cannot close under us.
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let token = CancelToken::new();
        let handle = token.handle();
        assert!(!token.is_cancelled());

        let waiter = async {
            timeout(Duration::from_secs(1), token.cancelled()).await
        };
        let cancel = async {
            tokio::task::yield_now().await;
            handle.clone().cancel();
        };
        let (waited, _) = tokio::join!(waiter, cancel);

        assert!(waited.is_ok());
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }
}
