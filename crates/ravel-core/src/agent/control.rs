//! External control of a running agent: stop, pause and cancel.
//!
//! All three are cooperative. The scheduler checks them at the top of every
//! iteration; cancellation is also observed inside model calls and tools.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Cloneable handle shared between a run and whoever drives it.
#[derive(Debug, Clone)]
pub struct RunControl {
    stop_value: Arc<Mutex<Option<String>>>,
    paused: Arc<watch::Sender<bool>>,
    cancellation: CancellationToken,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Use an existing token, e.g. a child of a caller-owned tree.
    pub fn with_token(cancellation: CancellationToken) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            stop_value: Arc::new(Mutex::new(None)),
            paused: Arc::new(paused),
            cancellation,
        }
    }

    /// Ask the run to finish with `value` as its result.
    ///
    /// Observed at the next iteration or after the current model call; any
    /// pending tool results are discarded. The first stop wins.
    pub fn stop(&self, value: impl Into<String>) {
        let mut slot = lock(&self.stop_value);
        if slot.is_none() {
            *slot = Some(value.into());
        }
    }

    pub fn stop_value(&self) -> Option<String> {
        lock(&self.stop_value).clone()
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Wait until the run is resumed. Returns early if it is cancelled.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.paused.subscribe();
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {}
            _ = rx.wait_for(|paused| !*paused) => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_stop_wins() {
        let control = RunControl::new();
        assert_eq!(control.stop_value(), None);
        control.stop("done early");
        control.stop("ignored");
        assert_eq!(control.stop_value().as_deref(), Some("done early"));
    }

    #[test]
    fn clones_share_state() {
        let control = RunControl::new();
        let handle = control.clone();
        handle.pause();
        assert!(control.is_paused());
        handle.cancel();
        assert!(control.is_cancelled());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_running() {
        let control = RunControl::new();
        tokio::time::timeout(Duration::from_secs(1), control.wait_while_paused())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_resumed() {
        let control = RunControl::new();
        control.pause();

        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_while_paused().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        control.resume();
        waiter.await.unwrap();
        assert!(!control.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_paused_waiter() {
        let control = RunControl::new();
        control.pause();
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.wait_while_paused().await })
        };
        control.cancel();
        waiter.await.unwrap();
        assert!(control.is_paused());
    }
}
