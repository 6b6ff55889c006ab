//! A minimal cancellation source/token pair, standing in for a
//! `context.Context`/`CancelFunc` pair: one shared boolean broadcast over a
//! `watch` channel that every subtask selects against.

use tokio::sync::watch;

#[derive(Clone)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx })
}

impl CancelSource {
    /// Fire cancellation. Idempotent; safe to call more than once.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation fires. Safe to `select!` against
    /// repeatedly; does not consume the token.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}
