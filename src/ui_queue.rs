//! Marshals work from background tasks onto the UI loop.
//!
//! The UI loop owns its state exclusively. Background tasks never touch it;
//! they hand closures to a [`UiSender`] and the loop runs them one at a time,
//! in the order each sender submitted them.

use thiserror::Error;
use tokio::sync::mpsc;

pub type UiTask<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum SubmitError {
    #[error("ui thread is no longer accepting updates")]
    Closed,
}

pub struct UiSender<T> {
    tx: mpsc::UnboundedSender<UiTask<T>>,
}

impl<T> Clone for UiSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> UiSender<T> {
    pub fn submit<F>(&self, task: F) -> Result<(), SubmitError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.tx
            .send(Box::new(task))
            .map_err(|_| SubmitError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct UiQueue<T> {
    rx: mpsc::UnboundedReceiver<UiTask<T>>,
}

impl<T> UiQueue<T> {
    /// Waits for the next submitted task. Cancel safe.
    pub async fn recv(&mut self) -> Option<UiTask<T>> {
        self.rx.recv().await
    }

    /// Runs already-queued tasks against `target`, at most `limit` of them.
    pub fn drain(&mut self, target: &mut T, limit: usize) -> usize {
        let mut processed = 0usize;
        while processed < limit {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(target);
                    processed += 1;
                }
                Err(_) => break,
            }
        }
        processed
    }

    /// Stops accepting submissions. Senders observe [`SubmitError::Closed`].
    pub fn close(&mut self) {
        self.rx.close();
    }
}

pub fn channel<T>() -> (UiSender<T>, UiQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiSender { tx }, UiQueue { rx })
}
