//! Per-mailbox call serialization.
//!
//! Mail protocols are stateful: a mailbox session tolerates exactly one
//! command in flight, and servers answer out-of-order submissions with
//! protocol errors. The serializer is a single-worker FIFO queue; each
//! mailbox session owns one, so calls against the same mailbox run in
//! submission order while different mailboxes proceed in parallel.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::error::ClientError;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO executor with concurrency one.
///
/// Work submitted while the queue is busy waits its turn; a failed
/// operation only fails its own caller and the queue moves on. Dropping
/// the serializer closes intake, lets already queued work drain, then
/// stops the worker.
pub struct CallSerializer {
    queue: mpsc::UnboundedSender<Job>,
}

impl CallSerializer {
    pub fn new() -> Self {
        let (queue, mut work) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = work.recv().await {
                job().await;
            }
            trace!("Call serializer worker stopped");
        });
        Self { queue }
    }

    /// Queue an operation and return a handle to its outcome.
    ///
    /// Dropping the handle cancels the waiter: if the operation has not
    /// started yet it is skipped entirely, and an operation already
    /// running completes with its result discarded. Other queued calls
    /// are unaffected either way.
    pub fn submit<F, Fut, T>(&self, operation: F) -> oneshot::Receiver<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done, outcome) = oneshot::channel();
        let job: Job = Box::new(move || {
            async move {
                if done.is_closed() {
                    trace!("Skipping cancelled call");
                    return;
                }
                let result = operation().await;
                let _ = done.send(result);
            }
            .boxed()
        });

        // Send fails only when the worker is gone; the dropped job takes
        // `done` with it and the receiver resolves as closed.
        let _ = self.queue.send(job);
        outcome
    }

    /// Queue an operation and wait for its outcome.
    pub async fn enqueue<F, Fut, T>(&self, operation: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(operation)
            .await
            .map_err(|_| ClientError::QueueClosed)
    }
}

impl Default for CallSerializer {
    fn default() -> Self {
        Self::new()
    }
}
