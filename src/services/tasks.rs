use std::future::Future;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::noop_waker_ref;
use parking_lot::Mutex;

/// Cooperative executor for asynchronous loads.
///
/// Tasks never run on their own: [`TaskQueue::run_until_stalled`] is called
/// once per viewer tick and polls every task that can make progress. A load
/// that completes out-of-band is therefore observed on the next tick.
#[derive(Default)]
pub struct TaskQueue {
    incoming: Mutex<Vec<BoxFuture<'static, ()>>>,
    running: Mutex<FuturesUnordered<BoxFuture<'static, ()>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.incoming.lock().push(task.boxed());
    }

    /// Number of tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.incoming.lock().len() + self.running.lock().len()
    }

    /// Polls tasks until none can make progress and returns how many
    /// finished. Tasks spawned while polling are picked up in the same call.
    pub fn run_until_stalled(&self) -> usize {
        let mut running = self.running.lock();
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut completed = 0;
        loop {
            let spawned: Vec<_> = self.incoming.lock().drain(..).collect();
            let had_new = !spawned.is_empty();
            running.extend(spawned);
            match running.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(())) => completed += 1,
                Poll::Ready(None) | Poll::Pending => {
                    if !had_new && self.incoming.lock().is_empty() {
                        break;
                    }
                }
            }
        }
        completed
    }
}
