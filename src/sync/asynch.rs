//! Async/await support for deferred workers.
//!
//! An async worker awaits [`WorkQueue::ready`] and then runs
//! [`Engine::run_deferred`](crate::Engine::run_deferred). The interrupt
//! handler wakes it through the queue's waker whenever work is posted.
//!
//! # Example
//!
//! ```ignore
//! loop {
//!     engine.work_queue().ready().await;
//!     engine.run_deferred(&mut sink, &mut delay);
//! }
//! ```

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use super::work::WorkQueue;

/// Future resolving once the queue has work pending or has been closed.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WorkReady<'a> {
    queue: &'a WorkQueue,
}

impl Future for WorkReady<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let queue = self.queue;
        if queue.has_pending() || !queue.is_open() {
            return Poll::Ready(());
        }

        queue.waker.register(cx.waker());

        // Work posted between the check and the registration.
        if queue.has_pending() || !queue.is_open() {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}

impl WorkQueue {
    /// Wait until work is pending or the queue closes
    pub fn ready(&self) -> WorkReady<'_> {
        WorkReady { queue: self }
    }
}
