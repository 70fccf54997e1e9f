//! Page fetching interface.
//!
//! The controller never passes arguments to the fetcher: collaborators
//! that paginate with cursors or offsets keep that state themselves. Each
//! call produces a future resolving to the next page, polled on the feed's
//! UI runtime so completion lands on the UI thread.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Poll, Waker};

/// The single error the pagination core cares about: the fetch failed, for
/// whatever underlying reason (network, decoding, collaborator-side
/// cancellation). The controller logs it and returns to idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Failed { reason: String },
}

impl FetchError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Failed { reason } => write!(f, "page fetch failed: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

pub type FetchResult<T> = Result<Vec<T>, FetchError>;

/// Future type returned by fetchers. Not `Send`: it is polled on the UI
/// runtime and may capture UI-thread state.
pub type PageFuture<T> = Pin<Box<dyn Future<Output = FetchResult<T>>>>;

/// Asynchronous source of feed pages.
pub trait PageFetcher<T> {
    /// Starts fetching the next page. The returned items arrive in scroll
    /// order and are merged wholesale at the feed's configured end.
    fn fetch_next_page(&self) -> PageFuture<T>;
}

struct OneshotSlot<T> {
    result: Option<FetchResult<T>>,
    waker: Option<Waker>,
}

/// Adapts a blocking fetch routine into a [`PageFetcher`].
///
/// Each fetch runs the routine on a fresh worker thread; the result is
/// handed back through a shared slot, and the stored waker tells the UI
/// runtime's scheduler to drain again. The pagination controller itself
/// never blocks.
pub struct BlockingFetcher<T, F> {
    work: Arc<F>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> BlockingFetcher<T, F>
where
    T: Send + 'static,
    F: Fn() -> FetchResult<T> + Send + Sync + 'static,
{
    pub fn new(work: F) -> Self {
        Self {
            work: Arc::new(work),
            _marker: PhantomData,
        }
    }
}

impl<T, F> PageFetcher<T> for BlockingFetcher<T, F>
where
    T: Send + 'static,
    F: Fn() -> FetchResult<T> + Send + Sync + 'static,
{
    fn fetch_next_page(&self) -> PageFuture<T> {
        let slot = Arc::new(Mutex::new(OneshotSlot {
            result: None,
            waker: None,
        }));

        let work = Arc::clone(&self.work);
        let producer = Arc::clone(&slot);
        std::thread::spawn(move || {
            let result = work();
            let waker = {
                let mut slot = producer.lock().expect("fetch slot lock poisoned");
                slot.result = Some(result);
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });

        Box::pin(std::future::poll_fn(move |cx| {
            let mut slot = slot.lock().expect("fetch slot lock poisoned");
            match slot.result.take() {
                Some(result) => Poll::Ready(result),
                None => {
                    slot.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::failed("connection reset");
        assert_eq!(err.to_string(), "page fetch failed: connection reset");
    }

    #[test]
    fn test_fetch_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_err: &E) {}
        assert_error(&FetchError::failed("timeout"));
    }
}
