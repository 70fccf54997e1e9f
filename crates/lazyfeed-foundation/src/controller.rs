//! Pagination controller.
//!
//! The one stateful component of the feed. It owns the loading flag,
//! decides when to fetch via the boundary detector, merges resolved pages
//! into the item list, and keeps the viewport visually stable by
//! snapshotting the active anchor around each fetch.
//!
//! Design follows the LazyListState pattern: the controller is a cheap
//! `Clone` handle over shared state, reactive properties are backed by
//! observable cells, and non-reactive internals (anchor snapshot, pending
//! task handle) live behind `RefCell`.
//!
//! # State machine
//!
//! Idle → Loading on a positive boundary check: snapshot the anchor, raise
//! the loading flag, spawn the fetch on the UI runtime. While Loading,
//! geometry events are still evaluated but the detector's single-flight
//! guard resolves them all to false. Loading → Idle on completion:
//!
//! - success: merge the page at the configured end, clear the loading
//!   flag, then reapply the anchor snapshot. The flag must clear before
//!   the anchor write, and the merge must already be visible, or the
//!   scrolling surface ignores the position restore because it has not
//!   yet seen the larger content extent.
//! - failure: log, clear the loading flag, leave list and anchor alone.
//!
//! Triggers observed while Loading are dropped, never queued; the next
//! natural scroll event re-triggers if the user is still at the edge.

use std::cell::RefCell;
use std::rc::Rc;

use lazyfeed_core::{MutableState, RuntimeHandle, State, StateList, TaskHandle};

use crate::boundary::{should_trigger_fetch, PaginationConfig};
use crate::fetcher::{FetchResult, PageFetcher};
use crate::geometry::{Direction, Rect};

/// An item with stable identity, independent of its value.
///
/// The id anchors the viewport across merges: whichever item sits at the
/// visual center when a fetch starts is scrolled back into place after the
/// page lands.
pub trait FeedItem: Clone + 'static {
    type Id: Clone + PartialEq + 'static;

    fn id(&self) -> Self::Id;
}

struct ControllerInner<T: FeedItem> {
    runtime: RuntimeHandle,
    direction: Direction,
    config: PaginationConfig,
    fetcher: Rc<dyn PageFetcher<T>>,
    items: StateList<T>,
    is_loading: MutableState<bool>,
    active_anchor: MutableState<Option<T::Id>>,
    saved_anchor: RefCell<Option<T::Id>>,
    pending_fetch: RefCell<Option<TaskHandle>>,
}

/// Orchestrates infinite-scroll pagination for one feed edge.
///
/// All methods must be called on the runtime's UI thread; the fetch is the
/// only operation that suspends, and its completion is processed back on
/// that thread before any state mutation.
pub struct PaginationController<T: FeedItem> {
    inner: Rc<ControllerInner<T>>,
}

impl<T: FeedItem> Clone for PaginationController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: FeedItem> PaginationController<T> {
    pub fn new(
        runtime: RuntimeHandle,
        initial_items: Vec<T>,
        direction: Direction,
        fetcher: Rc<dyn PageFetcher<T>>,
    ) -> Self {
        Self::with_config(
            runtime,
            initial_items,
            direction,
            fetcher,
            PaginationConfig::default(),
        )
    }

    pub fn with_config(
        runtime: RuntimeHandle,
        initial_items: Vec<T>,
        direction: Direction,
        fetcher: Rc<dyn PageFetcher<T>>,
        config: PaginationConfig,
    ) -> Self {
        let items = StateList::with_runtime(initial_items, runtime.clone());
        let is_loading = MutableState::with_runtime(false, runtime.clone());
        let active_anchor = MutableState::with_runtime(None, runtime.clone());
        Self {
            inner: Rc::new(ControllerInner {
                runtime,
                direction,
                config,
                fetcher,
                items,
                is_loading,
                active_anchor,
                saved_anchor: RefCell::new(None),
                pending_fetch: RefCell::new(None),
            }),
        }
    }

    /// Feeds a geometry-observer event through the boundary detector and,
    /// on a positive result, starts a fetch. Never fails; malformed
    /// geometry and triggers during an outstanding fetch are no-ops.
    pub fn on_geometry_changed(&self, old: Rect, new: Rect, container: Rect) {
        let inner = &self.inner;
        let trigger = should_trigger_fetch(
            old,
            new,
            container,
            inner.direction,
            inner.is_loading.get(),
            inner.config.threshold,
        );
        if trigger {
            self.begin_fetch();
        }
    }

    fn begin_fetch(&self) {
        let inner = &self.inner;
        *inner.saved_anchor.borrow_mut() = inner.active_anchor.get();
        inner.is_loading.set(true);

        let future = inner.fetcher.fetch_next_page();
        let controller = self.clone();
        let task = inner.runtime.spawn_ui(async move {
            let outcome = future.await;
            controller.finish_fetch(outcome);
        });
        match task {
            Some(handle) => *inner.pending_fetch.borrow_mut() = Some(handle),
            None => {
                // Runtime already shut down; settle back to idle.
                inner.saved_anchor.borrow_mut().take();
                inner.is_loading.set(false);
            }
        }
    }

    fn finish_fetch(&self, outcome: FetchResult<T>) {
        let inner = &self.inner;
        inner.pending_fetch.borrow_mut().take();
        match outcome {
            Ok(page) => {
                match inner.direction {
                    Direction::Upward => inner.items.prepend_items(page),
                    Direction::Downward => inner.items.append_items(page),
                }
                inner.is_loading.set(false);
                let saved = inner.saved_anchor.borrow_mut().take();
                inner.active_anchor.set(saved);
            }
            Err(err) => {
                log::warn!("{err}; feed stays at {} items", inner.items.len());
                inner.saved_anchor.borrow_mut().take();
                inner.is_loading.set(false);
            }
        }
    }

    /// Cancels an outstanding fetch, if any, and returns the controller to
    /// idle without merging. The recovery path for fetchers that may never
    /// resolve; the next qualifying scroll event fetches again.
    pub fn cancel_pending_fetch(&self) {
        let inner = &self.inner;
        if let Some(handle) = inner.pending_fetch.borrow_mut().take() {
            handle.cancel();
            inner.saved_anchor.borrow_mut().take();
            inner.is_loading.set(false);
        }
    }

    /// Snapshot of the merged item sequence, in scroll order.
    pub fn current_items(&self) -> Vec<T> {
        self.inner.items.to_vec()
    }

    /// The live observable item sequence, for rendering.
    pub fn items(&self) -> StateList<T> {
        self.inner.items.clone()
    }

    /// Observable loading indicator, true exactly while a fetch is
    /// outstanding. Render layers show a spinner at the paginating edge.
    pub fn is_loading(&self) -> State<bool> {
        self.inner.is_loading.as_state()
    }

    /// Live anchor binding: the id of the item at the visual center of the
    /// viewport. The rendering layer writes it continuously as the user
    /// scrolls; the controller snapshots it at fetch start and reapplies
    /// it after the merge settles.
    pub fn active_anchor(&self) -> MutableState<Option<T::Id>> {
        self.inner.active_anchor.clone()
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    pub fn config(&self) -> PaginationConfig {
        self.inner.config
    }
}
