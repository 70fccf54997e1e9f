//! Observable state primitives.
//!
//! Feed state (the item list, the loading flag, the active anchor) is held
//! in [`MutableState`] cells owned by the UI thread. Any layer that renders
//! the feed subscribes with [`MutableState::watch`] and re-reads on
//! notification; nothing in this module knows about a concrete UI
//! framework.
//!
//! Watchers run synchronously inside the mutating call, on the UI thread,
//! in registration order. That makes write ordering observable: a watcher
//! registered on the loading flag fires before a later write to the anchor
//! state, which the pagination controller relies on.

use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::RuntimeHandle;

/// Identifies a registered watcher so it can be removed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

type WatcherFn = Rc<dyn Fn()>;

struct StateInner<T> {
    value: RefCell<T>,
    // Most cells have one or two watchers (the render layer, a test probe).
    watchers: RefCell<SmallVec<[(u64, WatcherFn); 2]>>,
    next_watcher_id: Cell<u64>,
    runtime: RuntimeHandle,
}

impl<T> StateInner<T> {
    fn notify_watchers(&self) {
        // Clone out of the borrow so a watcher may register or remove
        // watchers without a re-entrant borrow panic.
        let watchers: SmallVec<[WatcherFn; 2]> = self
            .watchers
            .borrow()
            .iter()
            .map(|(_, watcher)| Rc::clone(watcher))
            .collect();
        for watcher in watchers {
            watcher();
        }
    }
}

/// A mutable observable cell bound to the runtime's UI thread.
///
/// Reads are allowed from the owning thread only; writes assert thread
/// affinity in debug builds and notify watchers synchronously.
pub struct MutableState<T> {
    inner: Rc<StateInner<T>>,
}

impl<T> Clone for MutableState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> MutableState<T> {
    pub fn with_runtime(value: T, runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(StateInner {
                value: RefCell::new(value),
                watchers: RefCell::new(SmallVec::new()),
                next_watcher_id: Cell::new(1),
                runtime,
            }),
        }
    }

    /// Read-only view of this cell.
    pub fn as_state(&self) -> State<T> {
        State {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Reads the value through a closure without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Mutates in place and notifies watchers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.inner.runtime.assert_ui_thread();
        let result = f(&mut *self.inner.value.borrow_mut());
        self.inner.notify_watchers();
        result
    }

    /// Replaces the value and notifies watchers.
    pub fn replace(&self, value: T) {
        self.inner.runtime.assert_ui_thread();
        *self.inner.value.borrow_mut() = value;
        self.inner.notify_watchers();
    }

    pub fn set(&self, value: T) {
        self.replace(value);
    }

    /// Registers a change watcher. The callback runs on the UI thread,
    /// synchronously inside every mutating call, until unregistered.
    pub fn watch(&self, f: impl Fn() + 'static) -> WatcherId {
        let id = self.inner.next_watcher_id.get();
        self.inner.next_watcher_id.set(id + 1);
        self.inner.watchers.borrow_mut().push((id, Rc::new(f)));
        WatcherId(id)
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.inner
            .watchers
            .borrow_mut()
            .retain(|(watcher_id, _)| *watcher_id != id.0);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }
}

impl<T: Clone + 'static> MutableState<T> {
    pub fn value(&self) -> T {
        self.with(|value| value.clone())
    }

    pub fn get(&self) -> T {
        self.value()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for MutableState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableState")
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Read-only view of a [`MutableState`].
///
/// Hands observation to consumers (loading spinners, anchor-tracking
/// containers) without granting them the ability to write.
pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> State<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    pub fn watch(&self, f: impl Fn() + 'static) -> WatcherId {
        let id = self.inner.next_watcher_id.get();
        self.inner.next_watcher_id.set(id + 1);
        self.inner.watchers.borrow_mut().push((id, Rc::new(f)));
        WatcherId(id)
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.inner
            .watchers
            .borrow_mut()
            .retain(|(watcher_id, _)| *watcher_id != id.0);
    }
}

impl<T: Clone + 'static> State<T> {
    pub fn value(&self) -> T {
        self.with(|value| value.clone())
    }

    pub fn get(&self) -> T {
        self.value()
    }
}

/// An ordered observable collection.
///
/// The feed's item sequence. Order is meaningful (it is the scroll order)
/// and pages are merged wholesale at one end: [`StateList::prepend_items`]
/// for feeds growing upward, [`StateList::append_items`] for feeds growing
/// downward. No deduplication is performed at this layer.
#[derive(Clone)]
pub struct StateList<T: Clone + 'static> {
    state: MutableState<Vec<T>>,
}

impl<T: Clone + 'static> StateList<T> {
    pub fn with_runtime<I>(values: I, runtime: RuntimeHandle) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let initial: Vec<T> = values.into_iter().collect();
        Self {
            state: MutableState::with_runtime(initial, runtime),
        }
    }

    pub fn as_mutable_state(&self) -> MutableState<Vec<T>> {
        self.state.clone()
    }

    pub fn len(&self) -> usize {
        self.state.with(|values| values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.state.with(|values| values.clone())
    }

    pub fn get_opt(&self, index: usize) -> Option<T> {
        self.state.with(|values| values.get(index).cloned())
    }

    pub fn first(&self) -> Option<T> {
        self.get_opt(0)
    }

    pub fn last(&self) -> Option<T> {
        self.state.with(|values| values.last().cloned())
    }

    pub fn push(&self, value: T) {
        self.state.update(|values| values.push(value));
    }

    /// Inserts a whole page at the head, preserving the page's own order.
    pub fn prepend_items<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut page: Vec<T> = items.into_iter().collect();
        if page.is_empty() {
            return;
        }
        self.state.update(|values| {
            page.extend(values.drain(..));
            *values = page;
        });
    }

    /// Appends a whole page at the tail.
    pub fn append_items<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.state.update(|values| values.extend(items));
    }

    pub fn watch(&self, f: impl Fn() + 'static) -> WatcherId {
        self.state.watch(f)
    }

    pub fn unwatch(&self, id: WatcherId) {
        self.state.unwatch(id);
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for StateList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state
            .with(|values| f.debug_list().entries(values.iter()).finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DefaultScheduler;
    use crate::Runtime;
    use std::sync::Arc;

    fn test_handle() -> (Runtime, RuntimeHandle) {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let handle = runtime.handle();
        (runtime, handle)
    }

    #[test]
    fn test_set_and_get() {
        let (_runtime, handle) = test_handle();
        let state = MutableState::with_runtime(1u32, handle);
        assert_eq!(state.get(), 1);
        state.set(7);
        assert_eq!(state.get(), 7);
    }

    #[test]
    fn test_watchers_fire_on_every_write() {
        let (_runtime, handle) = test_handle();
        let state = MutableState::with_runtime(0u32, handle);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = Rc::clone(&seen);
        let state_clone = state.clone();
        state.watch(move || seen_clone.borrow_mut().push(state_clone.get()));

        state.set(1);
        state.update(|value| *value += 1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_unwatch_stops_notifications() {
        let (_runtime, handle) = test_handle();
        let state = MutableState::with_runtime(0u32, handle);
        let count = Rc::new(Cell::new(0));

        let count_clone = Rc::clone(&count);
        let id = state.watch(move || count_clone.set(count_clone.get() + 1));
        state.set(1);
        state.unwatch(id);
        state.set(2);

        assert_eq!(count.get(), 1);
        assert_eq!(state.watcher_count(), 0);
    }

    #[test]
    fn test_read_only_view_observes_writes() {
        let (_runtime, handle) = test_handle();
        let state = MutableState::with_runtime("a".to_string(), handle);
        let view = state.as_state();
        let notified = Rc::new(Cell::new(false));

        let notified_clone = Rc::clone(&notified);
        view.watch(move || notified_clone.set(true));
        state.set("b".to_string());

        assert!(notified.get());
        assert_eq!(view.get(), "b");
    }

    #[test]
    fn test_prepend_preserves_page_order() {
        let (_runtime, handle) = test_handle();
        let list = StateList::with_runtime([5, 6, 7], handle);
        list.prepend_items([3, 4]);
        assert_eq!(list.to_vec(), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_append_preserves_page_order() {
        let (_runtime, handle) = test_handle();
        let list = StateList::with_runtime([1, 2, 3], handle);
        list.append_items([4, 5]);
        assert_eq!(list.to_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_prepend_does_not_notify() {
        let (_runtime, handle) = test_handle();
        let list = StateList::with_runtime([1], handle);
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        list.watch(move || count_clone.set(count_clone.get() + 1));
        list.prepend_items(std::iter::empty());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_list_accessors() {
        let (_runtime, handle) = test_handle();
        let list = StateList::with_runtime([10, 20], handle);
        assert!(!list.is_empty());
        assert_eq!(list.first(), Some(10));
        assert_eq!(list.last(), Some(20));
        assert_eq!(list.get_opt(1), Some(20));
        assert_eq!(list.get_opt(5), None);
        list.push(30);
        assert_eq!(list.last(), Some(30));
        assert_eq!(list.len(), 3);
        // The backing cell is shared, not copied.
        list.as_mutable_state().update(|values| values.clear());
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_watch_fires_on_merge() {
        let (_runtime, handle) = test_handle();
        let list = StateList::with_runtime([1, 2], handle);
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let lengths_clone = Rc::clone(&lengths);
        let list_clone = list.clone();
        list.watch(move || lengths_clone.borrow_mut().push(list_clone.len()));

        list.append_items([3]);
        list.prepend_items([0]);
        assert_eq!(*lengths.borrow(), vec![3, 4]);
    }
}
