//! Serial execution context for feed state.
//!
//! All observable state in Lazyfeed is owned by a single logical UI thread.
//! The [`Runtime`] holds that thread's work queues; [`RuntimeHandle`] is the
//! cheap clonable entry point used by controllers and collaborators. Work
//! arrives on three paths:
//!
//! - [`RuntimeHandle::enqueue_ui_task`] for same-thread closures,
//! - [`RuntimeHandle::post_ui`] for closures sent from other threads,
//! - [`RuntimeHandle::spawn_ui`] for futures polled cooperatively on the
//!   UI thread between drains.
//!
//! The host calls [`RuntimeHandle::drain_ui`] whenever the scheduler asks
//! for a frame; everything queued runs there, serialized, with no locks
//! around state.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::task::{Context, Poll, Waker};
use std::thread::ThreadId;

use crate::platform::RuntimeScheduler;

type UiTask = Box<dyn FnOnce() + Send + 'static>;

struct UiDispatcherInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    tx: mpsc::Sender<UiTask>,
    pending: AtomicUsize,
}

impl UiDispatcherInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, tx: mpsc::Sender<UiTask>) -> Self {
        Self {
            scheduler,
            tx,
            pending: AtomicUsize::new(0),
        }
    }

    fn post(&self, task: UiTask) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(task);
        self.scheduler.schedule_frame();
    }

    fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }
}

struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        Self { counter }
    }
}

impl<'a> Drop for PendingGuard<'a> {
    fn drop(&mut self) {
        let previous = self.counter.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "UI dispatcher pending count underflowed");
    }
}

/// Cross-thread entry point into the UI queue.
///
/// Unlike [`RuntimeHandle`], a dispatcher holds no `Rc` into the runtime,
/// so it is `Send + Sync` and may be handed to background transports
/// (page fetchers, geometry observers) that deliver results from worker
/// threads.
#[derive(Clone)]
pub struct UiDispatcher {
    inner: Arc<UiDispatcherInner>,
}

impl UiDispatcher {
    fn new(inner: Arc<UiDispatcherInner>) -> Self {
        Self { inner }
    }

    /// Posts a closure from any thread to run on the UI thread.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.inner.post(Box::new(task));
    }

    /// Whether posted work is still waiting to be drained.
    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }
}

struct TaskEntry {
    id: u64,
    future: Pin<Box<dyn Future<Output = ()> + 'static>>,
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    ui_dispatcher: Arc<UiDispatcherInner>,
    ui_rx: RefCell<mpsc::Receiver<UiTask>>,
    local_tasks: RefCell<VecDeque<Box<dyn FnOnce() + 'static>>>,
    tasks: RefCell<Vec<TaskEntry>>,
    next_task_id: Cell<u64>,
    task_waker: RefCell<Option<Waker>>,
    ui_thread_id: ThreadId,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        let (tx, rx) = mpsc::channel();
        let dispatcher = Arc::new(UiDispatcherInner::new(scheduler.clone(), tx));
        Self {
            scheduler,
            ui_dispatcher: dispatcher,
            ui_rx: RefCell::new(rx),
            local_tasks: RefCell::new(VecDeque::new()),
            tasks: RefCell::new(Vec::new()),
            next_task_id: Cell::new(1),
            task_waker: RefCell::new(None),
            ui_thread_id: std::thread::current().id(),
        }
    }

    fn init_task_waker(this: &Rc<Self>) {
        let waker = RuntimeTaskWaker::new(Rc::downgrade(this)).into_waker();
        *this.task_waker.borrow_mut() = Some(waker);
    }

    fn schedule(&self) {
        self.scheduler.schedule_frame();
    }

    /// Queues a closure bound to the UI thread's local queue.
    ///
    /// The closure may capture `Rc`/`RefCell` values because it never
    /// leaves the runtime thread. Callers must only invoke this from the
    /// runtime thread.
    fn enqueue_ui_task(&self, task: Box<dyn FnOnce() + 'static>) {
        self.local_tasks.borrow_mut().push_back(task);
        self.schedule();
    }

    fn spawn_ui_task(&self, future: Pin<Box<dyn Future<Output = ()> + 'static>>) -> u64 {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.tasks.borrow_mut().push(TaskEntry { id, future });
        self.schedule();
        id
    }

    fn cancel_task(&self, id: u64) {
        self.tasks.borrow_mut().retain(|entry| entry.id != id);
    }

    fn poll_async_tasks(&self) -> bool {
        let waker = match self.task_waker.borrow().as_ref() {
            Some(waker) => waker.clone(),
            None => return false,
        };
        let mut cx = Context::from_waker(&waker);
        // Take the task list so polled futures may spawn or cancel tasks
        // without re-entrant borrows.
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let mut pending = Vec::with_capacity(tasks.len());
        let mut made_progress = false;
        for mut entry in tasks.into_iter() {
            match entry.future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    made_progress = true;
                }
                Poll::Pending => {
                    pending.push(entry);
                }
            }
        }
        if !pending.is_empty() {
            self.tasks.borrow_mut().extend(pending);
        }
        made_progress
    }

    fn drain_ui(&self) {
        loop {
            let mut executed = false;

            {
                let rx = &mut *self.ui_rx.borrow_mut();
                for task in rx.try_iter() {
                    executed = true;
                    let _guard = PendingGuard::new(&self.ui_dispatcher.pending);
                    task();
                }
            }

            loop {
                let task = self.local_tasks.borrow_mut().pop_front();
                match task {
                    Some(task) => {
                        executed = true;
                        task();
                    }
                    None => break,
                }
            }

            if self.poll_async_tasks() {
                executed = true;
            }

            if !executed {
                break;
            }
        }
    }

    fn has_pending_ui(&self) -> bool {
        let local_pending = self
            .local_tasks
            .try_borrow()
            .map(|tasks| !tasks.is_empty())
            .unwrap_or(true);

        let async_pending = self
            .tasks
            .try_borrow()
            .map(|tasks| !tasks.is_empty())
            .unwrap_or(true);

        local_pending || async_pending || self.ui_dispatcher.has_pending()
    }
}

/// Owns the UI thread's work queues.
///
/// Create one per UI thread and keep it alive for the lifetime of the
/// host loop; hand [`RuntimeHandle`]s to everything else.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        let inner = Rc::new(RuntimeInner::new(scheduler));
        RuntimeInner::init_task_waker(&inner);
        Self { inner }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
            dispatcher: UiDispatcher::new(self.inner.ui_dispatcher.clone()),
            ui_thread_id: self.inner.ui_thread_id,
        }
    }
}

/// Weak, clonable handle to a [`Runtime`].
///
/// Handles outliving their runtime degrade gracefully: queued work is
/// dropped or run inline, spawns return `None`.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RuntimeInner>,
    dispatcher: UiDispatcher,
    ui_thread_id: ThreadId,
}

/// Cancellation handle for a future spawned with [`RuntimeHandle::spawn_ui`].
pub struct TaskHandle {
    id: u64,
    runtime: RuntimeHandle,
}

impl RuntimeHandle {
    /// Asks the host scheduler for another drain.
    pub fn schedule(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.schedule();
        }
    }

    /// Schedules work that must run on the runtime thread.
    ///
    /// The closure executes when the runtime next drains its local queue,
    /// so it may capture `Rc`/`RefCell` values. Calling this from any
    /// other thread is a logic error.
    pub fn enqueue_ui_task(&self, task: Box<dyn FnOnce() + 'static>) {
        if let Some(inner) = self.inner.upgrade() {
            inner.enqueue_ui_task(task);
        } else {
            log::debug!("runtime dropped; running UI task inline");
            task();
        }
    }

    /// Spawns a future polled cooperatively on the UI thread.
    ///
    /// The future may capture non-`Send` state because it never leaves the
    /// runtime thread. Returns `None` if the runtime has shut down.
    pub fn spawn_ui<F>(&self, fut: F) -> Option<TaskHandle>
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.upgrade().map(|inner| {
            let id = inner.spawn_ui_task(Box::pin(fut));
            TaskHandle {
                id,
                runtime: self.clone(),
            }
        })
    }

    pub fn cancel_task(&self, id: u64) {
        if let Some(inner) = self.inner.upgrade() {
            inner.cancel_task(id);
        }
    }

    /// Posts work from any thread to run on the UI thread.
    ///
    /// The closure must be `Send` because it crosses threads before
    /// executing on the runtime thread.
    pub fn post_ui(&self, task: impl FnOnce() + Send + 'static) {
        self.dispatcher.post(task);
    }

    /// Runs everything currently queued: cross-thread posts, local tasks,
    /// and one poll pass over spawned futures, repeating until quiescent.
    pub fn drain_ui(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.drain_ui();
        }
    }

    pub fn has_pending_ui(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_pending_ui())
            .unwrap_or_else(|| self.dispatcher.has_pending())
    }

    pub fn assert_ui_thread(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.ui_thread_id,
            "state mutated off the runtime's UI thread"
        );
    }

    pub fn dispatcher(&self) -> UiDispatcher {
        self.dispatcher.clone()
    }
}

impl TaskHandle {
    /// Cancels the task. A cancelled future is dropped and never polled
    /// again, so none of its remaining effects run.
    pub fn cancel(self) {
        self.runtime.cancel_task(self.id);
    }
}

struct RuntimeTaskWaker {
    scheduler: Arc<dyn RuntimeScheduler>,
}

impl RuntimeTaskWaker {
    fn new(inner: Weak<RuntimeInner>) -> Self {
        // Extract the Arc<RuntimeScheduler>, which is Send + Sync, so the
        // waker can wake the runtime without holding the Rc::Weak.
        let scheduler = inner
            .upgrade()
            .map(|rc| rc.scheduler.clone())
            .expect("RuntimeInner dropped before waker created");
        Self { scheduler }
    }

    fn into_waker(self) -> Waker {
        futures_task::waker(Arc::new(self))
    }
}

impl futures_task::ArcWake for RuntimeTaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.scheduler.schedule_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DefaultScheduler;
    use std::cell::Cell;
    use std::sync::atomic::AtomicBool;

    fn test_runtime() -> Runtime {
        Runtime::new(Arc::new(DefaultScheduler))
    }

    #[test]
    fn test_enqueue_ui_task_runs_on_drain() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        handle.enqueue_ui_task(Box::new(move || ran_clone.set(true)));
        assert!(!ran.get());
        assert!(handle.has_pending_ui());
        handle.drain_ui();
        assert!(ran.get());
        assert!(!handle.has_pending_ui());
    }

    #[test]
    fn test_spawn_ui_completes_on_drain() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let done = Rc::new(Cell::new(false));
        let done_clone = Rc::clone(&done);
        handle
            .spawn_ui(async move {
                done_clone.set(true);
            })
            .expect("runtime alive");
        handle.drain_ui();
        assert!(done.get());
    }

    #[test]
    fn test_cancelled_task_never_completes() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let done = Rc::new(Cell::new(false));
        let done_clone = Rc::clone(&done);
        let task = handle
            .spawn_ui(async move {
                done_clone.set(true);
            })
            .expect("runtime alive");
        task.cancel();
        handle.drain_ui();
        assert!(!done.get());
    }

    #[test]
    fn test_post_ui_crosses_threads() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let observed = Arc::new(AtomicBool::new(false));

        let dispatcher = handle.dispatcher();
        let observed_for_thread = Arc::clone(&observed);
        let worker = std::thread::spawn(move || {
            dispatcher.post(move || {
                observed_for_thread.store(true, Ordering::SeqCst);
            });
        });
        worker.join().expect("worker thread panicked");

        assert!(!observed.load(Ordering::SeqCst));
        handle.drain_ui();
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_post_ui_routes_through_dispatcher() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        handle.post_ui(move || ran_clone.store(true, Ordering::SeqCst));
        assert!(handle.has_pending_ui());
        handle.drain_ui();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pending_future_survives_drain() {
        let runtime = test_runtime();
        let handle = runtime.handle();
        let resolved = Rc::new(Cell::new(false));
        let gate = Rc::new(Cell::new(false));

        let gate_clone = Rc::clone(&gate);
        let resolved_clone = Rc::clone(&resolved);
        handle
            .spawn_ui(async move {
                std::future::poll_fn(move |_cx| {
                    if gate_clone.get() {
                        Poll::Ready(())
                    } else {
                        Poll::Pending
                    }
                })
                .await;
                resolved_clone.set(true);
            })
            .expect("runtime alive");

        handle.drain_ui();
        assert!(!resolved.get());
        assert!(handle.has_pending_ui());

        gate.set(true);
        handle.drain_ui();
        assert!(resolved.get());
        assert!(!handle.has_pending_ui());
    }

    #[test]
    fn test_handle_outliving_runtime_runs_task_inline() {
        let handle = {
            let runtime = test_runtime();
            runtime.handle()
        };
        let ran = Rc::new(Cell::new(false));
        let ran_clone = Rc::clone(&ran);
        handle.enqueue_ui_task(Box::new(move || ran_clone.set(true)));
        assert!(ran.get());
        assert!(handle.spawn_ui(async {}).is_none());
    }
}
