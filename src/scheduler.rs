//! Cancellable continuous-repaint loop.
//!
//! A [`FrameScheduler`] asks its [`FrameHost`] for one display refresh at a
//! time and re-arms itself after every tick until stopped. Ticks receive no
//! time delta; scenes advance their own clocks by a fixed step.
//!
//! The browser host wraps `requestAnimationFrame`. [`ManualFrameHost`] queues
//! callbacks until [`ManualFrameHost::fire`] is called, which is what the CLI
//! preview and the tests use.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Identifier returned by a host for a pending refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequestId(pub i32);

/// Source of display-refresh notifications.
pub trait FrameHost {
    /// Run `callback` once on the next refresh. `None` if the host cannot schedule
    /// (e.g. the window is gone).
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<FrameRequestId>;

    /// Drop a pending request. Unknown or already-fired ids are ignored.
    fn cancel_frame(&self, id: FrameRequestId);
}

type TickFn = Rc<RefCell<dyn FnMut()>>;
type ResizeFn = Box<dyn FnMut(u32, u32)>;

#[derive(Default)]
struct LoopState {
    running: bool,
    /// Bumped by every start; callbacks from an earlier loop never re-arm.
    generation: u64,
    pending: Option<FrameRequestId>,
    ticks: u64,
}

/// Drives a tick closure once per display refresh.
///
/// Cloning yields another handle onto the same loop.
#[derive(Clone)]
pub struct FrameScheduler {
    host: Rc<dyn FrameHost>,
    state: Rc<RefCell<LoopState>>,
    resize: Rc<RefCell<Option<ResizeFn>>>,
}

impl FrameScheduler {
    pub fn new(host: Rc<dyn FrameHost>) -> Self {
        Self {
            host,
            state: Rc::new(RefCell::new(LoopState::default())),
            resize: Rc::new(RefCell::new(None)),
        }
    }

    /// Begin invoking `tick` on every refresh. A second start while running is ignored.
    pub fn start(&self, tick: impl FnMut() + 'static) {
        let generation = {
            let mut state = self.state.borrow_mut();
            if state.running {
                log::warn!("Frame loop already running; ignoring start");
                return;
            }
            state.running = true;
            state.generation += 1;
            state.generation
        };
        let tick: TickFn = Rc::new(RefCell::new(tick));
        schedule(self.host.clone(), self.state.clone(), tick, generation);
    }

    /// Cancel any pending refresh and prevent further ticks. Idempotent.
    pub fn stop(&self) {
        let pending = {
            let mut state = self.state.borrow_mut();
            state.running = false;
            state.pending.take()
        };
        if let Some(id) = pending {
            self.host.cancel_frame(id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Number of completed ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.state.borrow().ticks
    }

    /// Install the handler run by [`FrameScheduler::notify_resize`], replacing any previous one.
    pub fn on_resize(&self, handler: impl FnMut(u32, u32) + 'static) {
        *self.resize.borrow_mut() = Some(Box::new(handler));
    }

    /// Forward a viewport change to the resize handler. Ignored once stopped.
    pub fn notify_resize(&self, width: u32, height: u32) {
        if !self.is_running() {
            log::debug!("Resize to {}x{} after stop ignored", width, height);
            return;
        }
        if width == 0 || height == 0 {
            log::debug!("Degenerate resize to {}x{}", width, height);
        }
        if let Some(handler) = self.resize.borrow_mut().as_mut() {
            handler(width, height);
        }
    }
}

fn schedule(host: Rc<dyn FrameHost>, state: Rc<RefCell<LoopState>>, tick: TickFn, generation: u64) {
    let callback_host = host.clone();
    let callback_state = state.clone();
    let callback = Box::new(move || {
        {
            let mut s = callback_state.borrow_mut();
            if s.generation != generation {
                return;
            }
            s.pending = None;
            if !s.running {
                return;
            }
        }
        (&mut *tick.borrow_mut())();
        let keep_going = {
            let mut s = callback_state.borrow_mut();
            s.ticks += 1;
            s.running && s.generation == generation
        };
        if keep_going {
            schedule(callback_host, callback_state, tick, generation);
        }
    });

    match host.request_frame(callback) {
        Some(id) => state.borrow_mut().pending = Some(id),
        None => {
            log::warn!("Frame host refused a refresh request; stopping loop");
            state.borrow_mut().running = false;
        }
    }
}

/// Disposer for a running loop plus any listeners registered alongside it.
///
/// Releasing is idempotent and also happens on drop.
pub struct FrameLoopHandle {
    scheduler: FrameScheduler,
    detach: Vec<Box<dyn FnOnce()>>,
    released: bool,
}

impl FrameLoopHandle {
    pub fn new(scheduler: FrameScheduler) -> Self {
        Self {
            scheduler,
            detach: Vec::new(),
            released: false,
        }
    }

    /// Register teardown work, e.g. removing an event listener.
    pub fn on_release(&mut self, detach: impl FnOnce() + 'static) {
        self.detach.push(Box::new(detach));
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop the loop and run every detach callback exactly once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.scheduler.stop();
        for detach in self.detach.drain(..) {
            detach();
        }
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.release();
    }
}

type QueuedFrame = (FrameRequestId, Box<dyn FnOnce()>);

/// Callbacks waiting for a refresh, in request order.
///
/// Cancelling drops the callback straight away, so whatever it captured (the
/// tick, its scene and surface) is released even though it never ran.
#[derive(Default)]
pub struct FrameQueue {
    entries: RefCell<VecDeque<QueuedFrame>>,
}

impl FrameQueue {
    pub fn push(&self, id: FrameRequestId, callback: Box<dyn FnOnce()>) {
        self.entries.borrow_mut().push_back((id, callback));
    }

    /// Run the oldest callback. Returns `false` if nothing was queued.
    pub fn run_next(&self) -> bool {
        let next = self.entries.borrow_mut().pop_front();
        match next {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Remove every queued callback without running it.
    pub fn take_all(&self) -> Vec<QueuedFrame> {
        self.entries.borrow_mut().drain(..).collect()
    }

    /// Drop the callback for `id`. Returns whether it was queued.
    pub fn cancel(&self, id: FrameRequestId) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            let index = entries.iter().position(|(queued, _)| *queued == id);
            index.and_then(|i| entries.remove(i))
        };
        removed.is_some()
    }

    pub fn ids(&self) -> Vec<FrameRequestId> {
        self.entries.borrow().iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Host whose refreshes are triggered explicitly.
#[derive(Default)]
pub struct ManualFrameHost {
    next_id: Cell<i32>,
    queue: FrameQueue,
    detached: Cell<bool>,
}

impl ManualFrameHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Run every callback queued before this call. Returns how many ran.
    pub fn fire(&self) -> usize {
        let due = self.queue.take_all();
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Simulate the host going away: pending work is dropped and new requests refused.
    pub fn detach(&self) {
        self.detached.set(true);
        drop(self.queue.take_all());
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<FrameRequestId> {
        if self.detached.get() {
            return None;
        }
        let id = FrameRequestId(self.next_id.get());
        self.next_id.set(self.next_id.get().wrapping_add(1));
        self.queue.push(id, callback);
        Some(id)
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        self.queue.cancel(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_loop() -> (Rc<ManualFrameHost>, FrameScheduler, Rc<Cell<u32>>) {
        let host = ManualFrameHost::new();
        let scheduler = FrameScheduler::new(host.clone());
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        scheduler.start(move || c.set(c.get() + 1));
        (host, scheduler, count)
    }

    #[test]
    fn test_ticks_once_per_refresh() {
        let (host, scheduler, count) = counting_loop();
        assert_eq!(count.get(), 0);
        assert_eq!(host.pending(), 1);
        for _ in 0..5 {
            assert_eq!(host.fire(), 1);
        }
        assert_eq!(count.get(), 5);
        assert_eq!(scheduler.ticks(), 5);
        assert_eq!(host.pending(), 1);
    }

    #[test]
    fn test_stop_cancels_and_is_idempotent() {
        let (host, scheduler, count) = counting_loop();
        host.fire();
        scheduler.stop();
        assert_eq!(host.pending(), 0);
        scheduler.stop();
        scheduler.stop();
        host.fire();
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_stop_after_host_destroyed() {
        let (host, scheduler, count) = counting_loop();
        host.detach();
        scheduler.stop();
        scheduler.stop();
        assert_eq!(host.fire(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_stop_from_inside_tick() {
        let host = ManualFrameHost::new();
        let scheduler = FrameScheduler::new(host.clone());
        let inner = scheduler.clone();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        scheduler.start(move || {
            c.set(c.get() + 1);
            inner.stop();
        });
        host.fire();
        host.fire();
        assert_eq!(count.get(), 1);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_restart_from_inside_tick_retires_old_loop() {
        let host = ManualFrameHost::new();
        let scheduler = FrameScheduler::new(host.clone());
        let inner = scheduler.clone();
        let old = Rc::new(Cell::new(0));
        let new = Rc::new(Cell::new(0));
        let (o, n) = (old.clone(), new.clone());
        scheduler.start(move || {
            o.set(o.get() + 1);
            inner.stop();
            let n = n.clone();
            inner.start(move || n.set(n.get() + 1));
        });
        host.fire();
        assert_eq!(host.pending(), 1);
        for _ in 0..3 {
            assert_eq!(host.fire(), 1);
        }
        assert_eq!(old.get(), 1);
        assert_eq!(new.get(), 3);

        scheduler.stop();
        assert_eq!(host.pending(), 0);
        assert_eq!(host.fire(), 0);
        assert_eq!(new.get(), 3);
    }

    #[test]
    fn test_stop_releases_captured_state() {
        let host = ManualFrameHost::new();
        let scheduler = FrameScheduler::new(host.clone());
        let scene = Rc::new(Cell::new(0));
        let captured = scene.clone();
        scheduler.start(move || captured.set(captured.get() + 1));
        host.fire();
        assert_eq!(Rc::strong_count(&scene), 2);

        scheduler.stop();
        assert_eq!(Rc::strong_count(&scene), 1);
    }

    #[test]
    fn test_queue_runs_in_request_order_and_cancel_drops() {
        let queue = FrameQueue::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        for id in 0..3 {
            let o = order.clone();
            queue.push(FrameRequestId(id), Box::new(move || o.borrow_mut().push(id)));
        }
        assert!(queue.cancel(FrameRequestId(1)));
        assert!(!queue.cancel(FrameRequestId(1)));
        assert_eq!(queue.ids(), vec![FrameRequestId(0), FrameRequestId(2)]);
        assert_eq!(Rc::strong_count(&order), 3);

        while queue.run_next() {}
        assert_eq!(*order.borrow(), vec![0, 2]);
        assert!(queue.is_empty());
        assert_eq!(Rc::strong_count(&order), 1);
    }

    #[test]
    fn test_refused_request_stops_loop() {
        let host = ManualFrameHost::new();
        host.detach();
        let scheduler = FrameScheduler::new(host.clone());
        scheduler.start(|| {});
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_resize_handler_runs_between_ticks() {
        let (host, scheduler, _count) = counting_loop();
        let seen = Rc::new(Cell::new((0, 0)));
        let s = seen.clone();
        scheduler.on_resize(move |w, h| s.set((w, h)));
        scheduler.notify_resize(640, 0);
        assert_eq!(seen.get(), (640, 0));
        host.fire();
        scheduler.stop();
        scheduler.notify_resize(1, 1);
        assert_eq!(seen.get(), (640, 0));
    }

    #[test]
    fn test_handle_releases_once() {
        let (host, scheduler, _count) = counting_loop();
        let detached = Rc::new(Cell::new(0));
        let d = detached.clone();
        let mut handle = FrameLoopHandle::new(scheduler);
        handle.on_release(move || d.set(d.get() + 1));
        handle.release();
        handle.release();
        drop(handle);
        assert_eq!(detached.get(), 1);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_handle_drop_stops_loop() {
        let (host, scheduler, count) = counting_loop();
        {
            let _handle = FrameLoopHandle::new(scheduler.clone());
        }
        host.fire();
        assert_eq!(count.get(), 0);
        assert!(!scheduler.is_running());
    }
}
