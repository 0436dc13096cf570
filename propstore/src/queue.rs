// Worker pool plumbing (§4.4): the two deques (compute tasks, updates) and
// the shared open-jobs counter whose transition to zero releases the
// quiescence latch.
//
// Both deques need prepend *and* append (final results are prepended to
// propagate information early; intermediate results are appended), plus
// blocking pop for idle workers. A `Mutex` + `Condvar` pair gives us both
// without reaching for an async runtime the rest of the store has no
// other use for (§5: "no notion of async/await").

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// A double-ended blocking queue. `push_front` is used for results that
/// should be processed ahead of whatever is already queued (final values);
/// `push_back` for everything else.
pub struct WorkDeque<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    closed: Mutex<bool>,
}

impl<T> WorkDeque<T> {
    pub fn new() -> Self {
        WorkDeque { items: Mutex::new(VecDeque::new()), not_empty: Condvar::new(), closed: Mutex::new(false) }
    }

    pub fn push_front(&self, item: T) {
        self.items.lock().push_front(item);
        self.not_empty.notify_one();
    }

    pub fn push_back(&self, item: T) {
        self.items.lock().push_back(item);
        self.not_empty.notify_one();
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Blocks until an item is available or the queue is closed, in which
    /// case it returns `None` once drained. Used by worker threads during
    /// shutdown (§5: "shutdown interrupts both groups").
    pub fn pop_blocking(&self) -> Option<T> {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if *self.closed.lock() {
                return None;
            }
            self.not_empty.wait(&mut items);
        }
    }

    pub fn close(&self) {
        *self.closed.lock() = true;
        self.not_empty.notify_all();
    }
}

impl<T> Default for WorkDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts in-flight jobs: one per task currently queued or executing, plus
/// one per update currently queued or being dispatched. Fires a one-shot
/// style wakeup (via `Condvar`) every time the count transitions from
/// nonzero to zero; `wait_until_zero` tolerates spurious wakeups.
pub struct JobCounter {
    count: Mutex<u64>,
    zero: Condvar,
}

impl JobCounter {
    pub fn new() -> Self {
        JobCounter { count: Mutex::new(0), zero: Condvar::new() }
    }

    pub fn increment(&self) {
        *self.count.lock() += 1;
    }

    pub fn increment_by(&self, n: u64) {
        if n == 0 {
            return;
        }
        *self.count.lock() += n;
    }

    pub fn decrement(&self) {
        let mut count = self.count.lock();
        debug_assert!(*count > 0, "job counter underflow");
        *count -= 1;
        if *count == 0 {
            self.zero.notify_all();
        }
    }

    pub fn current(&self) -> u64 {
        *self.count.lock()
    }

    pub fn wait_until_zero(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.zero.wait(&mut count);
        }
    }
}

impl Default for JobCounter {
    fn default() -> Self {
        Self::new()
    }
}
