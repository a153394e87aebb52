//! Unbounded multi-producer queue shared between timer tasks and the poller.
//!
//! Producers (the spawner task, the dispatch desk, incident ticks) push from
//! any thread; the frame loop drains everything queued so far without
//! blocking. Once closed the queue silently drops pushes and drains empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
    closed: AtomicBool,
}

pub struct SharedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SharedQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx: Mutex::new(rx),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue an item. Returns `false` if the queue is closed.
    pub fn push(&self, item: T) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.tx.send(item).is_ok()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        if self.is_closed() {
            return items;
        }
        let mut rx = lock(&self.inner.rx);
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.rx).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Permanently disable the queue and discard anything still buffered.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut rx = lock(&self.inner.rx);
        rx.close();
        while rx.try_recv().is_ok() {}
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}
