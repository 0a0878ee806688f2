//! Blocking iterator over control point change events
//!
//! Provides the iteration patterns hosts need when draining events:
//! - Blocking: `recv()`, `for event in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::event::ChangeEvent;

/// Blocking iterator over change events
///
/// All clones of a store share one receiver, so each event is delivered
/// to exactly one consumer.
pub struct ChangeIterator<Id> {
    rx: Arc<Mutex<mpsc::Receiver<ChangeEvent<Id>>>>,
}

impl<Id> ChangeIterator<Id> {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ChangeEvent<Id>>>>) -> Self {
        Self { rx }
    }

    /// Block until the next event is available
    ///
    /// Returns `None` if the channel is closed.
    pub fn recv(&self) -> Option<ChangeEvent<Id>> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Block until the next event or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent<Id>> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<ChangeEvent<Id>> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Non-blocking iterator over the events currently queued
    ///
    /// Events emitted while the iterator is being consumed are yielded too,
    /// which lets a caller drain a cascade of echoes in one loop.
    pub fn try_iter(&self) -> TryIter<'_, Id> {
        TryIter { inner: self }
    }

    /// Blocking iterator that stops once `timeout` passes without an event
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_, Id> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl<Id> Iterator for ChangeIterator<Id> {
    type Item = ChangeEvent<Id>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIter<'a, Id> {
    inner: &'a ChangeIterator<Id>,
}

impl<Id> Iterator for TryIter<'_, Id> {
    type Item = ChangeEvent<Id>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a, Id> {
    inner: &'a ChangeIterator<Id>,
    timeout: Duration,
}

impl<Id> Iterator for TimeoutIter<'_, Id> {
    type Item = ChangeEvent<Id>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeKind;
    use crate::value::ControlValue;
    use std::thread;
    use std::time::Instant;

    fn channel() -> (mpsc::Sender<ChangeEvent<String>>, ChangeIterator<String>) {
        let (tx, rx) = mpsc::channel();
        (tx, ChangeIterator::new(Arc::new(Mutex::new(rx))))
    }

    fn event() -> ChangeEvent<String> {
        ChangeEvent::new(
            "RINCON_A_volume".to_string(),
            ChangeKind::Updated,
            ControlValue::Number(30.0),
        )
    }

    #[test]
    fn test_try_recv_empty() {
        let (_tx, iter) = channel();
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_try_iter_drains_queue() {
        let (tx, iter) = channel();
        for _ in 0..3 {
            tx.send(event()).unwrap();
        }

        assert_eq!(iter.try_iter().count(), 3);
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout_expires() {
        let (_tx, iter) = channel();
        let start = Instant::now();
        assert!(iter.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_blocking_recv_from_other_thread() {
        let (tx, iter) = channel();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(event()).unwrap();
        });

        let received = iter.recv().unwrap();
        assert_eq!(received.entity_id, "RINCON_A_volume");
    }

    #[test]
    fn test_channel_closed() {
        let (tx, iter) = channel();
        drop(tx);
        assert!(iter.recv().is_none());
    }
}
