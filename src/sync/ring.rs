//! Bounded single-producer/single-consumer ring queue
//!
//! Decouples a decoder thread from its scheduler without locking on the fast
//! path. Backing storage is `capacity + 1` slots so `head == tail` means
//! empty and `(tail + 1) % size == head` means full, with only the two
//! indices shared between threads.
//!
//! The queue is split into a [`Producer`] and a [`Consumer`] endpoint at
//! construction; neither is cloneable, so the single-producer/single-consumer
//! discipline is enforced by the type system rather than by convention.
//! Pushing into a full ring hands the item back instead of overwriting
//! unread data; pacing remains the producer side's responsibility.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Returned by [`Producer::push`] when the ring is full, handing the item back
#[derive(Debug)]
pub struct RingFull<T>(pub T);

impl<T> std::fmt::Display for RingFull<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ring queue full")
    }
}

struct Shared<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Consumer index; next slot to read
    head: AtomicUsize,
    /// Producer index; next slot to write
    tail: AtomicUsize,
    closed: AtomicBool,
}

// Safety: slot access is partitioned by the head/tail indices. The producer
// only writes slots in [tail, head) (mod size) and publishes them with a
// release store on tail; the consumer only reads slots in [head, tail) after
// an acquire load of tail. Exactly one endpoint of each kind exists.
unsafe impl<T: Send> Sync for Shared<T> {}
unsafe impl<T: Send> Send for Shared<T> {}

impl<T> Shared<T> {
    fn size(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + self.size() - head) % self.size()
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Both endpoints are gone; drop whatever is still live.
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe {
                (*self.slots[head].get()).assume_init_drop();
            }
            head = (head + 1) % self.slots.len();
        }
    }
}

/// Producer endpoint of a bounded SPSC ring queue
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer endpoint of a bounded SPSC ring queue
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a bounded SPSC ring queue with `capacity` usable slots
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring queue capacity must be non-zero");

    let slots = (0..capacity + 1)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        slots,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    });

    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

impl<T> Producer<T> {
    /// Push an item, failing when the ring is full
    ///
    /// The producer is expected to pace itself via [`Producer::is_full`];
    /// a rejected item is handed back untouched.
    pub fn push(&mut self, item: T) -> Result<(), RingFull<T>> {
        let shared = &self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % shared.size();

        if next == shared.head.load(Ordering::Acquire) {
            return Err(RingFull(item));
        }

        unsafe {
            (*shared.slots[tail].get()).write(item);
        }
        shared.tail.store(next, Ordering::Release);
        Ok(())
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// True when no live items remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a push would be rejected
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Usable slot count
    pub fn capacity(&self) -> usize {
        self.shared.size() - 1
    }

    /// Signal end-of-stream to the consumer
    pub fn close(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    /// True when either endpoint has closed the queue
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

impl<T> Consumer<T> {
    /// Borrow the oldest unread item without removing it
    pub fn peek(&self) -> Option<&T> {
        let shared = &self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        if head == shared.tail.load(Ordering::Acquire) {
            return None;
        }
        // Safety: the slot at head was published by the producer's release
        // store on tail; the producer will not touch it again until head
        // advances, and only this endpoint advances head.
        unsafe { Some((*shared.slots[head].get()).assume_init_ref()) }
    }

    /// Take the oldest unread item
    pub fn pop(&mut self) -> Option<T> {
        let shared = &self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        if head == shared.tail.load(Ordering::Acquire) {
            return None;
        }
        let item = unsafe { (*shared.slots[head].get()).assume_init_read() };
        shared.head.store((head + 1) % shared.size(), Ordering::Release);
        Some(item)
    }

    /// Drain and drop all live items
    ///
    /// Stop-time bulk cleanup; payload resources are released through `Drop`.
    /// Requires `&mut self`, so it cannot race this endpoint's own reads.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// True when no live items remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usable slot count
    pub fn capacity(&self) -> usize {
        self.shared.size() - 1
    }

    /// True when the producer has signaled end-of-stream or been dropped
    ///
    /// Items already in the ring remain readable after close.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let (mut tx, mut rx) = bounded::<u32>(8);

        for v in [10, 20, 30] {
            tx.push(v).unwrap();
        }
        assert_eq!(rx.pop(), Some(10));
        assert_eq!(rx.pop(), Some(20));
        assert_eq!(rx.pop(), Some(30));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_capacity_three_interleave() {
        // Push A,B,C (full), pop A, push D (full again), pop B,C,D, empty.
        let (mut tx, mut rx) = bounded::<char>(3);

        tx.push('A').unwrap();
        tx.push('B').unwrap();
        tx.push('C').unwrap();
        assert!(tx.is_full());

        assert_eq!(rx.pop(), Some('A'));
        tx.push('D').unwrap();
        assert!(tx.is_full());

        assert_eq!(rx.pop(), Some('B'));
        assert_eq!(rx.pop(), Some('C'));
        assert_eq!(rx.pop(), Some('D'));
        assert!(rx.is_empty());
        assert!(!tx.is_full());
    }

    #[test]
    fn test_push_full_hands_item_back() {
        let (mut tx, rx) = bounded::<String>(1);

        tx.push("first".into()).unwrap();
        let rejected = tx.push("second".into()).unwrap_err();
        assert_eq!(rejected.0, "second");

        drop(rx);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (mut tx, mut rx) = bounded::<u32>(4);
        assert!(rx.peek().is_none());

        tx.push(7).unwrap();
        assert_eq!(rx.peek(), Some(&7));
        assert_eq!(rx.peek(), Some(&7));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.pop(), Some(7));
    }

    #[test]
    fn test_clear_drops_items() {
        let (mut tx, mut rx) = bounded::<Vec<u8>>(4);
        tx.push(vec![1]).unwrap();
        tx.push(vec![2]).unwrap();

        rx.clear();
        assert!(rx.is_empty());
        assert!(!tx.is_full());
    }

    #[test]
    fn test_close_signals_end_of_stream() {
        let (mut tx, mut rx) = bounded::<u32>(4);
        tx.push(1).unwrap();
        tx.close();

        // Items already queued remain readable after close.
        assert!(rx.is_closed());
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_dropping_producer_closes() {
        let (tx, rx) = bounded::<u32>(4);
        drop(tx);
        assert!(rx.is_closed());
    }

    #[test]
    fn test_cross_thread_transfer() {
        let (mut tx, mut rx) = bounded::<u64>(16);
        const COUNT: u64 = 10_000;

        let producer = std::thread::spawn(move || {
            for v in 0..COUNT {
                loop {
                    match tx.push(v) {
                        Ok(()) => break,
                        Err(RingFull(_)) => std::thread::yield_now(),
                    }
                }
            }
        });

        let mut expected = 0u64;
        while expected < COUNT {
            match rx.pop() {
                Some(v) => {
                    assert_eq!(v, expected);
                    expected += 1;
                }
                None => std::thread::yield_now(),
            }
        }

        producer.join().unwrap();
        assert!(rx.is_empty());
    }
}
