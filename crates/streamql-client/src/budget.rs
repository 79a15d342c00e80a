//! Requests-in-flight budget shared by every dispatch of an engine.
//!
//! The counter never exceeds its ceiling. A request takes a slot with a
//! lock-free compare-and-swap when one is free. Requests that must wait
//! for a slot (single-response requests and rebalancing streams) first
//! take the admission lock, so at most one of them waits at a time.

use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Bounded counter of requests in flight.
#[derive(Debug)]
pub(crate) struct Budget {
    max: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    admission: Mutex<()>,
    released: Notify,
}

impl Budget {
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            max,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            admission: Mutex::new(()),
            released: Notify::new(),
        })
    }

    /// Takes a slot if one is free.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(current + 1, Ordering::Relaxed);
                    return Some(Permit {
                        budget: Arc::clone(self),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Takes a slot, waiting behind the admission lock when the budget is
    /// saturated.
    pub async fn acquire(self: &Arc<Self>) -> Permit {
        if let Some(permit) = self.try_acquire() {
            return permit;
        }
        let _admission = self.admission.lock().await;
        debug!(
            "Budget saturated ({}/{}), waiting for a slot",
            self.in_flight(),
            self.max
        );
        self.wait_for_slot().await
    }

    /// Takes a slot under the admission lock, even when one is free.
    ///
    /// Used when re-dispatching a rebalanced stream, so that the retry
    /// queues behind requests already waiting for a slot.
    pub async fn reacquire(self: &Arc<Self>) -> Permit {
        let _admission = self.admission.lock().await;
        self.wait_for_slot().await
    }

    async fn wait_for_slot(self: &Arc<Self>) -> Permit {
        loop {
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();
            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            notified.await;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// True when no slot is free.
    pub fn is_saturated(&self) -> bool {
        self.in_flight() >= self.max
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.released.notify_one();
    }
}

/// One slot of the budget, returned when dropped.
#[derive(Debug)]
pub(crate) struct Permit {
    budget: Arc<Budget>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.budget.release();
    }
}
