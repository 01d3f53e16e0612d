use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounded counting semaphore gating every outgoing fetch independent of
/// domain (spec.md §4.2 item 2, default `MAX_CONCURRENT_REQUESTS = 3`).
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    capacity: usize,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_flight: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Acquires one slot. The returned guard releases the slot on drop.
    pub async fn acquire(&self) -> GateGuard<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("concurrency gate semaphore is never closed");
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        GateGuard {
            _permit: permit,
            in_flight: &self.in_flight,
            peak_recorder: in_flight,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn current_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn queue_length(&self) -> usize {
        self.current_in_flight().saturating_sub(self.capacity)
    }
}

pub struct GateGuard<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
    peak_recorder: usize,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.peak_recorder;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_capacity() {
        let gate = Arc::new(ConcurrencyGate::new(3));
        let max_observed = Arc::new(StdAtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let gate = gate.clone();
            let max_observed = max_observed.clone();
            handles.push(tokio::spawn(async move {
                let _guard = gate.acquire().await;
                let current = gate.current_in_flight();
                max_observed.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_observed.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn guard_release_frees_slot() {
        let gate = ConcurrencyGate::new(1);
        {
            let _guard = gate.acquire().await;
            assert_eq!(gate.current_in_flight(), 1);
        }
        assert_eq!(gate.current_in_flight(), 0);
    }
}
