//! At-most-one-in-flight guard for user-triggered operations

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

/// Held for the duration of the operation; releases on drop.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    busy: &'a AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another caller already holds the guard.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_rejected_until_release() {
        let flight = SingleFlight::new();

        let guard = flight.try_begin();
        assert!(guard.is_some());
        assert!(flight.try_begin().is_none());
        assert!(flight.is_busy());

        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }
}
