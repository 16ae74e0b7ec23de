//! Lamport clock driving per-device event ordering.
//!
//! Each device owns one clock. Local events get strictly increasing
//! counters from [`LamportClock::tick`]; stamps learned from remote
//! events are fed to [`LamportClock::observe`] so the next local event
//! is ordered after everything the device has seen.

use sync_types::{DeviceId, LamportStamp};

/// Per-device logical clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LamportClock {
    device: DeviceId,
    counter: u64,
}

impl LamportClock {
    /// Create a fresh clock for a device that has never issued a stamp.
    pub fn new(device: DeviceId) -> Self {
        Self { device, counter: 0 }
    }

    /// Restore a clock from the highest counter this device has on
    /// record (typically recovered by replaying the event log).
    pub fn resume(device: DeviceId, counter: u64) -> Self {
        Self { device, counter }
    }

    /// Advance the clock and stamp a new local event.
    ///
    /// Counters saturate at `u64::MAX`; the event log rejects appends
    /// once the counter can no longer increase.
    pub fn tick(&mut self) -> LamportStamp {
        self.counter = self.counter.saturating_add(1);
        LamportStamp {
            counter: self.counter,
            device: self.device,
        }
    }

    /// Fold a remote stamp into the clock.
    ///
    /// After observing, the next [`tick`](Self::tick) produces a counter
    /// strictly greater than the observed one.
    pub fn observe(&mut self, remote: &LamportStamp) {
        self.counter = self.counter.max(remote.counter);
    }

    /// The highest counter issued or observed so far.
    pub fn current(&self) -> u64 {
        self.counter
    }

    /// Device this clock stamps for.
    pub fn device(&self) -> DeviceId {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_stamp(counter: u64) -> LamportStamp {
        LamportStamp {
            counter,
            device: DeviceId::random(),
        }
    }

    #[test]
    fn tick_is_strictly_increasing() {
        let mut clock = LamportClock::new(DeviceId::random());
        let a = clock.tick();
        let b = clock.tick();
        let c = clock.tick();
        assert!(a.counter < b.counter);
        assert!(b.counter < c.counter);
    }

    #[test]
    fn stamps_carry_the_device() {
        let device = DeviceId::random();
        let mut clock = LamportClock::new(device);
        assert_eq!(clock.tick().device, device);
    }

    #[test]
    fn observe_advances_to_remote_counter() {
        let mut clock = LamportClock::new(DeviceId::random());
        clock.observe(&remote_stamp(50));
        assert_eq!(clock.current(), 50);
    }

    #[test]
    fn observe_ignores_older_stamps() {
        let mut clock = LamportClock::resume(DeviceId::random(), 100);
        clock.observe(&remote_stamp(7));
        assert_eq!(clock.current(), 100);
    }

    #[test]
    fn tick_after_observe_exceeds_remote() {
        let mut clock = LamportClock::new(DeviceId::random());
        clock.observe(&remote_stamp(50));
        assert_eq!(clock.tick().counter, 51);
    }

    #[test]
    fn resume_continues_where_replay_left_off() {
        let device = DeviceId::random();
        let mut clock = LamportClock::resume(device, 12);
        assert_eq!(clock.tick().counter, 13);
    }
}
