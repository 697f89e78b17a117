//! Logical-time timer wheel for gameplay effects.
//!
//! Sources, towers, the town hall, the player and the wave manager all act on
//! intervals. Instead of each owning a callback, they register an action value
//! here and a single driver dispatches whatever is due. Dispatch order is the
//! due time, then registration order, so a run is fully reproducible.
//!
//! ## Usage
//! ```ignore
//! scheduler.advance(dt);
//! while let Some((handle, action)) = scheduler.next_due() {
//!     // act; may schedule or cancel other timers
//! }
//! ```

use std::fmt;

/// Shortest interval a repeating timer may use. Prevents a zero interval
/// from firing forever within one advance.
pub const MIN_TIMER_INTERVAL: f64 = 1.0 / 60.0;

/// Slack when comparing due times against the advance horizon.
const DUE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u32);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct TimerEntry<A> {
    handle: TimerHandle,
    due: f64,
    interval: f64,
    looping: bool,
    /// Registration order, used to break ties between equal due times.
    order: u64,
    action: A,
}

#[derive(Debug, Clone)]
pub struct EffectScheduler<A> {
    now: f64,
    horizon: f64,
    next_handle: u32,
    next_order: u64,
    timers: Vec<TimerEntry<A>>,
}

impl<A> Default for EffectScheduler<A> {
    fn default() -> Self {
        Self {
            now: 0.0,
            horizon: 0.0,
            next_handle: 0,
            next_order: 0,
            timers: Vec::new(),
        }
    }
}

impl<A: Clone> EffectScheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Fires `action` every `interval` seconds, first after one interval.
    pub fn schedule_repeating(&mut self, interval: f32, action: A) -> TimerHandle {
        self.insert(interval as f64, true, action)
    }

    /// Fires `action` once after `delay` seconds.
    pub fn schedule_once(&mut self, delay: f32, action: A) -> TimerHandle {
        self.insert(delay as f64, false, action)
    }

    fn insert(&mut self, interval: f64, looping: bool, action: A) -> TimerHandle {
        let interval = if interval.is_finite() {
            interval.max(MIN_TIMER_INTERVAL)
        } else {
            MIN_TIMER_INTERVAL
        };
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        let order = self.next_order;
        self.next_order += 1;

        log::trace!(
            "[SCHEDULER] {} armed for {:.3}s (repeating: {})",
            handle,
            interval,
            looping
        );
        self.timers.push(TimerEntry {
            handle,
            due: self.now + interval,
            interval,
            looping,
            order,
            action,
        });
        handle
    }

    /// Stops a timer. Returns false if it was not live.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        before != self.timers.len()
    }

    /// Cancels the timer in `slot`, if any, and empties the slot.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    /// Seconds until the timer next fires.
    pub fn remaining(&self, handle: TimerHandle) -> Option<f32> {
        self.timers
            .iter()
            .find(|t| t.handle == handle)
            .map(|t| (t.due - self.now).max(0.0) as f32)
    }

    /// Moves the horizon forward. Due timers are then drained with
    /// [`next_due`](Self::next_due).
    pub fn advance(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.horizon += dt as f64;
        }
    }

    /// Pops the earliest timer due at or before the horizon and moves the
    /// clock to its due time. Repeating timers are re-armed. Returns `None`
    /// once nothing more is due, leaving the clock at the horizon.
    pub fn next_due(&mut self) -> Option<(TimerHandle, A)> {
        let position = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= self.horizon + DUE_EPSILON)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.order.cmp(&b.order)))
            .map(|(i, _)| i);

        let Some(position) = position else {
            self.now = self.horizon;
            return None;
        };

        let entry = &mut self.timers[position];
        self.now = self.now.max(entry.due);
        let handle = entry.handle;

        if entry.looping {
            entry.due += entry.interval;
            Some((handle, entry.action.clone()))
        } else {
            let entry = self.timers.swap_remove(position);
            Some((handle, entry.action))
        }
    }

    /// Advances and collects everything due, without interleaving.
    pub fn drain_due(&mut self, dt: f32) -> Vec<(TimerHandle, A)> {
        self.advance(dt);
        std::iter::from_fn(|| self.next_due()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Tick {
        A,
        B,
        Once,
    }

    #[test]
    fn test_repeating_timer_fires_each_interval() {
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule_repeating(0.5, Tick::A);

        assert!(scheduler.drain_due(0.25).is_empty());
        assert_eq!(scheduler.drain_due(0.25).len(), 1);
        assert_eq!(scheduler.drain_due(2.0).len(), 4);
    }

    #[test]
    fn test_order_by_due_time_then_registration() {
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule_repeating(1.0, Tick::A);
        scheduler.schedule_repeating(0.5, Tick::B);
        scheduler.schedule_once(1.0, Tick::Once);

        let fired: Vec<Tick> = scheduler
            .drain_due(1.0)
            .into_iter()
            .map(|(_, action)| action)
            .collect();
        assert_eq!(fired, vec![Tick::B, Tick::A, Tick::B, Tick::Once]);
    }

    #[test]
    fn test_once_timer_is_removed_after_firing() {
        let mut scheduler = EffectScheduler::new();
        let handle = scheduler.schedule_once(0.2, Tick::Once);
        assert!(scheduler.is_active(handle));
        scheduler.drain_due(1.0);
        assert!(!scheduler.is_active(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_stops_timer() {
        let mut scheduler = EffectScheduler::new();
        let handle = scheduler.schedule_repeating(0.1, Tick::A);
        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.drain_due(1.0).is_empty());

        let mut slot = Some(scheduler.schedule_once(1.0, Tick::B));
        scheduler.cancel_slot(&mut slot);
        assert!(slot.is_none());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut scheduler = EffectScheduler::new();
        let handle = scheduler.schedule_once(30.0, Tick::Once);
        scheduler.drain_due(12.0);
        let remaining = scheduler.remaining(handle).unwrap();
        assert!((remaining - 18.0).abs() < 1e-4);
    }

    #[test]
    fn test_timer_scheduled_during_dispatch_uses_dispatch_time() {
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule_once(1.0, Tick::A);
        scheduler.advance(2.0);

        let (_, first) = scheduler.next_due().unwrap();
        assert_eq!(first, Tick::A);
        assert!((scheduler.now() - 1.0).abs() < 1e-9);

        // Due at 1.5, still inside this advance.
        scheduler.schedule_once(0.5, Tick::B);
        let (_, second) = scheduler.next_due().unwrap();
        assert_eq!(second, Tick::B);
        assert!(scheduler.next_due().is_none());
        assert!((scheduler.now() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut scheduler = EffectScheduler::new();
        scheduler.schedule_repeating(0.0, Tick::A);
        let fired = scheduler.drain_due(1.0);
        assert_eq!(fired.len(), 60);
    }

    #[test]
    fn test_many_small_steps_match_one_large_step() {
        let mut stepped = EffectScheduler::new();
        let mut single = EffectScheduler::new();
        stepped.schedule_repeating(0.1, Tick::A);
        single.schedule_repeating(0.1, Tick::A);

        let mut count = 0;
        for _ in 0..300 {
            count += stepped.drain_due(1.0 / 30.0).len();
        }
        assert_eq!(count, single.drain_due(10.0).len());
    }
}
