//! Delayed actions on a caller-driven millisecond clock.
//!
//! Nothing here reads wall time. The owner moves the clock forward with
//! [`DelayScheduler::advance_to`] and receives every action that fell due, in
//! due order; actions due at the same instant come out in scheduling order.

#[derive(Debug, Clone)]
struct Scheduled<A> {
    due_ms: u64,
    seq: u64,
    action: A,
}

#[derive(Debug, Clone)]
pub struct DelayScheduler<A> {
    now_ms: u64,
    next_seq: u64,
    pending: Vec<Scheduled<A>>,
}

impl<A> Default for DelayScheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> DelayScheduler<A> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, action: A) {
        let due_ms = self.now_ms.saturating_add(delay_ms);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Scheduled {
            due_ms,
            seq,
            action,
        });
    }

    /// Schedules `count` actions spaced `interval_ms` apart, the first one
    /// `interval_ms` from now.
    pub fn schedule_repeated(
        &mut self,
        count: u32,
        interval_ms: u64,
        mut make: impl FnMut(u32) -> A,
    ) {
        for step in 1..=count {
            let delay = interval_ms.saturating_mul(u64::from(step));
            self.schedule(delay, make(step));
        }
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.pending.iter().map(|entry| entry.due_ms).min()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Moves the clock to `now_ms` (never backwards) and drains what is due.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<(u64, A)> {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;

        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].due_ms <= now {
                due.push(self.pending.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|entry| (entry.due_ms, entry.seq));
        due.into_iter()
            .map(|entry| (entry.due_ms, entry.action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_actions_in_due_order() {
        let mut scheduler = DelayScheduler::new();
        scheduler.schedule(300, "c");
        scheduler.schedule(100, "a");
        scheduler.schedule(200, "b");

        assert!(scheduler.advance_to(99).is_empty());
        assert_eq!(scheduler.advance_to(250), vec![(100, "a"), (200, "b")]);
        assert_eq!(scheduler.next_due_ms(), Some(300));
        assert_eq!(scheduler.advance_to(1_000), vec![(300, "c")]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn same_instant_keeps_scheduling_order() {
        let mut scheduler = DelayScheduler::new();
        scheduler.schedule(50, 1);
        scheduler.schedule(50, 2);
        scheduler.schedule(50, 3);
        let fired = scheduler
            .advance_to(50)
            .into_iter()
            .map(|(_, action)| action)
            .collect::<Vec<_>>();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn delays_are_relative_to_current_clock() {
        let mut scheduler = DelayScheduler::new();
        scheduler.advance_to(1_000);
        scheduler.schedule(500, ());
        assert_eq!(scheduler.next_due_ms(), Some(1_500));
        scheduler.advance_to(200);
        assert_eq!(scheduler.now_ms(), 1_000);
    }

    #[test]
    fn repeated_schedule_spaces_actions() {
        let mut scheduler = DelayScheduler::new();
        scheduler.schedule_repeated(2, 500, |step| step);
        assert_eq!(scheduler.advance_to(2_000), vec![(500, 1), (1_000, 2)]);
    }
}
