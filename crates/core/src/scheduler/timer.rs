//! Timer entries and keys

use std::time::{Duration, Instant};

use slotmap::{new_key_type, SlotMap};

use super::Task;

new_key_type! {
    /// Key for scheduled timers
    pub struct TimerKey;
}

/// A one-shot task waiting for its deadline
pub(crate) struct Timer {
    /// When this timer should fire
    pub deadline: Instant,
    /// Work handed to the executor on expiry
    pub task: Task,
}

impl Timer {
    pub fn new(delay: Duration, task: Task) -> Self {
        Self {
            deadline: Instant::now() + delay,
            task,
        }
    }
}

/// Pending timers
#[derive(Default)]
pub(crate) struct TimerRegistry {
    timers: SlotMap<TimerKey, Timer>,
}

impl TimerRegistry {
    pub fn insert(&mut self, timer: Timer) -> TimerKey {
        self.timers.insert(timer)
    }

    pub fn remove(&mut self, key: TimerKey) -> bool {
        self.timers.remove(key).is_some()
    }

    /// Remove and return every task whose deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Vec<Task> {
        let due: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.deadline <= now)
            .map(|(key, _)| key)
            .collect();

        due.into_iter()
            .filter_map(|key| self.timers.remove(key))
            .map(|timer| timer.task)
            .collect()
    }

    /// Time until the earliest deadline, `None` if idle
    pub fn next_wait(&self, now: Instant) -> Option<Duration> {
        self.timers
            .values()
            .map(|timer| timer.deadline.saturating_duration_since(now))
            .min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_only_expired() {
        let mut registry = TimerRegistry::default();
        registry.insert(Timer::new(Duration::ZERO, Box::new(|| {})));
        let later = registry.insert(Timer::new(Duration::from_secs(60), Box::new(|| {})));

        let due = registry.take_due(Instant::now());
        assert_eq!(due.len(), 1);
        assert_eq!(registry.len(), 1);

        let wait = registry.next_wait(Instant::now()).unwrap();
        assert!(wait > Duration::from_secs(50));

        assert!(registry.remove(later));
        assert!(!registry.remove(later));
        assert_eq!(registry.next_wait(Instant::now()), None);
    }
}
