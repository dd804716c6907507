//! Deferred work driven by the animation frame loop
//!
//! Nothing here owns a timer. The host calls the chart once per animation
//! frame with the current time and the chart drains whatever is due.

use std::collections::HashMap;
use std::hash::Hash;

/// Latest-wins task executed on the next frame. Scheduling again before the
/// frame replaces the pending value, so a superseded task never runs.
#[derive(Debug)]
pub struct FrameTask<T> {
    pending: Option<T>,
    superseded: u64,
}

impl<T> Default for FrameTask<T> {
    fn default() -> Self {
        Self {
            pending: None,
            superseded: 0,
        }
    }
}

impl<T> FrameTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, value: T) {
        if self.pending.replace(value).is_some() {
            self.superseded += 1;
        }
    }

    /// Returns whether anything was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// How many scheduled values were replaced before they ran
    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }
}

/// Debounced task: runs once `delay` has elapsed since the latest request
#[derive(Debug)]
pub struct DelayedTask<T> {
    pending: Option<(f64, T)>,
}

impl<T> Default for DelayedTask<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DelayedTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an earlier request was collapsed into this one
    pub fn schedule(&mut self, now: f64, delay: f64, value: T) -> bool {
        self.pending.replace((now + delay, value)).is_some()
    }

    pub fn take_due(&mut self, now: f64) -> Option<T> {
        match &self.pending {
            Some((due, _)) if *due <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Keyed one-shot tasks with a due time
#[derive(Debug)]
pub struct TimedTasks<K, V> {
    tasks: HashMap<K, (f64, V)>,
}

impl<K, V> Default for TimedTasks<K, V> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> TimedTasks<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `value` under `key`. Rescheduling an existing key only moves
    /// the due time; the first value is kept.
    pub fn schedule(&mut self, key: K, due: f64, value: V) -> bool {
        match self.tasks.get_mut(&key) {
            Some(entry) => {
                entry.0 = due;
                false
            }
            None => {
                self.tasks.insert(key, (due, value));
                true
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.tasks.remove(key).map(|(_, value)| value)
    }

    /// Remove and return every task due at `now`
    pub fn drain_due(&mut self, now: f64) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .tasks
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.into_iter()
            .filter_map(|key| self.tasks.remove(&key).map(|(_, value)| (key, value)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Coalesces a stream of values, releasing the latest one at most once per
/// `min_interval` milliseconds
#[derive(Debug)]
pub struct Throttle<T> {
    min_interval: f64,
    last_run: Option<f64>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval,
            last_run: None,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T) {
        self.pending = Some(value);
    }

    pub fn poll(&mut self, now: f64) -> Option<T> {
        if self.pending.is_none() {
            return None;
        }
        let ready = self
            .last_run
            .map_or(true, |last| now - last >= self.min_interval);
        if !ready {
            return None;
        }
        self.last_run = Some(now);
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_task_latest_wins() {
        let mut task = FrameTask::new();
        task.schedule(1);
        task.schedule(2);
        task.schedule(3);
        assert_eq!(task.superseded_count(), 2);
        assert_eq!(task.take(), Some(3));
        assert_eq!(task.take(), None);
    }

    #[test]
    fn test_cancelled_frame_task_never_runs() {
        let mut task = FrameTask::new();
        task.schedule(());
        assert!(task.cancel());
        assert!(!task.is_pending());
        assert_eq!(task.take(), None);
    }

    #[test]
    fn test_delayed_task_collapses_requests() {
        let mut task = DelayedTask::new();
        assert!(!task.schedule(0.0, 5.0, "first"));
        assert!(task.schedule(2.0, 5.0, "second"));

        assert_eq!(task.take_due(6.0), None);
        assert_eq!(task.take_due(7.0), Some("second"));
        assert!(!task.is_pending());
    }

    #[test]
    fn test_timed_tasks_keep_first_value() {
        let mut tasks = TimedTasks::new();
        assert!(tasks.schedule("a", 1000.0, "original"));
        assert!(!tasks.schedule("a", 1500.0, "highlighted"));

        assert!(tasks.drain_due(1200.0).is_empty());
        assert_eq!(tasks.drain_due(1500.0), vec![("a", "original")]);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_throttle_rate() {
        let mut throttle = Throttle::new(16.0);
        throttle.push(1);
        assert_eq!(throttle.poll(0.0), Some(1));

        throttle.push(2);
        throttle.push(3);
        assert_eq!(throttle.poll(10.0), None);
        assert_eq!(throttle.poll(16.0), Some(3));
        assert_eq!(throttle.poll(40.0), None);
    }
}
