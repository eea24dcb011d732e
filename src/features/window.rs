// Feature windows
// Bounded oldest-first history owned by a single recognizer

use std::collections::VecDeque;

use crate::sample::Millis;

/// Smallest window a recognizer may configure
pub const MIN_WINDOW: usize = 3;

/// Largest window a recognizer may configure
pub const MAX_WINDOW: usize = 40;

/// Rejects samples captured before the newest one already accepted
#[derive(Debug, Clone, Default)]
pub struct Freshness {
    newest_ms: Option<Millis>,
}

impl Freshness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for a stale capture time; otherwise records it
    pub fn admit(&mut self, capture_ms: Millis) -> bool {
        match self.newest_ms {
            Some(newest) if capture_ms < newest => false,
            _ => {
                self.newest_ms = Some(capture_ms);
                true
            }
        }
    }

    pub fn newest_ms(&self) -> Option<Millis> {
        self.newest_ms
    }
}

/// Ring buffer of the most recent values, oldest first
#[derive(Debug, Clone)]
pub struct FeatureWindow<T> {
    values: VecDeque<T>,
    capacity: usize,
    freshness: Freshness,
}

impl<T: Copy> FeatureWindow<T> {
    /// Create a window; capacity is clamped to [MIN_WINDOW, MAX_WINDOW]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_WINDOW, MAX_WINDOW);
        FeatureWindow {
            values: VecDeque::with_capacity(capacity),
            capacity,
            freshness: Freshness::new(),
        }
    }

    /// Append a value, evicting the oldest when full
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        evicted
    }

    /// Append a value captured at `capture_ms`
    /// Returns false and leaves the window untouched if the capture is stale
    pub fn push_at(&mut self, value: T, capture_ms: Millis) -> bool {
        if !self.freshness.admit(capture_ms) {
            return false;
        }
        self.push(value);
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest(&self) -> Option<T> {
        self.values.front().copied()
    }

    pub fn latest(&self) -> Option<T> {
        self.values.back().copied()
    }

    /// The two most recent values as (previous, latest)
    pub fn last_two(&self) -> Option<(T, T)> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        Some((self.values[n - 2], self.values[n - 1]))
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
