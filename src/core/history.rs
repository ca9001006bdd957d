use std::collections::VecDeque;

/// Fixed-capacity circular buffer that overwrites its oldest entry once
/// full. Used for the processed-event replay history and the bounded
/// metric windows.
#[derive(Debug, Clone)]
pub struct RingHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingHistory<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring history capacity must be non-zero");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when at capacity.
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// All retained entries in chronological order (oldest first).
    pub fn get_all(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// The most recently pushed entry, if any.
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn latest_mut(&mut self) -> Option<&mut T> {
        self.entries.back_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
