//! Fixed-capacity rolling window, newest item at index 0.

use std::collections::VecDeque;
use std::ops::Index;

#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
    /// Total items ever pushed
    samples: usize,
}

impl<T> RollingWindow<T> {
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWindow capacity must be greater than 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            samples: 0,
        }
    }

    /// Push the newest item, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
        self.samples += 1;
    }

    /// Item `age` steps back; 0 is the newest.
    pub fn get(&self, age: usize) -> Option<&T> {
        self.items.get(age)
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Full window.
    pub fn is_ready(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.samples = 0;
    }
}

impl<T> Index<usize> for RollingWindow<T> {
    type Output = T;

    fn index(&self, age: usize) -> &T {
        &self.items[age]
    }
}
