//! Append-only store of finalized bars.

use crate::domain::Bar;

/// Bars in the order they closed. With a capacity set, the oldest bars are
/// evicted once it is exceeded; order is preserved either way.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    bars: Vec<Bar>,
    capacity: Option<usize>,
    appended: u64,
}

impl BarStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self { bars: Vec::new(), capacity, appended: 0 }
    }

    pub fn append(&mut self, bar: Bar) {
        self.bars.push(bar);
        self.appended += 1;
        if let Some(cap) = self.capacity {
            if self.bars.len() > cap {
                let excess = self.bars.len() - cap;
                self.bars.drain(..excess);
            }
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Bars ever appended, including evicted ones.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }
}
