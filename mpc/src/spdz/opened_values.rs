use std::mem;

use super::SpdzShare;

/// Partially opened values awaiting a MAC check.
///
/// Every opening appends the share it opened and the public value it opened to. The
/// buffer is only ever drained as a whole.
#[derive(Clone, Debug)]
pub struct OpenedValueStore<T> {
    shares: Vec<SpdzShare<T>>,
    values: Vec<T>,
}

impl<T> Default for OpenedValueStore<T> {
    fn default() -> Self {
        Self {
            shares: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T> OpenedValueStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the opening of `share`.
    pub fn push(&mut self, share: SpdzShare<T>, value: T) {
        self.shares.push(share);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn exceeds_threshold(&self, threshold: usize) -> bool {
        self.len() >= threshold
    }

    /// Take every pending record, leaving the store empty.
    pub fn drain(&mut self) -> (Vec<SpdzShare<T>>, Vec<T>) {
        (mem::take(&mut self.shares), mem::take(&mut self.values))
    }
}
