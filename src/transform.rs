//! Transformers shipped with the crate.

use crate::pipeline::Transformer;
use crate::record::Record;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts records passing through without touching them.
///
/// The tally belongs to one counter; read it through a [`CountHandle`] taken
/// before the counter is moved into a pipeline.
///
/// ```
/// use biblio_ingest::transform::Counter;
///
/// let counter = Counter::new();
/// let handle = counter.handle();
/// assert_eq!(handle.get(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Counter {
    count: Arc<AtomicUsize>,
}

/// Read-only view of a [`Counter`]'s tally.
#[derive(Debug, Clone)]
pub struct CountHandle {
    count: Arc<AtomicUsize>,
}

impl Counter {
    /// Create a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Counter::default()
    }

    /// A handle that keeps reporting the tally after the counter is moved.
    #[must_use]
    pub fn handle(&self) -> CountHandle {
        CountHandle {
            count: Arc::clone(&self.count),
        }
    }
}

impl CountHandle {
    /// Records seen so far.
    #[must_use]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

impl Transformer for Counter {
    fn transform(&mut self, record: Record) -> Record {
        self.count.fetch_add(1, Ordering::AcqRel);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_passes_records_through() {
        let mut counter = Counter::new();
        let handle = counter.handle();
        let record = Record {
            title: "Spice it up!".to_string(),
            ..Record::default()
        };
        let out = counter.transform(record.clone());
        assert_eq!(out, record);
        counter.transform(Record::default());
        assert_eq!(handle.get(), 2);
    }

    #[test]
    fn test_counters_are_independent() {
        let mut first = Counter::new();
        let second = Counter::new();
        first.transform(Record::default());
        assert_eq!(first.handle().get(), 1);
        assert_eq!(second.handle().get(), 0);
    }
}
