use crate::meteorology::source::MeteorologySource;
use crate::prelude::TimeInterval;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A fact with a validity interval, an absolute error and a source.
pub trait StoreEntry {
    fn valid(&self) -> &TimeInterval;
    fn error(&self) -> f64;
    fn source(&self) -> MeteorologySource;
}

/// Smaller error first, then the more trusted source.
pub fn preference<T: StoreEntry>(a: &T, b: &T) -> Ordering {
    a.error()
        .total_cmp(&b.error())
        .then_with(|| b.source().rank().cmp(&a.source().rank()))
}

/// Entries sorted by the start of their validity interval.
///
/// Insertion keeps every entry; which one is active at a time is decided at
/// lookup by [`preference`].
#[derive(Debug, Clone)]
pub struct IntervalStore<T> {
    entries: Vec<T>,
}

impl<T> Default for IntervalStore<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: StoreEntry> IntervalStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: T) {
        let from = entry.valid().from;
        let index = self.entries.partition_point(|e| e.valid().from <= from);
        self.entries.insert(index, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Every entry whose interval contains `time`.
    pub fn covering(&self, time: DateTime<Utc>) -> impl Iterator<Item = &T> {
        let end = self.entries.partition_point(|e| e.valid().from <= time);
        self.entries[..end]
            .iter()
            .filter(move |e| e.valid().to >= time)
    }

    pub fn best_at(&self, time: DateTime<Utc>) -> Option<&T> {
        self.covering(time).min_by(|a, b| preference(*a, *b))
    }

    /// Like [`IntervalStore::best_at`], restricted to entries passing `accept`,
    /// with `tie_break` deciding between entries of equal preference.
    pub fn best_at_with(
        &self,
        time: DateTime<Utc>,
        accept: impl Fn(&T) -> bool,
        tie_break: impl Fn(&T, &T) -> Ordering,
    ) -> Option<&T> {
        self.covering(time)
            .filter(|e| accept(e))
            .min_by(|a, b| preference(*a, *b).then_with(|| tie_break(a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Fact {
        valid: TimeInterval,
        error: f64,
        source: MeteorologySource,
    }

    impl StoreEntry for Fact {
        fn valid(&self) -> &TimeInterval {
            &self.valid
        }
        fn error(&self) -> f64 {
            self.error
        }
        fn source(&self) -> MeteorologySource {
            self.source
        }
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    fn fact(from: u32, to: u32, error: f64, source: MeteorologySource) -> Fact {
        Fact {
            valid: TimeInterval::new(at(from), at(to)),
            error,
            source,
        }
    }

    #[test]
    fn lookup_prefers_smallest_error() {
        let mut store = IntervalStore::new();
        store.insert(fact(8, 16, 3.0, MeteorologySource::EcmwfAnalysis));
        store.insert(fact(10, 12, 1.0, MeteorologySource::DualBeamMeasurement));
        assert_eq!(store.best_at(at(11)).unwrap().error, 1.0);
        assert_eq!(store.best_at(at(13)).unwrap().error, 3.0);
        assert!(store.best_at(at(17)).is_none());
    }

    #[test]
    fn inserting_a_worse_entry_keeps_the_better_one_active() {
        let mut store = IntervalStore::new();
        store.insert(fact(10, 12, 1.0, MeteorologySource::GeometryCalculation));
        let before = store.best_at(at(11)).cloned();
        store.insert(fact(0, 23, 5.0, MeteorologySource::Default));
        store.insert(fact(11, 11, 2.0, MeteorologySource::User));
        assert_eq!(store.best_at(at(11)).cloned(), before);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn equal_errors_fall_back_to_source_rank() {
        let mut store = IntervalStore::new();
        store.insert(fact(0, 23, 2.0, MeteorologySource::User));
        store.insert(fact(0, 23, 2.0, MeteorologySource::NoaaGdas));
        assert_eq!(
            store.best_at(at(5)).unwrap().source,
            MeteorologySource::NoaaGdas
        );
    }

    #[test]
    fn covering_lists_only_containing_intervals() {
        let mut store = IntervalStore::new();
        store.insert(fact(1, 2, 1.0, MeteorologySource::User));
        store.insert(fact(3, 4, 1.0, MeteorologySource::User));
        store.insert(fact(0, 5, 1.0, MeteorologySource::User));
        assert_eq!(store.covering(at(3)).count(), 2);
    }
}
