//! Data structures representing collections that change over versions.
//!
//! A difference trace is a log of `(version, delta-collection)` pairs. The
//! collection at a version is reconstructed by accumulating every delta
//! whose version is less than or equal to it. Deltas at versions that a
//! frontier has closed may be physically merged without changing any
//! reconstruction at or beyond the frontier.
//!
//! [`CollectionTrace`] stores whole deltas in insertion order and serves
//! whole-collection reconstruction; it backs the consolidate operator.
//! [`Index`] stores the same information keyed by record key and serves
//! per-key reconstruction and delta-joins; it backs join and the reduce
//! family.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    order::{Antichain, PartialOrder, Version},
};
use std::collections::BTreeMap;

mod index;

pub use index::Index;

/// An insertion-ordered difference trace of whole collections.
#[derive(Clone, Debug)]
pub struct CollectionTrace<D, R = isize> {
    entries: Vec<(Version, Collection<D, R>)>,
}

impl<D, R> CollectionTrace<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a delta at `version`. Never merges eagerly.
    pub fn append(&mut self, version: Version, collection: Collection<D, R>) {
        self.entries.push((version, collection));
    }

    /// The raw `(version, delta)` entries, in insertion order.
    pub fn entries(&self) -> &[(Version, Collection<D, R>)] {
        &self.entries
    }

    /// True iff the trace holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The collection at `version`: the sum of all deltas at versions less
    /// than or equal to it.
    pub fn reconstruct_at(&self, version: &Version) -> Collection<D, R> {
        let mut out = Collection::new();
        for (entry_version, delta) in &self.entries {
            if entry_version.less_equal(version) {
                out.extend(delta);
            }
        }
        out.consolidate()
    }

    /// Removes every entry at a version the frontier has closed, merges the
    /// removed entries per version, and returns the nonempty consolidated
    /// deltas in ascending version order.
    ///
    /// A version is closed when it is not at or beyond any frontier
    /// element. Entries at open versions stay in the trace untouched.
    pub fn extract_closed(
        &mut self,
        frontier: &Antichain<Version>,
    ) -> Vec<(Version, Collection<D, R>)> {
        let mut closed: BTreeMap<Version, Collection<D, R>> = BTreeMap::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for (version, delta) in self.entries.drain(..) {
            if frontier.less_equal_version(&version) {
                kept.push((version, delta));
            } else {
                closed
                    .entry(version)
                    .or_insert_with(Collection::new)
                    .extend(&delta);
            }
        }
        self.entries = kept;
        closed
            .into_iter()
            .map(|(version, pending)| (version, pending.consolidate()))
            .filter(|(_, delta)| !delta.is_empty())
            .collect()
    }
}

impl<D, R> Default for CollectionTrace<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection;

    fn v(coords: [u64; 2]) -> Version {
        Version::from(coords)
    }

    fn sample_trace() -> CollectionTrace<&'static str> {
        let mut trace = CollectionTrace::new();
        trace.append(v([0, 0]), collection! { "a" => 1, "b" => 2 });
        trace.append(v([1, 0]), collection! { "a" => -1 });
        trace.append(v([0, 1]), collection! { "c" => 1 });
        trace.append(v([1, 0]), collection! { "d" => 1 });
        trace
    }

    #[test]
    fn reconstruction_sums_dominated_deltas() {
        let trace = sample_trace();
        assert_eq!(
            trace.reconstruct_at(&v([0, 0])),
            collection! { "a" => 1, "b" => 2 }
        );
        assert_eq!(
            trace.reconstruct_at(&v([1, 0])),
            collection! { "b" => 2, "d" => 1 }
        );
        assert_eq!(
            trace.reconstruct_at(&v([1, 1])),
            collection! { "b" => 2, "c" => 1, "d" => 1 }
        );
    }

    #[test]
    fn extraction_respects_frontier() {
        let mut trace = sample_trace();
        let closed = trace.extract_closed(&Antichain::from_elem(v([1, 0])));
        // (0, 0) and (0, 1) are closed; (1, 0) is at the frontier and open.
        assert_eq!(
            closed,
            vec![
                (v([0, 0]), collection! { "a" => 1, "b" => 2 }),
                (v([0, 1]), collection! { "c" => 1 }),
            ]
        );

        let rest = trace.extract_closed(&Antichain::new());
        assert_eq!(
            rest,
            vec![(v([1, 0]), collection! { "a" => -1, "d" => 1 })]
        );
        assert!(trace.is_empty());
    }

    #[test]
    fn extraction_drops_cancelled_deltas() {
        let mut trace: CollectionTrace<&str> = CollectionTrace::new();
        trace.append(v([0, 0]), collection! { "a" => 1 });
        trace.append(v([0, 0]), collection! { "a" => -1 });
        assert!(trace.extract_closed(&Antichain::new()).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        fn arb_entries() -> impl Strategy<Value = Vec<(Version, Collection<u8>)>> {
            vec(
                (
                    vec(0u64..4, 2..=2).prop_map(Version::new),
                    vec(((0u8..4), (-2isize..3)), 0..5).prop_map(Collection::from),
                ),
                0..8,
            )
        }

        proptest! {
            #[test]
            fn snapshot_law(entries in arb_entries(), probe in vec(0u64..4, 2..=2)) {
                let probe = Version::new(probe);
                let mut trace = CollectionTrace::new();
                let mut expected = Collection::new();
                for (version, delta) in entries {
                    if version.less_equal(&probe) {
                        expected.extend(&delta);
                    }
                    trace.append(version, delta);
                }
                prop_assert_eq!(trace.reconstruct_at(&probe), expected);
            }

            #[test]
            fn extraction_preserves_totals(
                entries in arb_entries(),
                frontier in vec(vec(0u64..4, 2..=2).prop_map(Version::new), 0..3),
            ) {
                let frontier: Antichain<Version> = frontier.into_iter().collect();
                let mut trace = CollectionTrace::new();
                let mut total = Collection::new();
                for (version, delta) in entries {
                    total.extend(&delta);
                    trace.append(version, delta);
                }
                let closed = trace.extract_closed(&frontier);
                let mut after = Collection::new();
                for (_, delta) in &closed {
                    after.extend(delta);
                }
                for (_, delta) in trace.entries() {
                    after.extend(delta);
                }
                prop_assert_eq!(total, after);
            }
        }
    }
}
