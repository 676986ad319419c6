//! A difference trace keyed by record key.

use crate::{
    algebra::{consolidate_values, Collection, Record, ZRingValue},
    order::{Antichain, Lattice, PartialOrder, Version},
};
use std::collections::{BTreeMap, HashMap};

/// A per-key indexed difference trace.
///
/// Maps each key to the versions at which the key changed, and each such
/// version to the `(value, multiplicity)` pairs that changed. Join and the
/// reduce family use an index to touch only the keys named by an incoming
/// delta instead of scanning the full history.
///
/// Compaction advances versions the frontier has closed to their image
/// under the frontier and merges them. The index records the frontier it
/// was last compacted to; reads and writes at versions the compaction has
/// already rewritten are programming errors and panic.
#[derive(Clone, Debug)]
pub struct Index<K, V, R = isize> {
    inner: HashMap<K, BTreeMap<Version, Vec<(V, R)>>>,
    compaction_frontier: Option<Antichain<Version>>,
}

impl<K, V, R> Index<K, V, R>
where
    K: Record,
    V: Record,
    R: ZRingValue,
{
    /// Creates an empty, uncompacted index.
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
            compaction_frontier: None,
        }
    }

    fn validate_version(&self, version: &Version) {
        if let Some(frontier) = &self.compaction_frontier {
            assert!(
                frontier.less_equal_version(version),
                "version {version} was already compacted past"
            );
        }
    }

    fn validate_frontier(&self, frontier: &Antichain<Version>) {
        if let Some(compacted) = &self.compaction_frontier {
            assert!(
                compacted.less_equal(frontier),
                "compaction frontier may not regress"
            );
        }
    }

    /// Adds a `(value, multiplicity)` pair for `key` at `version`.
    pub fn add_value(&mut self, key: K, version: Version, value: V, multiplicity: R) {
        self.validate_version(&version);
        self.inner
            .entry(key)
            .or_default()
            .entry(version)
            .or_default()
            .push((value, multiplicity));
    }

    /// Moves all data of `other` into `self`.
    pub fn append(&mut self, other: Self) {
        for (key, versions) in other.inner {
            for (version, mut values) in versions {
                self.validate_version(&version);
                self.inner
                    .entry(key.clone())
                    .or_default()
                    .entry(version)
                    .or_default()
                    .append(&mut values);
            }
        }
    }

    /// The accumulated `(value, multiplicity)` pairs for `key` at `version`.
    pub fn reconstruct_at(&self, key: &K, version: &Version) -> Vec<(V, R)> {
        self.validate_version(version);
        let mut out = Vec::new();
        if let Some(versions) = self.inner.get(key) {
            for (entry_version, values) in versions {
                if entry_version.less_equal(version) {
                    out.extend(values.iter().cloned());
                }
            }
        }
        out
    }

    /// The versions at which `key` changed.
    pub fn versions(&self, key: &K) -> Vec<Version> {
        self.inner
            .get(key)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Matches values of `self` and `other` under each shared key and
    /// produces one collection of `(key, (value, other_value))` pairs per
    /// output version. Each pairing is labeled at the join of the two
    /// contributing versions and weighted by the product of the two
    /// multiplicities. Output versions are returned in ascending order.
    pub fn join<V2>(
        &self,
        other: &Index<K, V2, R>,
    ) -> Vec<(Version, Collection<(K, (V, V2)), R>)>
    where
        V2: Record,
    {
        let mut pairings: BTreeMap<Version, Vec<((K, (V, V2)), R)>> = BTreeMap::new();
        for (key, versions) in &self.inner {
            let Some(other_versions) = other.inner.get(key) else {
                continue;
            };
            for (version1, values1) in versions {
                for (version2, values2) in other_versions {
                    let result_version = version1.join(version2);
                    let slot = pairings.entry(result_version).or_default();
                    for (value1, multiplicity1) in values1 {
                        for (value2, multiplicity2) in values2 {
                            slot.push((
                                (key.clone(), (value1.clone(), value2.clone())),
                                multiplicity1.mul_by_ref(multiplicity2),
                            ));
                        }
                    }
                }
            }
        }
        pairings
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(version, entries)| (version, Collection::from(entries)))
            .collect()
    }

    /// Compacts the index up to `frontier`.
    ///
    /// Every tuple at a version the frontier has closed is advanced to
    /// `version.advance_by(frontier)` and merged with the tuples already
    /// there; tuples whose multiplicities cancel are dropped. Reads at or
    /// beyond `frontier` are unaffected.
    pub fn compact(&mut self, frontier: &Antichain<Version>) {
        self.validate_frontier(frontier);
        for versions in self.inner.values_mut() {
            let closed: Vec<Version> = versions
                .keys()
                .filter(|version| !frontier.less_equal_version(version))
                .cloned()
                .collect();
            let mut touched = Vec::new();
            for version in closed {
                let mut values = versions.remove(&version).unwrap();
                let advanced = version.advance_by(frontier);
                versions.entry(advanced.clone()).or_default().append(&mut values);
                if !touched.contains(&advanced) {
                    touched.push(advanced);
                }
            }
            for version in touched {
                let values = versions.remove(&version).unwrap();
                let consolidated = consolidate_values(&values);
                if !consolidated.is_empty() {
                    versions.insert(version, consolidated);
                }
            }
        }
        self.inner.retain(|_, versions| !versions.is_empty());
        self.compaction_frontier = Some(frontier.clone());
    }
}

impl<K, V, R> Default for Index<K, V, R>
where
    K: Record,
    V: Record,
    R: ZRingValue,
{
    fn default() -> Self {
        Self::new()
    }
}
