//! Multisets of records with signed multiplicities.

use crate::algebra::{HasZero, Record, ZRingValue};
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    ops::{Add, AddAssign, Neg},
};

/// A multiset of records.
///
/// A collection is a sequence of `(record, multiplicity)` pairs. The same
/// record may appear in several pairs; [`consolidate`](Self::consolidate)
/// merges them. Equality is semantic: two collections are equal iff every
/// record accumulates to the same multiplicity in both.
///
/// Collections are value-like. Every operation returns a new collection and
/// leaves its inputs untouched.
#[derive(Clone)]
pub struct Collection<D, R = isize> {
    entries: Vec<(D, R)>,
}

impl<D, R> Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The raw `(record, multiplicity)` pairs, unconsolidated.
    pub fn entries(&self) -> &[(D, R)] {
        &self.entries
    }

    /// True iff the collection holds no pairs at all.
    ///
    /// A collection of pairs that cancel out is not `is_empty`; use
    /// [`HasZero::is_zero`] for the semantic test.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The accumulated multiplicity of `record`.
    pub fn multiplicity_of(&self, record: &D) -> R {
        let mut out = R::zero();
        for (data, multiplicity) in &self.entries {
            if data == record {
                out.add_assign(multiplicity.clone());
            }
        }
        out
    }

    /// Appends all pairs of `other` to `self`.
    pub fn extend(&mut self, other: &Self) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Concatenates two collections, the multiset sum.
    pub fn concat(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.extend(other);
        out
    }

    /// Flips the sign of every multiplicity.
    pub fn negate(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(data, multiplicity)| (data.clone(), multiplicity.clone().neg()))
                .collect(),
        }
    }

    /// Applies `f` to every record.
    pub fn map<D2, F>(&self, mut f: F) -> Collection<D2, R>
    where
        D2: Record,
        F: FnMut(&D) -> D2,
    {
        Collection {
            entries: self
                .entries
                .iter()
                .map(|(data, multiplicity)| (f(data), multiplicity.clone()))
                .collect(),
        }
    }

    /// Keeps the records for which `f` returns true.
    pub fn filter<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&D) -> bool,
    {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(data, _)| f(data))
                .cloned()
                .collect(),
        }
    }

    /// Merges pairs carrying the same record and drops records whose
    /// multiplicities cancel.
    pub fn consolidate(&self) -> Self {
        Self {
            entries: self
                .accumulate()
                .into_iter()
                .collect(),
        }
    }

    fn accumulate(&self) -> HashMap<D, R> {
        let mut accumulated: HashMap<D, R> = HashMap::new();
        for (data, multiplicity) in &self.entries {
            match accumulated.get_mut(data) {
                Some(total) => total.add_assign(multiplicity.clone()),
                None => {
                    accumulated.insert(data.clone(), multiplicity.clone());
                }
            }
        }
        accumulated.retain(|_, multiplicity| !multiplicity.is_zero());
        accumulated
    }

    /// Repeatedly applies `f` until the result stops changing and returns
    /// the fixpoint.
    ///
    /// Runs forever if `f` does not converge.
    pub fn iterate<F>(&self, f: F) -> Self
    where
        F: Fn(&Self) -> Self,
    {
        let mut curr = self.clone();
        loop {
            let next = f(&curr);
            if next == curr {
                return curr;
            }
            curr = next;
        }
    }
}

impl<K, V, R> Collection<(K, V), R>
where
    K: Record,
    V: Record,
    R: ZRingValue,
{
    /// Matches pairs `(k, v)` from `self` and `(k, w)` from `other` and
    /// produces `(k, (v, w))` with the multiplicities multiplied.
    pub fn join<V2>(&self, other: &Collection<(K, V2), R>) -> Collection<(K, (V, V2)), R>
    where
        V2: Record,
    {
        let mut entries = Vec::new();
        for ((k1, v1), m1) in &self.entries {
            for ((k2, v2), m2) in &other.entries {
                if k1 == k2 {
                    entries.push(((k1.clone(), (v1.clone(), v2.clone())), m1.mul_by_ref(m2)));
                }
            }
        }
        Collection { entries }
    }

    /// Applies a reduction function to the values grouped by key.
    pub fn reduce<O, F>(&self, mut f: F) -> Collection<(K, O), R>
    where
        O: Record,
        F: FnMut(&[(V, R)]) -> Vec<(O, R)>,
    {
        let mut grouped: HashMap<K, Vec<(V, R)>> = HashMap::new();
        for ((key, value), multiplicity) in &self.entries {
            grouped
                .entry(key.clone())
                .or_default()
                .push((value.clone(), multiplicity.clone()));
        }
        let mut entries = Vec::new();
        for (key, values) in grouped {
            for (out, multiplicity) in f(&values) {
                entries.push(((key.clone(), out), multiplicity));
            }
        }
        Collection { entries }
    }

    /// Counts the values associated with each key.
    pub fn count(&self) -> Collection<(K, R), R>
    where
        R: Record,
    {
        self.reduce(count_values)
    }

    /// Reduces the values under each key to a set.
    ///
    /// Panics if any value accumulates to a negative multiplicity; a set
    /// member cannot occur a negative number of times.
    pub fn distinct(&self) -> Self {
        self.reduce(distinct_values)
    }

    /// The minimum value associated with each key.
    ///
    /// Panics if any value accumulates to a negative multiplicity.
    pub fn min(&self) -> Self
    where
        V: Ord,
    {
        self.reduce(min_values)
    }

    /// The maximum value associated with each key.
    ///
    /// Panics if any value accumulates to a negative multiplicity.
    pub fn max(&self) -> Self
    where
        V: Ord,
    {
        self.reduce(max_values)
    }
}

impl<K, R> Collection<(K, R), R>
where
    K: Record,
    R: ZRingValue + Record,
{
    /// Sums the values associated with each key, weighted by multiplicity.
    pub fn sum(&self) -> Self {
        self.reduce(sum_values)
    }
}

/// Reducer behind `count`, usable with [`reduce`](Collection::reduce).
pub fn count_values<V, R>(values: &[(V, R)]) -> Vec<(R, R)>
where
    V: Record,
    R: ZRingValue,
{
    let mut out = R::zero();
    for (_, multiplicity) in values {
        out.add_assign(multiplicity.clone());
    }
    vec![(out, R::one())]
}

/// Reducer behind `sum`.
pub fn sum_values<R>(values: &[(R, R)]) -> Vec<(R, R)>
where
    R: ZRingValue,
{
    let mut out = R::zero();
    for (value, multiplicity) in values {
        out.add_assign(value.mul_by_ref(multiplicity));
    }
    vec![(out, R::one())]
}

/// Reducer behind `distinct`.
pub fn distinct_values<V, R>(values: &[(V, R)]) -> Vec<(V, R)>
where
    V: Record,
    R: ZRingValue,
{
    consolidate_values(values)
        .into_iter()
        .map(|(value, multiplicity)| {
            assert!(
                multiplicity.ge0(),
                "negative multiplicity in distinct: {value:?}"
            );
            (value, R::one())
        })
        .collect()
}

/// Reducer behind `min`.
pub fn min_values<V, R>(values: &[(V, R)]) -> Vec<(V, R)>
where
    V: Record + Ord,
    R: ZRingValue,
{
    extremum_values(values, |best, candidate| candidate < best)
}

/// Reducer behind `max`.
pub fn max_values<V, R>(values: &[(V, R)]) -> Vec<(V, R)>
where
    V: Record + Ord,
    R: ZRingValue,
{
    extremum_values(values, |best, candidate| candidate > best)
}

fn extremum_values<V, R>(values: &[(V, R)], mut replace: impl FnMut(&V, &V) -> bool) -> Vec<(V, R)>
where
    V: Record + Ord,
    R: ZRingValue,
{
    let mut consolidated = consolidate_values(values).into_iter();
    let mut best = match consolidated.next() {
        Some((value, multiplicity)) => {
            assert!(multiplicity.ge0(), "negative multiplicity: {value:?}");
            value
        }
        None => return Vec::new(),
    };
    for (value, multiplicity) in consolidated {
        assert!(multiplicity.ge0(), "negative multiplicity: {value:?}");
        if replace(&best, &value) {
            best = value;
        }
    }
    vec![(best, R::one())]
}

pub(crate) fn consolidate_values<V, R>(values: &[(V, R)]) -> Vec<(V, R)>
where
    V: Record,
    R: ZRingValue,
{
    let mut accumulated: HashMap<V, R> = HashMap::new();
    for (value, multiplicity) in values {
        match accumulated.get_mut(value) {
            Some(total) => total.add_assign(multiplicity.clone()),
            None => {
                accumulated.insert(value.clone(), multiplicity.clone());
            }
        }
    }
    accumulated
        .into_iter()
        .filter(|(_, multiplicity)| !multiplicity.is_zero())
        .collect()
}

impl<D, R> Default for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D, R> From<Vec<(D, R)>> for Collection<D, R> {
    fn from(entries: Vec<(D, R)>) -> Self {
        Self { entries }
    }
}

impl<D, R> PartialEq for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn eq(&self, other: &Self) -> bool {
        self.accumulate() == other.accumulate()
    }
}

impl<D, R> Eq for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
}

impl<D, R> Add for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.entries.extend(other.entries);
        self
    }
}

impl<'a, D, R> Add for &'a Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    type Output = Collection<D, R>;

    fn add(self, other: Self) -> Collection<D, R> {
        self.concat(other)
    }
}

impl<D, R> AddAssign for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn add_assign(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl<'a, D, R> AddAssign<&'a Self> for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn add_assign(&mut self, other: &'a Self) {
        self.extend(other);
    }
}

impl<D, R> Neg for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    type Output = Self;

    fn neg(self) -> Self {
        self.negate()
    }
}

impl<'a, D, R> Neg for &'a Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    type Output = Collection<D, R>;

    fn neg(self) -> Collection<D, R> {
        self.negate()
    }
}

impl<D, R> HasZero for Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    fn is_zero(&self) -> bool {
        self.accumulate().is_empty()
    }

    fn zero() -> Self {
        Self::new()
    }
}

impl<D: Debug, R: Debug> Debug for Collection<D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Collection{:?}", self.entries)
    }
}

/// Create a collection with the given records and multiplicities.
///
/// This macro is used in unit tests to create reference inputs and outputs.
#[macro_export]
macro_rules! collection {
    ( $( $record:expr => $multiplicity:expr ),* $(,)? ) => {
        $crate::algebra::Collection::from(vec![ $( ($record, $multiplicity) ),* ])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit() -> Collection<(&'static str, &'static str)> {
        collection! { ("apple", "$5") => 2, ("banana", "$2") => 1 }
    }

    fn stand() -> Collection<(&'static str, &'static str)> {
        collection! {
            ("apple", "$3") => 1,
            ("apple", "$2") => 1,
            ("kiwi", "$2") => 1,
        }
    }

    #[test]
    fn concat_and_negate() {
        let sum = fruit().concat(&stand());
        assert_eq!(sum.multiplicity_of(&("apple", "$5")), 2);
        assert_eq!(sum.multiplicity_of(&("kiwi", "$2")), 1);

        let cancelled = fruit().concat(&fruit().negate());
        assert!(cancelled.is_zero());
        assert!(!cancelled.is_empty());
        assert!(cancelled.consolidate().is_empty());
    }

    #[test]
    fn map_and_filter() {
        let swapped = fruit().map(|(name, price)| (*price, *name));
        assert_eq!(swapped.multiplicity_of(&("$5", "apple")), 2);

        let no_apples = fruit().filter(|(name, _)| *name != "apple");
        assert_eq!(no_apples, collection! { ("banana", "$2") => 1 });
    }

    #[test]
    fn semantic_equality() {
        let split = collection! { 1 => 1, 1 => 1, 2 => 1 };
        let merged = collection! { 1 => 2, 2 => 1, 3 => 0 };
        assert_eq!(split, merged);
        assert_ne!(split, collection! { 1 => 2 });
    }

    #[test]
    fn join_matches_keys() {
        let joined = fruit().join(&stand());
        assert_eq!(joined.multiplicity_of(&("apple", ("$5", "$3"))), 2);
        assert_eq!(joined.multiplicity_of(&("apple", ("$5", "$2"))), 2);
        assert_eq!(joined.multiplicity_of(&("banana", ("$2", "$2"))), 0);

        // Commutative up to swapping the pair.
        let swapped = stand().join(&fruit()).map(|(k, (a, b))| (*k, (*b, *a)));
        assert_eq!(joined, swapped);
    }

    #[test]
    fn count_and_distinct() {
        let both = fruit().concat(&stand());
        let counts = both.count();
        assert_eq!(counts.multiplicity_of(&("apple", 3)), 1);
        assert_eq!(counts.multiplicity_of(&("banana", 1)), 1);

        let distinct = both.distinct();
        assert_eq!(distinct.multiplicity_of(&("apple", "$5")), 1);
        assert_eq!(distinct.multiplicity_of(&("apple", "$2")), 1);
    }

    #[test]
    fn sum_min_max() {
        let measured: Collection<(&str, isize)> = collection! {
            ("apple", 11) => 1,
            ("apple", 3) => 2,
            ("banana", 2) => 3,
            ("coconut", 3) => 1,
        };
        let sums = measured.sum();
        assert_eq!(sums.multiplicity_of(&("apple", 17)), 1);
        assert_eq!(sums.multiplicity_of(&("banana", 6)), 1);

        assert_eq!(measured.min().multiplicity_of(&("apple", 3)), 1);
        assert_eq!(measured.max().multiplicity_of(&("apple", 11)), 1);
    }

    #[test]
    #[should_panic(expected = "negative multiplicity")]
    fn distinct_rejects_negative() {
        let negative: Collection<(u32, u32)> = collection! { (1, 2) => -1 };
        let _ = negative.distinct();
    }

    #[test]
    fn fixpoint_iteration() {
        let start: Collection<u64> = collection! { 1 => 1 };
        let reached = start.iterate(|c| {
            c.map(|data| data + 1)
                .concat(c)
                .filter(|data| *data <= 5)
                .map(|data| (*data, ()))
                .distinct()
                .map(|(data, ())| *data)
                .consolidate()
        });
        assert_eq!(reached, collection! { 1 => 1, 2 => 1, 3 => 1, 4 => 1, 5 => 1 });
    }

    mod proptests {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        fn arb_collection() -> impl Strategy<Value = Collection<u8>> {
            vec(((0u8..8), (-3isize..4)), 0..10).prop_map(Collection::from)
        }

        proptest! {
            #[test]
            fn map_is_linear(a in arb_collection(), b in arb_collection()) {
                let f = |d: &u8| d.wrapping_mul(3);
                prop_assert_eq!(a.concat(&b).map(f), a.map(f).concat(&b.map(f)));
                prop_assert_eq!(a.negate().map(f), a.map(f).negate());
            }

            #[test]
            fn filter_is_linear(a in arb_collection(), b in arb_collection()) {
                let p = |d: &u8| d % 2 == 0;
                prop_assert_eq!(
                    a.concat(&b).filter(p),
                    a.filter(p).concat(&b.filter(p))
                );
                prop_assert_eq!(a.negate().filter(p), a.filter(p).negate());
            }

            #[test]
            fn concat_is_linear(
                a1 in arb_collection(),
                a2 in arb_collection(),
                b1 in arb_collection(),
                b2 in arb_collection(),
            ) {
                // Linear jointly in both arguments.
                prop_assert_eq!(
                    a1.concat(&a2).concat(&b1.concat(&b2)),
                    a1.concat(&b1).concat(&a2.concat(&b2))
                );
            }

            #[test]
            fn consolidate_preserves_meaning(a in arb_collection()) {
                prop_assert_eq!(a.consolidate(), a.clone());
                for (_, multiplicity) in a.consolidate().entries() {
                    prop_assert!(*multiplicity != 0);
                }
            }
        }
    }
}
