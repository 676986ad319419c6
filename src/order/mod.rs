//! Partially ordered versions and the frontiers that bound them.
//!
//! A [`Version`] is a tuple of nonnegative integers ordered by the product
//! partial order: `u <= v` iff every coordinate of `u` is `<=` the matching
//! coordinate of `v`. Versions of a fixed arity form a lattice, with
//! componentwise max as join and componentwise min as meet.
//!
//! An [`Antichain`] is a minimal set of pairwise incomparable versions,
//! interpreted as a frontier: the versions at or beyond some element of the
//! antichain are still open, everything else is closed. The empty antichain
//! is the terminal frontier under which every version is closed.

use smallvec::SmallVec;
use std::fmt::{self, Debug, Display};

/// A type with a reflexive partial order.
pub trait PartialOrder: PartialEq {
    /// True iff `self` is less than or equal to `other` in the partial order.
    fn less_equal(&self, other: &Self) -> bool;

    /// True iff `self` is strictly less than `other` in the partial order.
    fn less_than(&self, other: &Self) -> bool {
        self.less_equal(other) && self != other
    }
}

/// A partially ordered type with least upper and greatest lower bounds.
pub trait Lattice: PartialOrder {
    /// The smallest element greater than or equal to both arguments.
    fn join(&self, other: &Self) -> Self;

    /// The largest element less than or equal to both arguments.
    fn meet(&self, other: &Self) -> Self;

    /// Updates `self` to `self.join(other)`.
    fn join_assign(&mut self, other: &Self)
    where
        Self: Sized,
    {
        *self = self.join(other);
    }

    /// Updates `self` to `self.meet(other)`.
    fn meet_assign(&mut self, other: &Self)
    where
        Self: Sized,
    {
        *self = self.meet(other);
    }
}

/// Inline storage for the common case of shallow loop nesting.
type Coordinates = SmallVec<[u64; 3]>;

/// A point in the partially ordered version lattice.
///
/// All versions flowing through one scope of a dataflow have the same arity.
/// Mixing arities in a single comparison is a programming error and panics.
///
/// `Version` also implements the total [`Ord`], lexicographic on
/// coordinates. The total order is only used to keep storage and emission
/// deterministic; it is a linear extension of the partial order, so
/// processing closed versions in ascending `Ord` order never processes a
/// version before one of its predecessors.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    coords: Coordinates,
}

impl Version {
    /// Creates a version from its coordinates.
    pub fn new<I>(coords: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let coords: Coordinates = coords.into_iter().collect();
        assert!(!coords.is_empty(), "versions have arity >= 1");
        Self { coords }
    }

    /// The number of coordinates.
    pub fn arity(&self) -> usize {
        self.coords.len()
    }

    /// The coordinates, outermost first.
    pub fn coordinates(&self) -> &[u64] {
        &self.coords
    }

    fn validate(&self, other: &Self) {
        assert_eq!(
            self.arity(),
            other.arity(),
            "compared versions {self} and {other} of different arity"
        );
    }

    /// Appends a zero coordinate, entering one level of loop nesting.
    pub fn extend(&self) -> Self {
        let mut coords = self.coords.clone();
        coords.push(0);
        Self { coords }
    }

    /// Drops the trailing coordinate, leaving one level of loop nesting.
    pub fn truncate(&self) -> Self {
        let mut coords = self.coords.clone();
        coords.pop();
        assert!(!coords.is_empty(), "truncated a version of arity 1");
        Self { coords }
    }

    /// Increments the trailing coordinate by `step`.
    pub fn apply_step(&self, step: u64) -> Self {
        assert!(step > 0);
        let mut coords = self.coords.clone();
        *coords.last_mut().unwrap() += step;
        Self { coords }
    }

    /// The least version indistinguishable from `self` at or beyond
    /// `frontier`.
    ///
    /// For every version `v` at or beyond some element of `frontier`, the
    /// result compares to `v` exactly as `self` does, and any other version
    /// with that property is less than or equal to the result. An empty
    /// frontier leaves `self` unchanged. Used when compacting traces: once
    /// no reader can distinguish versions below the frontier, they may all
    /// be advanced to their image under it and merged.
    pub fn advance_by(&self, frontier: &Antichain<Version>) -> Self {
        let mut iter = frontier.elements().iter();
        match iter.next() {
            None => self.clone(),
            Some(first) => {
                let mut result = self.join(first);
                for element in iter {
                    result.meet_assign(&self.join(element));
                }
                result
            }
        }
    }
}

impl PartialOrder for Version {
    fn less_equal(&self, other: &Self) -> bool {
        self.validate(other);
        self.coords
            .iter()
            .zip(other.coords.iter())
            .all(|(a, b)| a <= b)
    }
}

impl Lattice for Version {
    fn join(&self, other: &Self) -> Self {
        self.validate(other);
        Self {
            coords: self
                .coords
                .iter()
                .zip(other.coords.iter())
                .map(|(a, b)| *a.max(b))
                .collect(),
        }
    }

    fn meet(&self, other: &Self) -> Self {
        self.validate(other);
        Self {
            coords: self
                .coords
                .iter()
                .zip(other.coords.iter())
                .map(|(a, b)| *a.min(b))
                .collect(),
        }
    }
}

impl From<u64> for Version {
    fn from(coord: u64) -> Self {
        Self::new([coord])
    }
}

impl<const N: usize> From<[u64; N]> for Version {
    fn from(coords: [u64; N]) -> Self {
        Self::new(coords)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, coord) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{coord}")?;
        }
        write!(f, ")")
    }
}

impl Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version{self}")
    }
}

/// A minimal set of pairwise incomparable elements, interpreted as a
/// frontier.
///
/// Inserting an element dominated by an existing one is a no-op; inserting
/// an element that dominates existing ones evicts them. Elements are kept
/// sorted in the total order so that equal antichains compare equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Antichain<T> {
    elements: Vec<T>,
}

impl<T> Antichain<T>
where
    T: PartialOrder + Ord + Clone,
{
    /// Creates an empty antichain, the terminal frontier.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Creates an antichain holding a single element.
    pub fn from_elem(element: T) -> Self {
        Self {
            elements: vec![element],
        }
    }

    /// The elements, in ascending total order.
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// True for the terminal frontier, under which every version is closed.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Inserts `element`, dropping whichever of it and the existing elements
    /// are no longer minimal.
    pub fn insert(&mut self, element: T) {
        if self.elements.iter().any(|e| e.less_equal(&element)) {
            return;
        }
        self.elements.retain(|e| !element.less_equal(e));
        self.elements.push(element);
        self.elements.sort();
    }

    /// The union of both antichains, minimized. This is the greatest lower
    /// bound of the two frontiers.
    pub fn meet(&self, other: &Self) -> Self {
        let mut out = Self::new();
        for element in &self.elements {
            out.insert(element.clone());
        }
        for element in &other.elements {
            out.insert(element.clone());
        }
        out
    }

    /// True iff every element of `other` is at or beyond some element of
    /// `self`, i.e. `self`'s frontier contains `other`'s.
    pub fn less_equal(&self, other: &Self) -> bool {
        other
            .elements
            .iter()
            .all(|o| self.elements.iter().any(|s| s.less_equal(o)))
    }

    /// True iff `self.less_equal(other)` and the antichains differ.
    pub fn less_than(&self, other: &Self) -> bool {
        self.less_equal(other) && self != other
    }

    /// True iff some element of the antichain is less than or equal to
    /// `version`, i.e. `version` is still open under this frontier.
    pub fn less_equal_version(&self, version: &T) -> bool {
        self.elements.iter().any(|e| e.less_equal(version))
    }
}

impl<T> Default for Antichain<T>
where
    T: PartialOrder + Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Antichain<T>
where
    T: PartialOrder + Ord + Clone,
{
    fn from(elements: Vec<T>) -> Self {
        let mut out = Self::new();
        for element in elements {
            out.insert(element);
        }
        out
    }
}

impl Antichain<Version> {
    /// Extends every element with a trailing zero coordinate.
    pub fn extend(&self) -> Self {
        self.elements.iter().map(Version::extend).collect()
    }

    /// Truncates the trailing coordinate of every element and minimizes.
    pub fn truncate(&self) -> Self {
        self.elements.iter().map(Version::truncate).collect()
    }

    /// Increments the trailing coordinate of every element by `step`.
    pub fn apply_step(&self, step: u64) -> Self {
        self.elements
            .iter()
            .map(|v| v.apply_step(step))
            .collect()
    }
}

impl<T> FromIterator<T> for Antichain<T>
where
    T: PartialOrder + Ord + Clone,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        for element in iter {
            out.insert(element);
        }
        out
    }
}

impl<T: Debug> Debug for Antichain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Antichain{:?}", self.elements)
    }
}
