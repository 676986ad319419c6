//! Per-key folded reduction and its derived forms.

use crate::{
    algebra::{
        count_values, distinct_values, max_values, min_values, sum_values, Collection,
        Record, ZRingValue,
    },
    circuit::{
        operator_traits::Operator,
        stream::{InputPort, Message, StreamReader, StreamWriter},
        StreamBuilder,
    },
    order::{Antichain, Lattice, Version},
    trace::Index,
};
use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap, HashSet},
};

impl<K, V, R> StreamBuilder<(K, V), R>
where
    K: Record,
    V: Record,
    R: ZRingValue,
{
    /// Applies `f` to the multiset of values under each key, emitting the
    /// change to `f`'s result whenever the input for the key changes.
    ///
    /// `f` receives the accumulated `(value, multiplicity)` pairs of one
    /// key, unconsolidated, and returns the reduced pairs. Output is
    /// emitted only at versions the input frontier has closed.
    pub fn reduce<O, F>(&self, f: F) -> StreamBuilder<(K, O), R>
    where
        O: Record,
        F: FnMut(&[(V, R)]) -> Vec<(O, R)> + 'static,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Reduce",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            f,
        );
        self.builder().add_operator(operator);
        output
    }

    /// Counts the values under each key.
    pub fn count(&self) -> StreamBuilder<(K, R), R>
    where
        R: Record,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Count",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            count_values,
        );
        self.builder().add_operator(operator);
        output
    }

    /// Reduces the values under each key to a set.
    ///
    /// Panics during `step` if any value accumulates to a negative
    /// multiplicity at a closed version.
    pub fn distinct(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Distinct",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            distinct_values,
        );
        self.builder().add_operator(operator);
        output
    }

    /// The minimum value under each key.
    ///
    /// Panics during `step` if any value accumulates to a negative
    /// multiplicity at a closed version.
    pub fn min(&self) -> Self
    where
        V: Ord,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Min",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            min_values,
        );
        self.builder().add_operator(operator);
        output
    }

    /// The maximum value under each key.
    ///
    /// Panics during `step` if any value accumulates to a negative
    /// multiplicity at a closed version.
    pub fn max(&self) -> Self
    where
        V: Ord,
    {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Max",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            max_values,
        );
        self.builder().add_operator(operator);
        output
    }
}

impl<K, R> StreamBuilder<(K, R), R>
where
    K: Record,
    R: ZRingValue + Record,
{
    /// Sums the values under each key, weighted by multiplicity.
    pub fn sum(&self) -> Self {
        let output = StreamBuilder::new(self.builder().clone());
        let operator = Reduce::new(
            "Sum",
            self.connect_reader(),
            output.writer(),
            self.builder().frontier(),
            sum_values,
        );
        self.builder().add_operator(operator);
        output
    }
}

/// Per-key folded reduction over a partially ordered input.
///
/// Reduction is not linear, so the operator keeps the full input history
/// per key in an [`Index`], along with a second index of what it has
/// already emitted. When a delta arrives for a key at version `v`, the key
/// is scheduled for recomputation at `v` joined with every version already
/// present for that key; a change at `v` can alter the reduction at any
/// such join. Scheduled versions are processed once the input frontier
/// closes them, in ascending order, and the operator emits the difference
/// between the freshly reduced result and what it emitted before.
pub struct Reduce<K, V, O, R, F> {
    name: Cow<'static, str>,
    input: InputPort<(K, V), R>,
    output: StreamWriter<(K, O), R>,
    output_frontier: Antichain<Version>,
    trace: Index<K, V, R>,
    output_trace: Index<K, O, R>,
    pending_keys: BTreeMap<Version, HashSet<K>>,
    func: F,
}

impl<K, V, O, R, F> Reduce<K, V, O, R, F>
where
    K: Record,
    V: Record,
    O: Record,
    R: ZRingValue,
    F: FnMut(&[(V, R)]) -> Vec<(O, R)>,
{
    pub fn new(
        name: &'static str,
        input: StreamReader<(K, V), R>,
        output: StreamWriter<(K, O), R>,
        initial_frontier: Antichain<Version>,
        func: F,
    ) -> Self {
        Self {
            name: Cow::from(name),
            input: InputPort::new(input, initial_frontier.clone()),
            output,
            output_frontier: initial_frontier,
            trace: Index::new(),
            output_trace: Index::new(),
            pending_keys: BTreeMap::new(),
            func,
        }
    }
}

fn subtract_values<O, R>(first: Vec<(O, R)>, second: Vec<(O, R)>) -> Vec<(O, R)>
where
    O: Record,
    R: ZRingValue,
{
    let mut result: HashMap<O, R> = HashMap::new();
    for (value, multiplicity) in first {
        match result.get_mut(&value) {
            Some(total) => total.add_assign(multiplicity),
            None => {
                result.insert(value, multiplicity);
            }
        }
    }
    for (value, multiplicity) in second {
        match result.get_mut(&value) {
            Some(total) => total.add_assign(-multiplicity),
            None => {
                result.insert(value, -multiplicity);
            }
        }
    }
    result
        .into_iter()
        .filter(|(_, multiplicity)| !multiplicity.is_zero())
        .collect()
}

impl<K, V, O, R, F> Operator for Reduce<K, V, O, R, F>
where
    K: Record,
    V: Record,
    O: Record,
    R: ZRingValue,
    F: FnMut(&[(V, R)]) -> Vec<(O, R)> + 'static,
{
    fn name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn pending_work(&self) -> bool {
        self.input.has_pending()
    }

    fn run(&mut self) {
        for message in self.input.drain() {
            match message {
                Message::Data(version, collection) => {
                    for ((key, value), multiplicity) in collection.entries() {
                        self.trace.add_value(
                            key.clone(),
                            version.clone(),
                            value.clone(),
                            multiplicity.clone(),
                        );
                        for touched in self.trace.versions(key) {
                            self.pending_keys
                                .entry(version.join(&touched))
                                .or_default()
                                .insert(key.clone());
                        }
                    }
                }
                Message::Frontier(frontier) => self.input.update_frontier(frontier),
            }
        }

        let finished: Vec<Version> = self
            .pending_keys
            .keys()
            .filter(|version| !self.input.frontier().less_equal_version(version))
            .cloned()
            .collect();

        for version in finished {
            let keys = self.pending_keys.remove(&version).unwrap();
            let mut result = Vec::new();
            for key in keys {
                let current = self.trace.reconstruct_at(&key, &version);
                let previous = self.output_trace.reconstruct_at(&key, &version);
                let reduced = (self.func)(&current);
                for (value, multiplicity) in subtract_values(reduced, previous) {
                    result.push(((key.clone(), value.clone()), multiplicity.clone()));
                    self.output_trace
                        .add_value(key.clone(), version.clone(), value, multiplicity);
                }
            }
            if !result.is_empty() {
                self.output.send_data(version, Collection::from(result));
            }
        }

        let input_frontier = self.input.frontier().clone();
        assert!(self.output_frontier.less_equal(&input_frontier));
        if self.output_frontier.less_than(&input_frontier) {
            self.output_frontier = input_frontier;
            self.output.send_frontier(self.output_frontier.clone());
            self.trace.compact(&self.output_frontier);
            self.output_trace.compact(&self.output_frontier);
        }
    }
}
