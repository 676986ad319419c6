//! End-to-end scenarios running whole graphs through the step scheduler.

use crate::{
    algebra::{Collection, Record, ZRingValue},
    circuit::{GraphBuilder, Message, OutputHandle},
    collection,
    order::{Antichain, Version},
};

/// Steps `graph` until quiescent, panicking if `budget` sweeps are not
/// enough. Graphs in these tests either converge well within the budget
/// or are expected not to converge at all.
fn run_to_quiescence(graph: &mut crate::circuit::Graph, budget: usize) {
    for _ in 0..budget {
        if !graph.step() {
            return;
        }
    }
    panic!("graph still busy after {budget} steps");
}

/// Sums every data batch drained from `output` into one collection.
fn accumulate<D, R>(output: &mut OutputHandle<D, R>) -> Collection<D, R>
where
    D: Record,
    R: ZRingValue,
{
    let mut total = Collection::new();
    for (_, delta) in output.drain_data() {
        total.extend(&delta);
    }
    total.consolidate()
}

#[test]
fn linear_chain() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input.map(|d| d + 10).filter(|d| *d > 10).output();
    let mut graph = builder.finalize();

    writer
        .send_data(Version::from(0), collection! { 1 => 1, 2 => 1 })
        .unwrap();
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 10);

    let messages = output.drain();
    assert_eq!(
        messages,
        vec![
            Message::Data(Version::from(0), collection! { 11 => 1, 12 => 1 }),
            Message::Frontier(Antichain::new()),
        ]
    );
}

#[test]
fn incremental_count() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<&'static str, isize>();
    let mut output = input.map(|d| (*d, ())).count().output();
    let mut graph = builder.finalize();

    writer
        .send_data(Version::from(0), collection! { "a" => 2, "b" => 1 })
        .unwrap();
    writer
        .send_frontier(Antichain::from_elem(Version::from(1)))
        .unwrap();
    writer
        .send_data(Version::from(1), collection! { "a" => -1, "c" => 3 })
        .unwrap();
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 10);

    let batches = output.drain_data();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[0],
        (
            Version::from(0),
            collection! { ("a", 2) => 1, ("b", 1) => 1 }
        )
    );
    assert_eq!(
        batches[1],
        (
            Version::from(1),
            collection! { ("a", 2) => -1, ("a", 1) => 1, ("c", 3) => 1 }
        )
    );
}

#[test]
fn join_pairs_matching_keys() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (left, mut left_writer) = builder.new_input::<(u32, &'static str), isize>();
    let (right, mut right_writer) = builder.new_input::<(u32, &'static str), isize>();
    let mut output = left.join(&right).output();
    let mut graph = builder.finalize();

    left_writer
        .send_data(Version::from(0), collection! { (1, "x") => 1, (2, "y") => 1 })
        .unwrap();
    right_writer
        .send_data(
            Version::from(0),
            collection! { (1, "p") => 1, (1, "q") => 1, (3, "r") => 1 },
        )
        .unwrap();
    left_writer.send_frontier(Antichain::new()).unwrap();
    right_writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 10);

    let batches = output.drain_data();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        (
            Version::from(0),
            collection! { (1, ("x", "p")) => 1, (1, ("x", "q")) => 1 }
        )
    );
}

#[test]
fn output_frontiers_are_monotone() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input.map(|d| d + 1).consolidate().output();
    let mut graph = builder.finalize();

    for i in 0..4u64 {
        writer
            .send_data(Version::from(i), collection! { i => 1 })
            .unwrap();
        writer
            .send_frontier(Antichain::from_elem(Version::from(i + 1)))
            .unwrap();
        graph.step();
    }
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 10);

    let mut last = Antichain::from_elem(Version::from(0));
    let frontiers = output.drain_frontiers();
    assert!(!frontiers.is_empty());
    for frontier in &frontiers {
        assert!(last.less_equal(frontier));
        last = frontier.clone();
    }
    assert!(last.is_empty());
}

#[test]
fn iterate_converges_with_consolidate() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input
        .iterate(|inner| inner.map(|d| d + 1).map(|d| d - 1).consolidate())
        .output();
    let mut graph = builder.finalize();

    writer
        .send_data(Version::from(0), collection! { 1 => 1 })
        .unwrap();
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 50);

    let messages = output.drain();
    let data: Vec<_> = messages
        .iter()
        .filter_map(|message| match message {
            Message::Data(version, delta) => Some((version.clone(), delta.clone())),
            Message::Frontier(_) => None,
        })
        .collect();
    assert_eq!(data, vec![(Version::from(0), collection! { 1 => 1 })]);

    // Every frontier leaving the loop is one dimensional and the last one
    // is terminal.
    let frontiers: Vec<_> = messages
        .iter()
        .filter_map(|message| match message {
            Message::Frontier(frontier) => Some(frontier.clone()),
            Message::Data(..) => None,
        })
        .collect();
    assert!(frontiers
        .iter()
        .all(|f| f.elements().iter().all(|v| v.arity() == 1)));
    assert_eq!(frontiers.last(), Some(&Antichain::new()));
}

#[test]
fn iterate_without_consolidate_circulates_forever() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input
        .iterate(|inner| inner.map(|d| d + 1).map(|d| d - 1))
        .output();
    let mut graph = builder.finalize();

    writer
        .send_data(Version::from(0), collection! { 1 => 1 })
        .unwrap();
    writer.send_frontier(Antichain::new()).unwrap();

    // The raw delta and its retraction never cancel without a consolidate
    // on the looped path, so every sweep keeps finding work.
    let mut batches = 0;
    for _ in 0..50 {
        assert!(graph.step());
        batches += output.drain_data().len();
    }
    assert!(batches >= 50);
    assert!(graph.step());
}

#[test]
fn feedback_stops_tracking_finished_outer_versions() {
    use crate::{circuit::StreamBuilder, operator::Feedback};

    // The loop of `iterate_converges_with_consolidate`, wired by hand so a
    // probe can watch the feedback edge itself.
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();

    builder.push_frontier(builder.frontier().extend());
    let feedback_stream = StreamBuilder::<u64, isize>::new(builder.clone());
    let mut probe = feedback_stream.output();
    let entered = input.ingress().concat(&feedback_stream);
    let result = entered.map(|d| d + 1).map(|d| d - 1).consolidate();
    let feedback = Feedback::new(
        result.connect_reader(),
        1,
        feedback_stream.writer(),
        builder.frontier(),
    );
    builder.add_operator(feedback);
    builder.pop_frontier();
    let mut output = result.egress().output();

    let mut graph = builder.finalize();
    writer
        .send_data(Version::from(0), collection! { 1 => 1 })
        .unwrap();
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 50);

    let frontiers = probe.drain_frontiers();
    // Finitely many advances for outer version 0, ending with the
    // terminal frontier rather than an unbounded (0, k) sequence.
    assert!(frontiers.len() <= 6);
    assert_eq!(frontiers.last(), Some(&Antichain::new()));
    assert_eq!(accumulate(&mut output), collection! { 1 => 1 });
}

#[test]
fn accumulated_output_matches_batch_recomputation() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input
        .map(|d| (d % 3, *d))
        .filter(|(_, d)| *d != 4)
        .count()
        .output();
    let mut graph = builder.finalize();

    let deltas = [
        collection! { 0u64 => 1, 1 => 1, 2 => 2, 3 => 1 },
        collection! { 2 => -1, 4 => 1, 5 => 1 },
        collection! { 6 => 1, 1 => 1 },
    ];
    let mut accumulated_input: Collection<u64> = Collection::new();
    for (i, delta) in deltas.iter().enumerate() {
        writer
            .send_data(Version::from(i as u64), delta.clone())
            .unwrap();
        writer
            .send_frontier(Antichain::from_elem(Version::from(i as u64 + 1)))
            .unwrap();
        graph.step();
        accumulated_input.extend(delta);
    }
    writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 10);

    let expected = accumulated_input
        .map(|d| (d % 3, *d))
        .filter(|(_, d)| *d != 4)
        .count();
    assert_eq!(accumulate(&mut output), expected);
}

#[test]
fn join_then_count_over_partially_ordered_versions() {
    let builder = GraphBuilder::new(Antichain::from_elem(Version::from([0, 0])));
    let (left, mut left_writer) = builder.new_input::<(u64, u64), isize>();
    let (right, mut right_writer) = builder.new_input::<(u64, u64), isize>();
    let mut output = left.join(&right).count().output();
    let mut graph = builder.finalize();

    let mut left_total: Collection<(u64, u64)> = Collection::new();
    let mut right_total: Collection<(u64, u64)> = Collection::new();
    for i in 0..2u64 {
        let left_delta = collection! { (1, i) => 2, (2, i) => 2 };
        left_writer
            .send_data(Version::from([0, i]), left_delta.clone())
            .unwrap();
        left_total.extend(&left_delta);
        left_writer
            .send_frontier(Antichain::from(vec![
                Version::from([i + 2, 0]),
                Version::from([0, i]),
            ]))
            .unwrap();

        let right_delta = collection! { (1, i + 2) => 2, (2, i + 3) => 2 };
        right_writer
            .send_data(Version::from([i, 0]), right_delta.clone())
            .unwrap();
        right_total.extend(&right_delta);
        right_writer
            .send_frontier(Antichain::from(vec![
                Version::from([i, 0]),
                Version::from([0, i * 2]),
            ]))
            .unwrap();
        graph.step();
    }
    left_writer.send_frontier(Antichain::new()).unwrap();
    right_writer.send_frontier(Antichain::new()).unwrap();
    run_to_quiescence(&mut graph, 20);

    let expected = left_total.join(&right_total).count();
    assert_eq!(accumulate(&mut output), expected);
}

#[test]
fn geometric_series_reaches_fixpoint() {
    fn series(
        collection: &crate::circuit::StreamBuilder<u64, isize>,
    ) -> crate::circuit::StreamBuilder<u64, isize> {
        collection
            .map(|d| d + d)
            .concat(collection)
            .filter(|d| *d <= 100)
            .map(|d| (*d, ()))
            .distinct()
            .map(|(d, ())| *d)
            .consolidate()
    }

    let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
    let (input, mut writer) = builder.new_input::<u64, isize>();
    let mut output = input.iterate(series).output();
    let mut graph = builder.finalize();

    writer
        .send_data(Version::from(0), collection! { 1 => 1 })
        .unwrap();
    writer
        .send_frontier(Antichain::from_elem(Version::from(1)))
        .unwrap();
    run_to_quiescence(&mut graph, 1000);

    assert_eq!(
        accumulate(&mut output),
        collection! { 1 => 1, 2 => 1, 4 => 1, 8 => 1, 16 => 1, 32 => 1, 64 => 1 }
    );
}
