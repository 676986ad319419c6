//! Incremental computation over multisets changing across partially
//! ordered versions.
//!
//! A computation is fixed at build time as a dataflow graph of functional
//! operators over [collections](`algebra::Collection`). The host feeds
//! each input a stream of deltas labeled by
//! [versions](`order::Version`) and advances per-input
//! [frontiers](`order::Antichain`); the graph emits, for every closed
//! version, the matching delta of each output, doing work proportional to
//! the size of the change rather than the size of the data.
//!
//! ```
//! use deltaflow::{
//!     circuit::GraphBuilder,
//!     collection,
//!     order::{Antichain, Version},
//! };
//!
//! let builder = GraphBuilder::new(Antichain::from_elem(Version::from(0)));
//! let (edges, mut writer) = builder.new_input::<(u32, u32), isize>();
//! let mut degrees = edges.count().output();
//! let mut graph = builder.finalize();
//!
//! writer
//!     .send_data(Version::from(0), collection! { (1, 10) => 1, (1, 11) => 1 })
//!     .unwrap();
//! writer.send_frontier(Antichain::new()).unwrap();
//! while graph.step() {}
//!
//! let (version, delta) = degrees.drain_data().remove(0);
//! assert_eq!(version, Version::from(0));
//! assert_eq!(delta, collection! { (1, 2) => 1 });
//! ```

pub mod algebra;
pub mod circuit;
pub mod error;
pub mod operator;
pub mod order;
pub mod trace;

pub use algebra::Collection;
pub use circuit::{Graph, GraphBuilder, InputWriter, OutputHandle, StreamBuilder};
pub use error::Error;
pub use order::{Antichain, Version};

#[cfg(test)]
mod test;
