//! The dataflow graph: builder, edges, and the step scheduler.
//!
//! A graph consists of [operators](`operator_traits::Operator`) connected
//! by edges carrying [messages](`stream::Message`). The builder assembles
//! the topology through [stream handles](`StreamBuilder`); once finalized,
//! the host feeds inputs through [`InputWriter`]s and repeatedly calls
//! [`Graph::step`] to make progress.

mod circuit_builder;
pub use circuit_builder::*;

pub mod operator_traits;
pub mod schedule;
pub mod stream;

pub use schedule::Graph;
pub use stream::{InputPort, Message, StreamReader, StreamWriter};
