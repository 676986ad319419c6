//! The operators of the dataflow graph.
//!
//! Each file pairs an operator with the [`StreamBuilder`] method that
//! inserts it.
//!
//! [`StreamBuilder`]: crate::circuit::StreamBuilder

mod linear;

mod map;

mod filter;

mod neg;

mod concat;
pub use concat::Concat;

mod inspect;
pub use inspect::Inspect;

mod consolidate;
pub use consolidate::Consolidate;

mod join;
pub use join::Join;

mod reduce;
pub use reduce::Reduce;

mod iterate;
pub use iterate::{Egress, Feedback, Ingress};

pub(crate) use linear::LinearUnary;
