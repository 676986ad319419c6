//! Errors reported by the public API.
//!
//! The runtime itself has no recoverable error paths; operator-internal
//! invariant violations are bugs and panic. The errors here are contract
//! violations by the host: malformed writes to an input.

use crate::order::{Antichain, Version};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// A host program broke an input writer's contract.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ContractError {
    /// Data was sent at a version the writer's frontier has already closed.
    #[error("data sent at version {version}, which is not beyond the frontier {frontier:?}")]
    DataBehindFrontier {
        version: Version,
        frontier: Antichain<Version>,
    },

    /// A frontier advance would move the frontier backwards.
    #[error("frontier {next:?} does not advance the current frontier {current:?}")]
    FrontierRegression {
        current: Antichain<Version>,
        next: Antichain<Version>,
    },

    /// A version's arity does not match the arity of the input.
    #[error("version of arity {actual} sent to an input of arity {expected}")]
    ArityMismatch { expected: usize, actual: usize },
}
