use std::io;

use thiserror::Error;
use tracing::error;

use crate::client::{ClientError, ExhaustReason};
use crate::types::UserId;

/// Result alias for sampler runs.
pub type Result<T> = std::result::Result<T, SamplerError>;

/// Reasons a sampler run aborts before reaching its target.
///
/// Variants raised mid-run carry the counter value reached so the caller can
/// report partial progress.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// No usable credential remains in the pool.
    #[error("credential pool exhausted ({reason}) at counter {counter}")]
    PoolExhausted {
        /// Why the pool could not serve the request.
        reason: ExhaustReason,
        /// Counter reached when the run aborted.
        counter: u64,
    },
    /// A walk reached a node it cannot leave.
    #[error("dead end at user {user}: no reachable friend at counter {counter}")]
    DeadEnd {
        /// Node the walk is stuck on.
        user: UserId,
        /// Counter reached when the run aborted.
        counter: u64,
    },
    /// The walk root has no data, so there is no list to start from.
    #[error("root user {0} is unavailable")]
    RootUnavailable(UserId),
    /// Every ID the uniform sampler may draw has been drawn.
    #[error("ID space exhausted after {drawn} draws at counter {counter}")]
    RangeExhausted {
        /// Distinct IDs probed during the run.
        drawn: u64,
        /// Counter reached when the run aborted.
        counter: u64,
    },
    /// Invalid sampler input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Failure writing to the sample sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SamplerError {
    /// Converts a fatal client failure into a run abort at `counter`.
    pub(crate) fn from_client(err: ClientError, counter: u64) -> Self {
        match err {
            ClientError::PoolExhausted(reason) => {
                error!(%reason, counter, "sampler.aborted.pool_exhausted");
                SamplerError::PoolExhausted { reason, counter }
            }
        }
    }

    /// Counter reached before the abort, when the error happened mid-run.
    pub fn counter(&self) -> Option<u64> {
        match self {
            SamplerError::PoolExhausted { counter, .. }
            | SamplerError::DeadEnd { counter, .. }
            | SamplerError::RangeExhausted { counter, .. } => Some(*counter),
            _ => None,
        }
    }
}
