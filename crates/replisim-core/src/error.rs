//! Run-level error type.
//!
//! Configuration problems are reported before the first tick. Invariant
//! violations abort the run: they mean a policy or engine bug, never a
//! modeled outcome. Expired traffic is not an error and never shows up here.

use crate::config::ConfigError;
use crate::trace::TraceError;
use replisim_balancers::BalanceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("assignment policy failed: {0}")]
    Balance(#[from] BalanceError),
    #[error("trace output failed: {0}")]
    Trace(#[from] TraceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
