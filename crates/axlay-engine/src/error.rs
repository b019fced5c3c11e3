use std::result::Result as StdResult;

use axlay_protocol::SelectorError;
use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the axlay engine.
///
/// None of these escape to the rule layer as failures: locate paths turn them into
/// failed `LocateResult`s and condition paths turn them into `false`.
#[derive(Debug, Error)]
pub enum Error {
    /// A selector string could not be parsed.
    #[error("Invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),

    /// No stable match within the retry budget.
    #[error("Element not found")]
    NotFound,

    /// Superseded by a newer batch or a window event.
    #[error("Search cancelled")]
    Cancelled,

    /// A single condition could not be evaluated.
    #[error("Condition evaluation failed: {0}")]
    ConditionEvaluation(String),

    /// The tree provider or event sink is temporarily absent.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}
