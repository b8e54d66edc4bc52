use thiserror::Error;

/// Result alias for `mpck`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by constraint handling, clustering and active selection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Vector dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters from {n_items} items")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// A constraint links a point to itself.
    #[error("constraint links point {index} to itself")]
    SelfConstraint {
        /// The offending point.
        index: usize,
    },

    /// A point index is outside the dataset.
    #[error("point index {index} out of range for {len} points")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of points.
        len: usize,
    },

    /// Constraints contradict each other once closed transitively.
    #[error("incoherent constraints between {first} and {second}: {reason}")]
    IncoherentConstraints {
        /// Lower point of the contradicting pair.
        first: usize,
        /// Higher point of the contradicting pair.
        second: usize,
        /// What was contradicted.
        reason: String,
    },

    /// Active selection picked a point outside the permitted range.
    #[error("selected point {index} outside permitted range {start}..{end}")]
    QueryOutOfRange {
        /// The selected point.
        index: usize,
        /// Range start (inclusive).
        start: usize,
        /// Range end (exclusive).
        end: usize,
    },

    /// The objective moved in the wrong direction (strict mode only).
    #[error("objective oscillated at iteration {iteration}: {previous} -> {current}")]
    Oscillation {
        /// Iteration at which the movement was observed.
        iteration: usize,
        /// Objective after the previous iteration.
        previous: f64,
        /// Objective after this iteration.
        current: f64,
    },

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
