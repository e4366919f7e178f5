use thiserror::Error;

use crate::types::ModeLabel;

/// Errors raised by the dispersion engine.
///
/// Numerical non-convergence is deliberately absent: it is reported through
/// [`RootOutcome::converged`](crate::solver::RootOutcome) and the convergence
/// grids, never as an error. Cache misses are values of
/// [`CacheLookup`](crate::cache::CacheLookup).
#[derive(Debug, Error)]
pub enum Error {
    /// Non-physical geometry, material or grid parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("sweep unit {unit} failed: {message}")]
    Worker { unit: String, message: String },

    #[error("missing result for {0}")]
    MissingResult(String),

    #[error("duplicate result for mode {0}")]
    DuplicateMode(ModeLabel),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("no interpolated function for mode {0}")]
    UnknownMode(ModeLabel),

    #[error("query ({wr}, {wi}) lies outside the interpolation domain wr ∈ [{wr_min}, {wr_max}], wi ∈ [{wi_min}, {wi_max}]")]
    OutOfDomain {
        wr: f64,
        wi: f64,
        wr_min: f64,
        wr_max: f64,
        wi_min: f64,
        wi_max: f64,
    },

    #[error("interpolation bounds exceed the sampled range: {0}")]
    BoundsExceedSamples(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidInput(message.into())
}
