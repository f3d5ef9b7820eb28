//! Error types for benchmark configuration and reporting.
//!
//! The benchmark itself trusts its input: a zero selectivity faults and a
//! lookup of an absent key panics. These errors only surface when a
//! configuration is checked up front with
//! [`BenchConfig::validate`](crate::bench::BenchConfig::validate), or when
//! the report cannot be serialized.

use thiserror::Error;

/// Errors reported by the benchmark driver.
#[derive(Error, Debug)]
pub enum Error {
    /// The sampling denominator was zero.
    #[error("selectivity must be at least 1")]
    InvalidSelectivity,

    /// The batch width was zero.
    #[error("buffer size must be at least 1")]
    InvalidBufferSize,

    /// The table was configured without any root slots.
    #[error("table capacity must be at least 1")]
    InvalidCapacity,

    /// The report could not be rendered as JSON.
    #[error("failed to serialize report")]
    Report(#[from] serde_json::Error),
}

/// A Result type alias using our custom Error type.
pub type Result<T> = core::result::Result<T, Error>;
