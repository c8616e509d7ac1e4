//! Parsers for the textual metric configuration.
//!
//! Bucket bounds and percentile specifications are both `;` separated. A
//! percentile specification may carry an explicit error after a `:`.

mod bucket;
mod error;
mod percentile;

pub use bucket::{parse_buckets, BucketConfig};
pub use error::ParseError;
pub use percentile::{parse_percentiles, Objective, PercentileConfig};

/// Separates buckets and percentile specifications.
pub const DELIMITER: char = ';';

/// Separates a percentile from its explicit error.
pub const ERROR_SEPARATOR: char = ':';
