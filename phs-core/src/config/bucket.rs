use std::str::FromStr;

use super::error::ParseError;
use super::DELIMITER;

/// Upper bounds of histogram buckets, in non-decreasing order.
///
/// Build one from a `;` separated string with [`parse_buckets`] (or
/// `str::parse`). Leading, trailing and doubled delimiters are rejected
/// because they produce an empty token.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig(Vec<f64>);

/// Parse a `;` separated list of bucket bounds.
///
/// Every token is parsed before the order is checked, so an unparsable token
/// wins over an ordering problem. `NaN` and infinities are not valid bounds.
/// Equal neighbours are accepted.
pub fn parse_buckets(config: &str) -> Result<BucketConfig, ParseError> {
    let buckets = config
        .split(DELIMITER)
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|bound| bound.is_finite())
                .ok_or_else(|| ParseError::invalid_number(token))
        })
        .collect::<Result<Vec<_>, _>>()?;

    BucketConfig::new(buckets)
}

impl BucketConfig {
    /// Validate already parsed bounds: all finite, in order.
    pub fn new(buckets: Vec<f64>) -> Result<Self, ParseError> {
        if let Some(bound) = buckets.iter().find(|bound| !bound.is_finite()) {
            return Err(ParseError::invalid_number(bound.to_string()));
        }
        if let Some(idx) = first_out_of_order(&buckets) {
            return Err(ParseError::OutOfOrder(idx));
        }
        Ok(Self(buckets))
    }

    /// Buckets suited for slow requests, in seconds.
    pub fn slow() -> Self {
        Self(vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5])
    }

    /// Buckets suited for large payloads, in bytes.
    pub fn large_sizes() -> Self {
        Self(vec![
            1024.0,
            10.0 * 1024.0,
            100.0 * 1024.0,
            1024.0 * 1024.0,
            5.0 * 1024.0 * 1024.0,
            10.0 * 1024.0 * 1024.0,
        ])
    }

    pub(crate) fn from_static(buckets: &[f64]) -> Self {
        Self(buckets.to_vec())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.clone()
    }
}

impl FromStr for BucketConfig {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_buckets(s)
    }
}

impl AsRef<[f64]> for BucketConfig {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

fn first_out_of_order(buckets: &[f64]) -> Option<usize> {
    buckets
        .windows(2)
        .position(|pair| pair[0] > pair[1])
        .map(|idx| idx + 1)
}
