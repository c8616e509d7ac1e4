use std::str::FromStr;

use tracing::debug;

use super::error::ParseError;
use super::{DELIMITER, ERROR_SEPARATOR};

/// A quantile in (0, 1] and the absolute error allowed when estimating it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub quantile: f64,
    pub error: f64,
}

/// Percentile objectives of a duration summary, keyed by quantile.
///
/// Kept sorted by quantile; inserting an existing quantile replaces its error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentileConfig(Vec<Objective>);

/// Parse a `;` separated list of `P` or `P:E` specifications.
///
/// `P` is a percentile between 0 and 100 and is stored as `P/100`. An explicit
/// `E` is stored as `E/100`. Without `E` the tolerance follows the unscaled
/// `P`: `P/1000` below 90, `0.01` below 99 and `0.001` from 99 on.
///
/// A specification with more than two fields is skipped without error.
pub fn parse_percentiles(config: &str) -> Result<PercentileConfig, ParseError> {
    let mut percentiles = PercentileConfig::default();

    for specification in config.split(DELIMITER) {
        let fields: Vec<&str> = specification.split(ERROR_SEPARATOR).collect();

        let percentile = parse_field(fields[0], specification)?;

        let error = match fields.len() {
            1 => default_error(percentile),
            2 => parse_field(fields[1], specification)? / 100.0,
            _ => {
                // TODO: decide with the users of this format whether extra fields should be an error
                debug!(
                    "Ignoring percentile specification {:?} with {} fields",
                    specification,
                    fields.len()
                );
                continue;
            }
        };

        if !(percentile > 0.0 && percentile <= 100.0) || !(error >= 0.0) {
            return Err(ParseError::OutOfRange {
                specification: specification.to_string(),
            });
        }

        percentiles.insert(percentile / 100.0, error);
    }

    Ok(percentiles)
}

fn parse_field(token: &str, specification: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .map_err(|_| ParseError::invalid_number_in(token, specification))
}

fn default_error(percentile: f64) -> f64 {
    match percentile {
        p if p < 90.0 => p / 1000.0,
        p if p < 99.0 => 0.01,
        _ => 0.001,
    }
}

impl PercentileConfig {
    /// Insert an objective, replacing the error of an equal quantile.
    pub fn insert(&mut self, quantile: f64, error: f64) {
        match self
            .0
            .binary_search_by(|o| o.quantile.total_cmp(&quantile))
        {
            Ok(idx) => self.0[idx].error = error,
            Err(idx) => self.0.insert(idx, Objective { quantile, error }),
        }
    }

    /// The allowed error for `quantile`, if configured.
    pub fn get(&self, quantile: f64) -> Option<f64> {
        self.0
            .iter()
            .find(|o| o.quantile == quantile)
            .map(|o| o.error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Objective> {
        self.0.iter()
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(f64, f64)> for PercentileConfig {
    fn from_iter<T: IntoIterator<Item = (f64, f64)>>(iter: T) -> Self {
        let mut config = Self::default();
        for (quantile, error) in iter {
            config.insert(quantile, error);
        }
        config
    }
}

impl FromStr for PercentileConfig {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_percentiles(s)
    }
}
