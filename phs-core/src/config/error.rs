/// Failure to turn a configuration string into a bucket or percentile config.
///
/// A failed parse never yields a partially filled config.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// A token could not be parsed as a float. `specification` names the
    /// enclosing `P:E` specification for percentile input.
    #[error(
        "Cannot parse {token:?} into float{}",
        .specification.as_ref().map(|s| format!(" (in {s:?})")).unwrap_or_default()
    )]
    InvalidNumber {
        token: String,
        specification: Option<String>,
    },

    /// The bucket at this 0-based index is smaller than its predecessor.
    #[error("Buckets out of order, idx({0}) < idx-1")]
    OutOfOrder(usize),

    /// A percentile outside (0, 100] or a negative error tolerance.
    #[error("Percentile specification {specification:?} is out of range")]
    OutOfRange { specification: String },
}

impl ParseError {
    pub fn invalid_number(token: impl Into<String>) -> Self {
        Self::InvalidNumber {
            token: token.into(),
            specification: None,
        }
    }

    pub fn invalid_number_in(token: impl Into<String>, specification: impl Into<String>) -> Self {
        Self::InvalidNumber {
            token: token.into(),
            specification: Some(specification.into()),
        }
    }

    /// The token that failed to parse, if this is a number error.
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::InvalidNumber { token, .. } => Some(token),
            _ => None,
        }
    }
}
