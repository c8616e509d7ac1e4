/// Failure to create or register an instrument.
///
/// Registration happens once at startup; callers abort on any of these.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Metric {0} is already registered")]
    AlreadyRegistered(String),

    #[error("Cannot register metric {name}: {source}")]
    Backend {
        name: String,
        #[source]
        source: prometheus::Error,
    },
}

impl RegistrationError {
    pub(crate) fn from_backend(name: impl Into<String>, source: prometheus::Error) -> Self {
        let name = name.into();
        match source {
            prometheus::Error::AlreadyReg => Self::AlreadyRegistered(name),
            source => Self::Backend { name, source },
        }
    }

    /// Name of the metric that failed.
    pub fn metric_name(&self) -> &str {
        match self {
            Self::AlreadyRegistered(name) => name,
            Self::Backend { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_registered_is_mapped() {
        let err = RegistrationError::from_backend("http_server_requests_total", prometheus::Error::AlreadyReg);
        assert!(matches!(err, RegistrationError::AlreadyRegistered(_)));
        assert_eq!(err.metric_name(), "http_server_requests_total");
        assert_eq!(
            err.to_string(),
            "Metric http_server_requests_total is already registered"
        );
    }

    #[test]
    fn test_other_errors_keep_their_source() {
        let err = RegistrationError::from_backend(
            "http_server_request_size",
            prometheus::Error::Msg("histogram buckets must be in increasing order".into()),
        );
        assert!(matches!(err, RegistrationError::Backend { .. }));
        assert!(err.to_string().contains("increasing order"));
    }
}
