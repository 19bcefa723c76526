use thiserror::Error;

/// Convenient result alias for the inventory edge library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not reach the upstream database.
    #[error("The network connection encountered a problem.")]
    Network {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The database rejected or failed to execute a query.
    #[error("{summary}")]
    Query {
        status: u16,
        code: String,
        summary: String,
    },

    /// The request body could not be decoded into an item payload.
    #[error("invalid request body: {message}")]
    InvalidBody { message: String },

    /// A path parameter did not percent-decode to valid UTF-8.
    #[error("invalid path parameter: {value}")]
    InvalidPathParameter { value: String },

    /// The database credential is absent from the secret store.
    #[error("database credential '{key}' is not configured")]
    MissingCredential { key: String },

    /// The database credential cannot be carried in an HTTP header.
    #[error("database credential contains characters not allowed in a header")]
    InvalidCredential,

    /// The database answered with a body that is not a recognizable query response.
    #[error("unexpected database response (status {status}): {message}")]
    Protocol { status: u16, message: String },

    /// The configured database URL could not be parsed or joined.
    #[error("invalid database url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Wrapper for JSON serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a transport-level failure as a network error.
    pub fn network(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Network {
            source: source.into(),
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidBody { .. } | Error::InvalidPathParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn network_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::network(cause);
        assert_eq!(
            err.to_string(),
            "The network connection encountered a problem."
        );
        assert!(err.source().unwrap().to_string().contains("refused"));
    }

    #[test]
    fn query_error_displays_summary() {
        let err = Error::Query {
            status: 400,
            code: "invalid_query".to_string(),
            summary: "error: invalid query".to_string(),
        };
        assert_eq!(err.to_string(), "error: invalid query");
    }

    #[test]
    fn validation_classification() {
        assert!(Error::InvalidBody {
            message: "eof".into()
        }
        .is_validation());
        assert!(!Error::MissingCredential {
            key: "FAUNA_ACCESS_KEY".into()
        }
        .is_validation());
    }
}
