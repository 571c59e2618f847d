use thiserror::Error;

pub const FATAL_GRAPH_ERROR_CODES: [i64; 3] = [10, 190, 200];
pub const RATE_LIMIT_GRAPH_ERROR_CODES: [i64; 4] = [4, 17, 32, 613];

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("fatal Graph API error {code}: {message}")]
    Fatal { code: i64, message: String },

    #[error("Graph API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: Box<GraphError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fatal,
    Retryable,
    Other,
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Fatal { .. } => ErrorKind::Fatal,
            GraphError::Api { code, .. } if RATE_LIMIT_GRAPH_ERROR_CODES.contains(code) => {
                ErrorKind::Retryable
            }
            GraphError::Api { .. } => ErrorKind::Other,
            GraphError::Http { status } if *status == 429 || *status >= 500 => ErrorKind::Retryable,
            GraphError::Http { .. } => ErrorKind::Other,
            GraphError::Transport(_) => ErrorKind::Retryable,
            GraphError::RetriesExhausted { .. } => ErrorKind::Other,
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            GraphError::Fatal { code, .. } | GraphError::Api { code, .. } => Some(*code),
            GraphError::RetriesExhausted { source, .. } => source.code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_codes_classify_as_fatal() {
        for code in FATAL_GRAPH_ERROR_CODES {
            let err = GraphError::Fatal {
                code,
                message: "denied".into(),
            };
            assert_eq!(err.kind(), ErrorKind::Fatal);
            assert_eq!(err.code(), Some(code));
        }
    }

    #[test]
    fn test_rate_limit_codes_classify_as_retryable() {
        for code in RATE_LIMIT_GRAPH_ERROR_CODES {
            let err = GraphError::Api {
                code,
                message: "limit reached".into(),
            };
            assert_eq!(err.kind(), ErrorKind::Retryable);
        }
    }

    #[test]
    fn test_unknown_graph_code_is_other() {
        let err = GraphError::Api {
            code: 100,
            message: "invalid parameter".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.code(), Some(100));
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(GraphError::Http { status: 429 }.kind(), ErrorKind::Retryable);
        assert_eq!(GraphError::Http { status: 500 }.kind(), ErrorKind::Retryable);
        assert_eq!(GraphError::Http { status: 503 }.kind(), ErrorKind::Retryable);
        assert_eq!(GraphError::Http { status: 404 }.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_transport_failures_are_retryable() {
        let err = GraphError::Transport("connection reset".into());
        assert_eq!(err.kind(), ErrorKind::Retryable);
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_exhausted_retries_keep_source_code() {
        let err = GraphError::RetriesExhausted {
            attempts: 6,
            source: Box::new(GraphError::Api {
                code: 4,
                message: "limit".into(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.code(), Some(4));
    }
}
