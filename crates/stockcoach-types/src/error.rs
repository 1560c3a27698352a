use thiserror::Error;

/// Errors from repository and cache operations (used by trait definitions in stockcoach-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cache error: {0}")]
    Cache(String),
}

/// A 2xx webhook body that does not carry a usable reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("response body is not a JSON object")]
    NotAnObject,

    #[error("response field has the wrong type: {0}")]
    InvalidField(String),

    #[error("response has none of: response, output, message, content")]
    MissingContent,
}

/// Errors from one AI webhook round trip.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("webhook returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("webhook request failed: {0}")]
    Network(String),

    #[error("webhook did not answer within {secs}s")]
    Timeout { secs: u64 },

    #[error("webhook body is not JSON: {0}")]
    Decode(String),
}

/// Errors from the audio transcription round trip.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("no transcription endpoint configured")]
    NotConfigured,

    #[error("unsupported audio type: {0}")]
    InvalidAudio(String),

    #[error("transcription timed out after {secs}s, please try again")]
    Timeout { secs: u64 },

    #[error("transcription service returned HTTP {status}")]
    Http { status: u16 },

    #[error("transcription service error: {0}")]
    Service(String),

    #[error("transcription request failed: {0}")]
    Network(String),
}

/// Errors from the external geo/timezone lookup.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("geo lookup request failed: {0}")]
    Request(String),

    #[error("geo lookup returned HTTP {0}")]
    Status(u16),

    #[error("geo lookup returned an unusable record: {0}")]
    InvalidRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_exchange_error_display() {
        let err = ExchangeError::Http {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "webhook returned HTTP 500: boom");
        assert_eq!(
            ExchangeError::Timeout { secs: 30 }.to_string(),
            "webhook did not answer within 30s"
        );
    }

    #[test]
    fn test_transcription_timeout_asks_for_retry() {
        let err = TranscriptionError::Timeout { secs: 65 };
        assert!(err.to_string().contains("try again"));
    }
}
