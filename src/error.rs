use thiserror::Error;

/// Crate-level error taxonomy. Every failure surfaces at the session
/// controller boundary as a single human-readable transcript entry; nothing
/// is retried automatically.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Submitting a message that is empty after trimming. Handled locally;
    /// the exchange never starts.
    #[error("message is empty, nothing to send")]
    EmptyMessage,

    /// Non-success response status. Carries the server-provided detail when
    /// present, else a generic message.
    #[error("server error: {0}")]
    Transport(String),

    /// An `error` event received mid-stream. Partial content already
    /// rendered is kept.
    #[error("stream error: {0}")]
    Stream(String),

    /// A `data:` frame whose payload is not valid JSON. Fatal for the
    /// exchange.
    #[error("malformed stream frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// Transport-level IO failure from the HTTP client.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The in-flight exchange was cancelled from outside.
    #[error("exchange cancelled")]
    Cancelled,
}

impl ChatError {
    /// The one-line text rendered into the transcript for this failure.
    pub fn transcript_message(&self) -> String {
        format!("Error: {}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChatError::EmptyMessage.to_string(),
            "message is empty, nothing to send"
        );
        assert_eq!(
            ChatError::Transport("quota exceeded".into()).to_string(),
            "server error: quota exceeded"
        );
        assert_eq!(
            ChatError::Stream("upstream closed".into()).to_string(),
            "stream error: upstream closed"
        );
        assert_eq!(ChatError::Cancelled.to_string(), "exchange cancelled");
    }

    #[test]
    fn test_frame_error_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = ChatError::from(parse_err);
        assert!(matches!(err, ChatError::Frame(_)));
        assert!(err.to_string().starts_with("malformed stream frame:"));
    }

    #[test]
    fn test_transcript_message_prefix() {
        let err = ChatError::Stream("boom".into());
        assert_eq!(err.transcript_message(), "Error: stream error: boom");
    }
}
