use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyllabotError {
    // Document errors
    #[error("Fetch failed: {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("PDF parse error: {0}")]
    Parse(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Protocol errors
    #[error("Protocol violation in phase {phase}: {action}")]
    ProtocolViolation { phase: String, action: String },

    #[error("Actor exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),

    #[error("Run exceeded max hand-offs ({0})")]
    MaxHandoffsExceeded(usize),

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyllabotError {
    /// Build a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable name of the error kind, used in run envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::NotFound(_) => "not_found",
            Self::Parse(_) => "parse",
            Self::LlmRequest(_) | Self::LlmStream(_) => "llm",
            Self::ToolNotFound(_) | Self::ToolTimeout { .. } | Self::ToolValidation(_) => "tool",
            Self::ProtocolViolation { .. }
            | Self::MaxTurnsExceeded(_)
            | Self::MaxHandoffsExceeded(_)
            | Self::UnknownActor(_) => "protocol",
            Self::Configuration(_) | Self::ConfigNotFound(_) => "configuration",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyllabotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_is_verbatim() {
        let err = SyllabotError::NotFound("No matching PDF file was found on the page.".into());
        assert_eq!(err.to_string(), "No matching PDF file was found on the page.");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_fetch_helper() {
        let err = SyllabotError::fetch("https://example.com/x.pdf", "HTTP 404 Not Found");
        assert_eq!(err.kind(), "fetch");
        assert!(err.to_string().contains("https://example.com/x.pdf"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_kinds_are_distinct_for_document_errors() {
        let kinds = [
            SyllabotError::fetch("u", "r").kind(),
            SyllabotError::NotFound("n".into()).kind(),
            SyllabotError::Parse("p".into()).kind(),
            SyllabotError::Configuration("c".into()).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
