//! Error types for the mathguard library.

use thiserror::Error;

/// Result type alias for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library.
///
/// Rendering itself never returns this type: render failures are absorbed by
/// the degradation machinery. It only reaches callers from setup paths.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while building a render configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_retries must not be negative (got {0})")]
    NegativeRetries(i64),

    #[error("max_retries must be at most {max} (got {value})")]
    TooManyRetries { value: i64, max: u32 },

    #[error("Unknown render mode '{0}' (expected auto, full, safe, math-optimized or plaintext)")]
    UnknownMode(String),

    #[error("Unknown math backend '{0}' (expected katex, mathjax or mathml)")]
    UnknownMathBackend(String),

    #[error("Invalid TOML: {0}")]
    Toml(String),
}

/// A single failed render attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Math rendering error: {0}")]
    Math(String),

    #[error("Unterminated math delimiter at byte {offset}")]
    UnterminatedDelimiter { offset: usize },

    #[error("Unbalanced braces in math: {0}")]
    UnbalancedBraces(String),

    #[error("Mismatched environment: \\begin{{{open}}} closed by \\end{{{close}}}")]
    MismatchedEnvironment { open: String, close: String },

    #[error("Content too large for this strategy ({len} bytes, limit {limit})")]
    TooLarge { len: usize, limit: usize },

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend panicked: {0}")]
    Panicked(String),
}

impl RenderError {
    /// Stable tag used in attempt logs and metrics histograms.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Math(_) => "math",
            RenderError::UnterminatedDelimiter { .. } => "unterminated-delimiter",
            RenderError::UnbalancedBraces(_) => "unbalanced-braces",
            RenderError::MismatchedEnvironment { .. } => "mismatched-environment",
            RenderError::TooLarge { .. } => "too-large",
            RenderError::Unsupported(_) => "unsupported",
            RenderError::Backend(_) => "backend",
            RenderError::Panicked(_) => "panicked",
        }
    }
}

/// Turn a caught panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_kind_is_stable() {
        assert_eq!(RenderError::Math("x".into()).kind(), "math");
        assert_eq!(
            RenderError::UnterminatedDelimiter { offset: 3 }.kind(),
            "unterminated-delimiter"
        );
        assert_eq!(RenderError::TooLarge { len: 2, limit: 1 }.kind(), "too-large");
    }

    #[test]
    fn test_environment_message() {
        let err = RenderError::MismatchedEnvironment {
            open: "align".into(),
            close: "matrix".into(),
        };
        assert_eq!(
            err.to_string(),
            "Mismatched environment: \\begin{align} closed by \\end{matrix}"
        );
    }

    #[test]
    fn test_config_error_wraps() {
        let err: Error = ConfigError::NegativeRetries(-1).into();
        assert!(err.to_string().contains("must not be negative"));
    }
}
