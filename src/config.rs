//! Render configuration.
//!
//! [`RenderConfig`] is built in code through [`RenderConfig::builder`] or
//! read from TOML through [`RenderSettings`]. Both paths validate up front:
//! a bad value is a [`ConfigError`] at setup time, never a silent default.

use crate::error::ConfigError;
use crate::events::RenderEvent;
use crate::sanitize::SanitizerHook;
use crate::strategy::machine::{CycleOptions, RenderAttempt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use crate::strategy::RenderMode;

/// Retry count used when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Largest accepted retry count.
pub const MAX_RETRIES_LIMIT: u32 = 16;
/// Default input size limit for the strict backends.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 256 * 1024;
/// Text shown for empty content.
pub const DEFAULT_PLACEHOLDER: &str = "No content to display";

/// Called with each finished attempt.
pub type AttemptCallback = Arc<dyn Fn(&RenderAttempt) + Send + Sync>;
/// Called with each telemetry event.
pub type EventCallback = Arc<dyn Fn(&RenderEvent) + Send + Sync>;

/// Math typesetting target for the full-fidelity backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathBackend {
    /// Output raw LaTeX for KaTeX to render client-side.
    #[default]
    KaTeX,
    /// Output raw LaTeX for MathJax (same markup as KaTeX).
    MathJax,
    /// Convert to MathML for native browser rendering.
    MathML,
}

impl MathBackend {
    /// Page head markup the host should include for this backend.
    pub fn head_html(self) -> &'static str {
        match self {
            MathBackend::KaTeX => KATEX_HEAD,
            MathBackend::MathJax => MATHJAX_HEAD,
            MathBackend::MathML => MATHML_STYLES,
        }
    }
}

impl FromStr for MathBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "katex" => Ok(MathBackend::KaTeX),
            "mathjax" => Ok(MathBackend::MathJax),
            "mathml" => Ok(MathBackend::MathML),
            other => Err(ConfigError::UnknownMathBackend(other.to_string())),
        }
    }
}

const KATEX_HEAD: &str = r#"<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css" crossorigin="anonymous">
<script defer src="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.js" crossorigin="anonymous"></script>
<script defer src="https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/contrib/auto-render.min.js" crossorigin="anonymous"
    onload="renderMathInElement(document.body, {
        delimiters: [
            {left: '\\[', right: '\\]', display: true},
            {left: '\\(', right: '\\)', display: false}
        ],
        throwOnError: false
    });"></script>"#;

const MATHJAX_HEAD: &str = r#"<script>
MathJax = {
    tex: {
        inlineMath: [['\\(', '\\)']],
        displayMath: [['\\[', '\\]']]
    }
};
</script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>"#;

const MATHML_STYLES: &str = r#"<style>
math {
    font-size: 1.1em;
}
</style>"#;

/// Settings handed to every backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// CSS class prefix for emitted markup.
    pub class_prefix: String,
    pub math_backend: MathBackend,
    /// Inputs longer than this are rejected by the strict backends.
    pub max_input_bytes: usize,
    /// Free-form options for custom backends.
    pub options: BTreeMap<String, String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            class_prefix: "mg".to_string(),
            math_backend: MathBackend::KaTeX,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            options: BTreeMap::new(),
        }
    }
}

/// Configuration for a render cycle.
#[derive(Clone)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub max_retries: u32,
    /// Show a diagnostic summary in fallback output.
    pub debug: bool,
    /// Rewrite content for the weaker strategy on each degradation.
    pub transform_on_degrade: bool,
    /// Output for empty content.
    pub placeholder: String,
    pub plugin: PluginConfig,
    /// Called after each failed attempt.
    pub on_error: Option<AttemptCallback>,
    /// Called after the successful attempt.
    pub on_complete: Option<AttemptCallback>,
    pub on_event: Option<EventCallback>,
    /// Runs after the built-in sanitizer.
    pub sanitizer_hook: Option<SanitizerHook>,
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    /// Read configuration from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let settings: RenderSettings =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        Self::try_from(settings)
    }

    pub(crate) fn cycle_options(&self) -> CycleOptions {
        CycleOptions {
            max_retries: self.max_retries,
            transform_on_degrade: self.transform_on_degrade,
            debug: self.debug,
            class_prefix: self.plugin.class_prefix.clone(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Auto,
            max_retries: DEFAULT_MAX_RETRIES,
            debug: false,
            transform_on_degrade: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            plugin: PluginConfig::default(),
            on_error: None,
            on_complete: None,
            on_event: None,
            sanitizer_hook: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("mode", &self.mode)
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .field("transform_on_degrade", &self.transform_on_degrade)
            .field("placeholder", &self.placeholder)
            .field("plugin", &self.plugin)
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_event", &self.on_event.is_some())
            .field("sanitizer_hook", &self.sanitizer_hook.is_some())
            .finish()
    }
}

fn check_retries(value: i64) -> Result<u32, ConfigError> {
    if value < 0 {
        return Err(ConfigError::NegativeRetries(value));
    }
    if value > i64::from(MAX_RETRIES_LIMIT) {
        return Err(ConfigError::TooManyRetries {
            value,
            max: MAX_RETRIES_LIMIT,
        });
    }
    Ok(value as u32)
}

/// Builder for [`RenderConfig`]. Validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
    max_retries: Option<i64>,
}

impl RenderConfigBuilder {
    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Signed so that a caller's negative value is reported, not wrapped.
    pub fn max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn transform_on_degrade(mut self, enabled: bool) -> Self {
        self.config.transform_on_degrade = enabled;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.config.placeholder = placeholder.into();
        self
    }

    pub fn plugin(mut self, plugin: PluginConfig) -> Self {
        self.config.plugin = plugin;
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RenderAttempt) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RenderAttempt) + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RenderEvent) + Send + Sync + 'static,
    {
        self.config.on_event = Some(Arc::new(callback));
        self
    }

    pub fn sanitizer_hook(mut self, hook: SanitizerHook) -> Self {
        self.config.sanitizer_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<RenderConfig, ConfigError> {
        let mut config = self.config;
        if let Some(value) = self.max_retries {
            config.max_retries = check_retries(value)?;
        }
        Ok(config)
    }
}

/// Serializable form of [`RenderConfig`], without callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub mode: String,
    pub max_retries: i64,
    pub debug: bool,
    pub transform_on_degrade: bool,
    pub placeholder: String,
    pub plugin: PluginConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mode: "auto".to_string(),
            max_retries: i64::from(DEFAULT_MAX_RETRIES),
            debug: false,
            transform_on_degrade: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            plugin: PluginConfig::default(),
        }
    }
}

impl TryFrom<RenderSettings> for RenderConfig {
    type Error = ConfigError;

    fn try_from(settings: RenderSettings) -> Result<Self, Self::Error> {
        Ok(RenderConfig {
            mode: settings.mode.parse()?,
            max_retries: check_retries(settings.max_retries)?,
            debug: settings.debug,
            transform_on_degrade: settings.transform_on_degrade,
            placeholder: settings.placeholder,
            plugin: settings.plugin,
            ..RenderConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::builder().build().unwrap();
        assert_eq!(config.mode, RenderMode::Auto);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.placeholder, "No content to display");
        assert_eq!(config.plugin.class_prefix, "mg");
    }

    #[test]
    fn test_negative_retries_rejected() {
        let err = RenderConfig::builder().max_retries(-1).build().unwrap_err();
        assert_eq!(err, ConfigError::NegativeRetries(-1));
    }

    #[test]
    fn test_retry_limit() {
        assert!(RenderConfig::builder().max_retries(16).build().is_ok());
        assert_eq!(
            RenderConfig::builder().max_retries(17).build().unwrap_err(),
            ConfigError::TooManyRetries { value: 17, max: 16 }
        );
    }

    #[test]
    fn test_from_toml() {
        let config = RenderConfig::from_toml_str(
            r#"
mode = "math-optimized"
max_retries = 1
debug = true

[plugin]
class_prefix = "doc"
math_backend = "mathjax"
"#,
        )
        .unwrap();

        assert_eq!(config.mode, RenderMode::MathOptimized);
        assert_eq!(config.max_retries, 1);
        assert!(config.debug);
        assert_eq!(config.plugin.class_prefix, "doc");
        assert_eq!(config.plugin.math_backend, MathBackend::MathJax);
        assert_eq!(config.plugin.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn test_toml_errors() {
        assert_eq!(
            RenderConfig::from_toml_str("max_retries = -2").unwrap_err(),
            ConfigError::NegativeRetries(-2)
        );
        assert_eq!(
            RenderConfig::from_toml_str(r#"mode = "loud""#).unwrap_err(),
            ConfigError::UnknownMode("loud".to_string())
        );
        assert!(matches!(
            RenderConfig::from_toml_str("mode = ["),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_math_backend() {
        assert_eq!("MathML".parse::<MathBackend>(), Ok(MathBackend::MathML));
        assert!("svg".parse::<MathBackend>().is_err());
        assert!(MathBackend::KaTeX.head_html().contains("katex"));
        assert!(MathBackend::MathJax.head_html().contains("MathJax"));
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let config = RenderConfig::builder().on_error(|_| {}).build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("on_error: true"));
        assert!(debug.contains("on_event: false"));
    }
}
