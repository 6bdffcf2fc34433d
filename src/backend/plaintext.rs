//! Last-resort renderer: escaped text, whitespace preserved.

use super::markup::escape_html;
use super::RenderBackend;
use crate::config::PluginConfig;
use crate::error::RenderError;

/// Renders content as HTML-escaped preformatted text. Never fails.
pub struct PlaintextRenderer;

impl PlaintextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlaintextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for PlaintextRenderer {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError> {
        Ok(format!(
            "<div class=\"{p}-content {p}-plaintext\" style=\"white-space: pre-wrap\">{}</div>",
            escape_html(content),
            p = config.class_prefix
        ))
    }
}
