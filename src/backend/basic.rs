//! Tolerant renderer: Markdown structure kept, math shown as source.

use super::lexer::Segment;
use super::markup::{escape_html, inline, render_blocks, render_spans, wrap};
use super::RenderBackend;
use crate::config::PluginConfig;
use crate::error::RenderError;

/// Renders Markdown and leaves formulas as escaped TeX source. Never fails.
///
/// Content over `max_input_bytes` is not parsed; it comes back escaped with
/// whitespace preserved, still inside the basic container.
pub struct BasicRenderer;

impl BasicRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BasicRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for BasicRenderer {
    fn name(&self) -> &str {
        "basic-html"
    }

    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError> {
        let prefix = &config.class_prefix;
        if content.len() > config.max_input_bytes {
            tracing::debug!(
                len = content.len(),
                limit = config.max_input_bytes,
                "content over size limit; rendering as escaped text"
            );
            return Ok(format!(
                "<div class=\"{p}-content {p}-basic\" style=\"white-space: pre-wrap\">{}</div>",
                escape_html(content),
                p = prefix
            ));
        }

        let body = render_blocks(content, |text, base| {
            render_spans(text, base, |segment| {
                Ok(match segment {
                    Segment::InlineMath(tex) | Segment::DisplayMath(tex) => format!(
                        "<code class=\"{}-tex\">{}</code>",
                        prefix,
                        escape_html(tex.trim())
                    ),
                    Segment::Unterminated { rest, .. } => escape_html(rest),
                    Segment::Text(text) => inline(text),
                })
            })
        })?;
        Ok(wrap(prefix, "basic", &body))
    }
}
