//! Reduced-fidelity renderer: every formula is typeset inline.

use super::full::delimited_markup;
use super::lexer::Segment;
use super::markup::{escape_html, inline, render_blocks, render_spans, wrap};
use super::RenderBackend;
use crate::config::PluginConfig;
use crate::error::RenderError;
use crate::sanitize::balance;

/// Renders display math inline and shows unterminated delimiters as text.
/// Still rejects unbalanced braces and oversized input.
pub struct SimplifiedRenderer;

impl SimplifiedRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimplifiedRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn render_math(segment: Segment<'_>) -> Result<String, RenderError> {
    match segment {
        Segment::InlineMath(tex) | Segment::DisplayMath(tex) => {
            if tex.trim().is_empty() {
                return Ok(String::new());
            }
            let report = balance::brace_report(tex);
            if !report.is_balanced() {
                return Err(RenderError::UnbalancedBraces(tex.trim().to_string()));
            }
            let squashed = tex.split_whitespace().collect::<Vec<_>>().join(" ");
            Ok(delimited_markup(&squashed, false))
        }
        Segment::Unterminated { delimiter, rest, .. } => Ok(format!(
            "{}{}",
            escape_html(delimiter),
            inline(&rest[delimiter.len()..])
        )),
        Segment::Text(text) => Ok(inline(text)),
    }
}

impl RenderBackend for SimplifiedRenderer {
    fn name(&self) -> &str {
        "simplified-html"
    }

    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError> {
        if content.len() > config.max_input_bytes {
            return Err(RenderError::TooLarge {
                len: content.len(),
                limit: config.max_input_bytes,
            });
        }

        let body = render_blocks(content, |text, base| render_spans(text, base, render_math))?;
        Ok(wrap(&config.class_prefix, "simplified", &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(content: &str) -> Result<String, RenderError> {
        SimplifiedRenderer::new().render(content, &PluginConfig::default())
    }

    #[test]
    fn test_display_math_goes_inline() {
        let html = render("see $$\n  x +\n  y\n$$ here").unwrap();
        assert!(html.contains(r#"<span class="math inline">\(x + y\)</span>"#));
        assert!(!html.contains("math display"));
    }

    #[test]
    fn test_unterminated_is_text() {
        let html = render("cost $5 and *more*").unwrap();
        assert_eq!(
            html,
            "<div class=\"mg-content mg-simplified\">\n<p>cost $5 and <em>more</em></p>\n</div>"
        );
    }

    #[test]
    fn test_unbalanced_braces_still_fail() {
        assert!(matches!(render(r"$\sqrt{x$"), Err(RenderError::UnbalancedBraces(_))));
    }

    #[test]
    fn test_environment_mismatch_is_tolerated() {
        assert!(render(r"$\begin{a} x \end{b}$").is_ok());
    }
}
