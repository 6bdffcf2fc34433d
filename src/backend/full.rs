//! Full-fidelity HTML renderer.

use super::lexer::Segment;
use super::markup::{escape_html, render_blocks, render_spans, wrap};
use super::RenderBackend;
use crate::config::{MathBackend, PluginConfig};
use crate::error::RenderError;
use crate::sanitize::balance;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENVIRONMENT: Regex = Regex::new(r"\\(begin|end)\s*\{([^{}]*)\}").unwrap();
}

/// Renderer for block Markdown with inline and display math.
///
/// Strict: any math it cannot faithfully typeset is an error, so the state
/// machine can degrade instead of showing broken output.
pub struct FullRenderer;

impl FullRenderer {
    pub fn new() -> Self {
        Self
    }

    fn render_math(
        &self,
        segment: Segment<'_>,
        config: &PluginConfig,
    ) -> Result<String, RenderError> {
        match segment {
            Segment::InlineMath(tex) => {
                validate_math(tex)?;
                math_markup(tex, false, config.math_backend)
            }
            Segment::DisplayMath(tex) => {
                validate_math(tex)?;
                math_markup(tex, true, config.math_backend)
            }
            Segment::Unterminated { offset, .. } => {
                Err(RenderError::UnterminatedDelimiter { offset })
            }
            Segment::Text(text) => Ok(escape_html(text)),
        }
    }
}

impl Default for FullRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for FullRenderer {
    fn name(&self) -> &str {
        "full-html"
    }

    fn render(&self, content: &str, config: &PluginConfig) -> Result<String, RenderError> {
        if content.len() > config.max_input_bytes {
            return Err(RenderError::TooLarge {
                len: content.len(),
                limit: config.max_input_bytes,
            });
        }

        let body = render_blocks(content, |text, base| {
            render_spans(text, base, |segment| self.render_math(segment, config))
        })?;
        Ok(wrap(&config.class_prefix, "full", &body))
    }
}

/// Reject math that would render wrong rather than fail loudly client-side.
pub(crate) fn validate_math(tex: &str) -> Result<(), RenderError> {
    if tex.trim().is_empty() {
        return Err(RenderError::Math("empty math expression".to_string()));
    }

    let report = balance::brace_report(tex);
    if !report.is_balanced() {
        return Err(RenderError::UnbalancedBraces(format!(
            "{} unmatched '}}', {} unclosed '{{' in `{}`",
            report.unmatched_close,
            report.unclosed_open,
            tex.trim()
        )));
    }

    let mut open: Vec<&str> = Vec::new();
    for caps in ENVIRONMENT.captures_iter(tex) {
        let name = caps.get(2).map_or("", |m| m.as_str().trim());
        if &caps[1] == "begin" {
            open.push(name);
            continue;
        }
        match open.pop() {
            Some(begun) if begun == name => {}
            Some(begun) => {
                return Err(RenderError::MismatchedEnvironment {
                    open: begun.to_string(),
                    close: name.to_string(),
                })
            }
            None => {
                return Err(RenderError::Math(format!(
                    "\\end{{{}}} without matching \\begin",
                    name
                )))
            }
        }
    }
    if let Some(unclosed) = open.pop() {
        return Err(RenderError::Math(format!("unclosed \\begin{{{}}}", unclosed)));
    }

    Ok(())
}

fn math_markup(tex: &str, display: bool, backend: MathBackend) -> Result<String, RenderError> {
    match backend {
        // MathJax reads the same delimiters; only the page loader differs
        MathBackend::KaTeX | MathBackend::MathJax => Ok(delimited_markup(tex, display)),
        MathBackend::MathML => mathml_markup(tex, display),
    }
}

pub(crate) fn delimited_markup(tex: &str, display: bool) -> String {
    let escaped = escape_html(tex.trim());
    if display {
        format!(r#"<div class="math display">\[{}\]</div>"#, escaped)
    } else {
        format!(r#"<span class="math inline">\({}\)</span>"#, escaped)
    }
}

#[cfg(feature = "mathml")]
fn mathml_markup(tex: &str, display: bool) -> Result<String, RenderError> {
    let style = if display {
        latex2mathml::DisplayStyle::Block
    } else {
        latex2mathml::DisplayStyle::Inline
    };
    let mathml = latex2mathml::latex_to_mathml(tex.trim(), style)
        .map_err(|e| RenderError::Math(e.to_string()))?;

    if display {
        Ok(format!(r#"<div class="math display">{}</div>"#, mathml))
    } else {
        Ok(mathml)
    }
}

#[cfg(not(feature = "mathml"))]
fn mathml_markup(_tex: &str, _display: bool) -> Result<String, RenderError> {
    Err(RenderError::Unsupported(
        "MathML output requires the `mathml` feature".to_string(),
    ))
}
