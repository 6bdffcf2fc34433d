//! Content complexity classification.
//!
//! The analyzer counts math and Markdown markers with a fixed set of
//! detectors and buckets the content by density. The bucket drives the
//! initial rendering strategy. Analysis never fails: if a detector panics,
//! a conservative default is returned with the failure noted in `issues`.

use crate::error::panic_message;
use crate::sanitize::balance;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// More math markers than this makes content complex.
pub const COMPLEX_MATH_THRESHOLD: usize = 10;
/// More Markdown markers than this makes content complex.
pub const COMPLEX_MARKDOWN_THRESHOLD: usize = 15;
/// More math markers than this makes content moderate.
pub const MODERATE_MATH_THRESHOLD: usize = 3;
/// More Markdown markers than this makes content moderate.
pub const MODERATE_MARKDOWN_THRESHOLD: usize = 5;

/// Complexity bucket of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    None,
    Simple,
    Moderate,
    Complex,
}

/// Rendering approach suggested by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderingStrategy {
    /// Dense math: start at full fidelity.
    MathOptimized,
    /// Mixed content: start in the middle and degrade as needed.
    Progressive,
    /// Light content: start with the tolerant renderers.
    PlaintextSafe,
}

/// Result of analyzing a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    pub complexity: Complexity,
    pub has_math: bool,
    pub has_markdown: bool,
    pub math_count: usize,
    pub markdown_count: usize,
    pub rendering_strategy: RenderingStrategy,
    pub issues: Vec<String>,
}

impl ContentAnalysis {
    /// Analysis of empty or whitespace-only content.
    pub fn empty() -> Self {
        Self {
            complexity: Complexity::None,
            has_math: false,
            has_markdown: false,
            math_count: 0,
            markdown_count: 0,
            rendering_strategy: RenderingStrategy::PlaintextSafe,
            issues: Vec::new(),
        }
    }

    /// Safe default used when analysis itself fails.
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            complexity: Complexity::Simple,
            rendering_strategy: RenderingStrategy::PlaintextSafe,
            issues: vec![format!("analysis failed: {}", message.into())],
            ..Self::empty()
        }
    }
}

lazy_static! {
    static ref DISPLAY_MATH: Regex = Regex::new(r"(?s)\$\$.+?\$\$").unwrap();
    static ref INLINE_MATH: Regex = Regex::new(r"\$[^$\n]+\$").unwrap();
    static ref LATEX_COMMAND: Regex = Regex::new(r"\\[A-Za-z]+").unwrap();
    static ref MATH_SYMBOL: Regex =
        Regex::new(r"[∑∫∏√∞≤≥≠≈±×÷∂∇∈∉⊂⊃∪∩∀∃→⇒αβγδεζηθλμπρστφχψωΓΔΘΛΠΣΦΨΩ]").unwrap();
    static ref HEADER: Regex = Regex::new(r"(?m)^\s{0,3}#{1,6}\s+\S").unwrap();
    static ref BOLD: Regex = Regex::new(r"\*\*[^*\n]+\*\*|__[^_\n]+__").unwrap();
    static ref ITALIC: Regex = Regex::new(r"(?:^|[^*])\*[^*\s][^*\n]*\*").unwrap();
    static ref CODE_BLOCK: Regex = Regex::new(r"(?s)```.*?```").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`[^`\n]+`").unwrap();
    static ref LIST_ITEM: Regex = Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+\S").unwrap();
    static ref LINK: Regex = Regex::new(r"\[[^\]\n]+\]\([^)\n]*\)").unwrap();
    static ref TABLE_ROW: Regex = Regex::new(r"(?m)^\s*\|.*\|\s*$").unwrap();
    static ref OVER_ESCAPED: Regex = Regex::new(r"\\{2,}[A-Za-z]").unwrap();
}

/// Classify `content` by math and Markdown density.
///
/// Deterministic and side-effect free.
pub fn analyze(content: &str) -> ContentAnalysis {
    if content.trim().is_empty() {
        return ContentAnalysis::empty();
    }

    match panic::catch_unwind(AssertUnwindSafe(|| classify(content))) {
        Ok(analysis) => analysis,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(error = %message, "content analysis failed; using safe default");
            ContentAnalysis::fallback(message)
        }
    }
}

fn classify(content: &str) -> ContentAnalysis {
    let math_count = [&*DISPLAY_MATH, &*INLINE_MATH, &*LATEX_COMMAND, &*MATH_SYMBOL]
        .iter()
        .map(|re| re.find_iter(content).count())
        .sum::<usize>();

    let markdown_count = [
        &*HEADER,
        &*BOLD,
        &*ITALIC,
        &*CODE_BLOCK,
        &*INLINE_CODE,
        &*LIST_ITEM,
        &*LINK,
        &*TABLE_ROW,
    ]
    .iter()
    .map(|re| re.find_iter(content).count())
    .sum::<usize>();

    let complexity = if math_count > COMPLEX_MATH_THRESHOLD
        || markdown_count > COMPLEX_MARKDOWN_THRESHOLD
    {
        Complexity::Complex
    } else if math_count > MODERATE_MATH_THRESHOLD || markdown_count > MODERATE_MARKDOWN_THRESHOLD
    {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    let has_math = math_count > 0;
    let has_markdown = markdown_count > 0;

    ContentAnalysis {
        complexity,
        has_math,
        has_markdown,
        math_count,
        markdown_count,
        rendering_strategy: suggest_strategy(complexity, has_math),
        issues: detect_issues(content),
    }
}

fn suggest_strategy(complexity: Complexity, has_math: bool) -> RenderingStrategy {
    match complexity {
        Complexity::Complex if has_math => RenderingStrategy::MathOptimized,
        Complexity::None => RenderingStrategy::PlaintextSafe,
        Complexity::Simple if !has_math => RenderingStrategy::PlaintextSafe,
        _ => RenderingStrategy::Progressive,
    }
}

/// Malformations the sanitizer knows how to repair.
fn detect_issues(content: &str) -> Vec<String> {
    let mut issues = Vec::new();

    if balance::count_unescaped(content, '$') % 2 == 1 {
        issues.push("odd number of unescaped '$' delimiters".to_string());
    }

    let braces = balance::brace_report(content);
    if braces.unmatched_close > 0 {
        issues.push(format!("{} unmatched closing brace(s)", braces.unmatched_close));
    }
    if braces.unclosed_open > 0 {
        issues.push(format!("{} unclosed opening brace(s)", braces.unclosed_open));
    }

    if OVER_ESCAPED.is_match(content) {
        issues.push("over-escaped LaTeX commands".to_string());
    }

    issues
}
