//! Best-effort repair of malformed math and Markdown.
//!
//! Repairs run in a fixed order:
//!
//! 1. Collapse over-escaped command backslashes (`\\frac` -> `\frac`) and
//!    un-escape math delimiters (`\$` -> `$`).
//! 2. Trim whitespace inside the arguments of common one- and two-argument
//!    commands.
//! 3. Drop the last unescaped `$` when their count is odd.
//! 4. Delete stray `}` and close unclosed `{`.
//! 5. Collapse runs of blank lines and strip trailing whitespace.
//!
//! The ordered pass is repeated until it reaches a fixed point (bounded), so
//! the result is idempotent. An optional caller hook runs last. Nothing here
//! panics out to the caller: on internal failure the input comes back as-is.

pub mod balance;

use crate::analyzer::ContentAnalysis;
use crate::error::panic_message;
use lazy_static::lazy_static;
use regex::{Captures, NoExpand, Regex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Error type a sanitizer hook may return.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Domain-specific repair applied after the built-in steps.
pub type SanitizerHook = Arc<dyn Fn(&str) -> std::result::Result<String, HookError> + Send + Sync>;

/// Upper bound on repeated repair passes.
const MAX_PASSES: usize = 4;

/// Command names whose over-escaped forms are collapsed.
const KNOWN_COMMANDS: &[&str] = &[
    "alpha", "approx", "bar", "begin", "beta", "binom", "boldsymbol", "cap", "cdot", "cdots",
    "chi", "cos", "cup", "dbinom", "ddot", "Delta", "delta", "dfrac", "div", "dot", "dots",
    "end", "epsilon", "equiv", "eta", "exists", "exp", "forall", "frac", "Gamma", "gamma", "ge",
    "geq", "hat", "implies", "in", "infty", "int", "kappa", "Lambda", "lambda", "ldots", "le",
    "left", "leftarrow", "Leftarrow", "leq", "lim", "ln", "log", "mathbb", "mathbf", "mathcal",
    "mathit", "mathrm", "max", "min", "mp", "mu", "nabla", "ne", "neq", "notin", "nu", "Omega",
    "omega", "operatorname", "overline", "partial", "Phi", "phi", "Pi", "pi", "pm", "prod",
    "Psi", "psi", "quad", "qquad", "rho", "right", "rightarrow", "Rightarrow", "Sigma", "sigma",
    "sin", "sqrt", "subset", "subseteq", "sum", "supset", "tan", "tau", "text", "textbf",
    "textit", "tfrac", "Theta", "theta", "tilde", "times", "to", "underline", "varepsilon",
    "varphi", "vec", "xi", "zeta",
];

lazy_static! {
    static ref OVER_ESCAPED_COMMAND: Regex = Regex::new(r"\\{2,}([A-Za-z]+)").unwrap();
    static ref ESCAPED_DOLLAR: Regex = Regex::new(r"\\+\$").unwrap();
    static ref TWO_ARGUMENT: Regex = Regex::new(concat!(
        r"\\(frac|dfrac|tfrac|cfrac|binom|dbinom|tbinom|overset|underset|stackrel)",
        r"\s*\{\s*([^{}]*?)\s*\}\s*\{\s*([^{}]*?)\s*\}"
    ))
    .unwrap();
    static ref ONE_ARGUMENT: Regex = Regex::new(concat!(
        r"\\(sqrt(?:\[[^\]]*\])?|text|textbf|textit|mathrm|mathbf|mathit|mathbb|mathcal",
        r"|boldsymbol|operatorname|vec|hat|bar|tilde|dot|ddot|overline|underline)",
        r"\s*\{\s*([^{}]*?)\s*\}"
    ))
    .unwrap();
    static ref TRAILING_WHITESPACE: Regex = Regex::new(r"(?m)[ \t]+$").unwrap();
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Repair `content`.
///
/// Every step runs whatever `analysis` reports: content the analyzer sees as
/// math-free (a lone currency `$5`, an unclosed `fn main() {`) still leaves
/// with balanced braces and an even `$` count. The analysis only tags the
/// debug log.
pub fn sanitize(content: &str, analysis: Option<&ContentAnalysis>) -> String {
    sanitize_with_hook(content, analysis, None)
}

/// [`sanitize`] followed by a caller-supplied hook.
///
/// A hook error or panic is logged and the built-in result is kept.
pub fn sanitize_with_hook(
    content: &str,
    analysis: Option<&ContentAnalysis>,
    hook: Option<&SanitizerHook>,
) -> String {
    if let Some(analysis) = analysis {
        tracing::debug!(
            complexity = ?analysis.complexity,
            has_math = analysis.has_math,
            "sanitizing analyzed content"
        );
    }

    let repaired = match panic::catch_unwind(AssertUnwindSafe(|| repair(content))) {
        Ok(repaired) => repaired,
        Err(payload) => {
            tracing::warn!(
                error = %panic_message(payload.as_ref()),
                "sanitizer failed; passing content through unchanged"
            );
            return content.to_string();
        }
    };

    match hook {
        Some(hook) => apply_hook(hook, repaired),
        None => repaired,
    }
}

fn repair(content: &str) -> String {
    let mut current = content.to_string();

    for pass in 0..MAX_PASSES {
        let next = repair_pass(&current);
        if next == current {
            break;
        }
        tracing::debug!(
            pass,
            before = current.len(),
            after = next.len(),
            "sanitizer pass changed content"
        );
        current = next;
    }

    current
}

fn repair_pass(input: &str) -> String {
    let text = input.replace("\r\n", "\n");
    let text = deescalate(&text);
    let text = normalize_arguments(&text);
    let text = balance::balance_dollars(&text);
    let text = balance::balance_braces(&text);
    normalize_whitespace(&text)
}

/// Step 1: collapse `\\cmd` to `\cmd` for known commands and `\$` to `$`.
fn deescalate(input: &str) -> String {
    let collapsed = OVER_ESCAPED_COMMAND.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        if KNOWN_COMMANDS.contains(&name) {
            format!("\\{}", name)
        } else {
            caps[0].to_string()
        }
    });

    ESCAPED_DOLLAR
        .replace_all(&collapsed, NoExpand("$"))
        .into_owned()
}

/// Step 2: `\frac{ a }{ b }` -> `\frac{a}{b}`, `\sqrt{ x }` -> `\sqrt{x}`.
fn normalize_arguments(input: &str) -> String {
    let two = TWO_ARGUMENT.replace_all(input, |caps: &Captures| {
        format!("\\{}{{{}}}{{{}}}", &caps[1], &caps[2], &caps[3])
    });
    ONE_ARGUMENT
        .replace_all(&two, |caps: &Captures| format!("\\{}{{{}}}", &caps[1], &caps[2]))
        .into_owned()
}

/// Step 5: strip trailing blanks per line, then cap blank-line runs at one.
fn normalize_whitespace(input: &str) -> String {
    let trimmed = TRAILING_WHITESPACE.replace_all(input, "");
    EXCESS_NEWLINES.replace_all(&trimmed, "\n\n").into_owned()
}

fn apply_hook(hook: &SanitizerHook, repaired: String) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| hook(&repaired))) {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "sanitizer hook failed; keeping built-in repair");
            repaired
        }
        Err(payload) => {
            tracing::warn!(
                error = %panic_message(payload.as_ref()),
                "sanitizer hook panicked; keeping built-in repair"
            );
            repaired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapses_doubled_backslash() {
        assert_eq!(sanitize(r"\\frac{1}{2}mv^2", None), r"\frac{1}{2}mv^2");
        assert_eq!(sanitize(r"\\\alpha + \\\\beta", None), r"\alpha + \beta");
    }

    #[test]
    fn test_keeps_unknown_double_backslash() {
        assert_eq!(sanitize(r"a \\ b \\newline", None), r"a \\ b \\newline");
    }

    #[test]
    fn test_unescapes_dollars() {
        assert_eq!(sanitize(r"\$x\$ and \\$y\\$", None), "$x$ and $y$");
    }

    #[test]
    fn test_trims_arguments() {
        assert_eq!(sanitize(r"\frac{ a }{ b + 1 }", None), r"\frac{a}{b + 1}");
        assert_eq!(sanitize(r"\sqrt[3]{  x }", None), r"\sqrt[3]{x}");
        assert_eq!(sanitize(r"\text { speed }", None), r"\text{speed}");
    }

    #[test]
    fn test_odd_dollars_become_even() {
        let out = sanitize("$E=mc^2 and incomplete $formula", None);
        assert_eq!(balance::count_unescaped(&out, '$') % 2, 0);
        assert_eq!(
            sanitize("$E=mc^2$ and incomplete $formula", None),
            "$E=mc^2$ and incomplete formula"
        );
    }

    #[test]
    fn test_closes_braces() {
        assert_eq!(sanitize("text {unbalanced", None), "text {unbalanced}");
        assert_eq!(sanitize("x} + {y", None), "x + {y}");
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(sanitize("a  \n\n\n\nb\t\r\nc ", None), "a\n\nb\nc");
    }

    #[test]
    fn test_repair_converges_in_one_call() {
        let once = sanitize(r"\frac{ a }{b", None);
        assert_eq!(once, r"\frac{a}{b}");
        assert_eq!(sanitize(&once, None), once);
    }

    #[test]
    fn test_math_free_analysis_still_balances() {
        let code = "fn main() {\n    println!(\"hi\");\n";
        let analysis = analyze(code);
        assert!(!analysis.has_math);
        assert_eq!(sanitize(code, Some(&analysis)), format!("{}}}", code));
        assert_eq!(sanitize(code, Some(&analysis)), sanitize(code, None));

        let price = "Total: $5 {";
        let analysis = analyze(price);
        assert!(!analysis.has_math);
        assert_eq!(sanitize(price, Some(&analysis)), "Total: 5 {}");
    }

    #[test]
    fn test_hook_runs_last() {
        let hook: SanitizerHook = Arc::new(|s: &str| -> Result<String, HookError> {
            Ok(s.replace("colour", "color"))
        });
        assert_eq!(
            sanitize_with_hook("colour {x", None, Some(&hook)),
            "color {x}"
        );
    }

    #[test]
    fn test_hook_error_is_swallowed() {
        let hook: SanitizerHook = Arc::new(|_: &str| -> Result<String, HookError> {
            Err("hook broke".into())
        });
        assert_eq!(sanitize_with_hook("{x", None, Some(&hook)), "{x}");
    }

    #[test]
    fn test_hook_panic_is_swallowed() {
        let hook: SanitizerHook = Arc::new(|_: &str| -> Result<String, HookError> {
            panic!("hook exploded")
        });
        assert_eq!(sanitize_with_hook("$a$", None, Some(&hook)), "$a$");
    }
}
