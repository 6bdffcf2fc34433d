//! Content rewrites applied when degrading to a weaker strategy.

use super::Strategy;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Nested `\frac`/`\sqrt` need one rewrite per level; this caps the loop.
const MAX_NESTING_DEPTH: usize = 8;

lazy_static! {
    static ref DISPLAY_DOLLARS: Regex = Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap();
    static ref DISPLAY_BRACKETS: Regex = Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap();
    static ref INLINE_DOLLARS: Regex = Regex::new(r"\$([^$]+)\$").unwrap();
    static ref MATH_MARKER: Regex = Regex::new(r"\\[\[\]()]").unwrap();
    static ref SQUARE_ROOT: Regex = Regex::new(r"\\sqrt\s*\{([^{}]*)\}").unwrap();
    static ref FRACTION: Regex =
        Regex::new(r"\\[dtc]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").unwrap();
    static ref HEADER_MARK: Regex = Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").unwrap();
    static ref QUOTE_MARK: Regex = Regex::new(r"(?m)^[ \t]{0,3}>[ \t]?").unwrap();
    static ref CODE_FENCE: Regex = Regex::new(r"(?m)^[ \t]*(?:```|~~~).*$").unwrap();
    static ref STRONG: Regex = Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").unwrap();
    static ref EMPHASIS: Regex = Regex::new(r"\*([^*\n]+)\*").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`([^`\n]+)`").unwrap();
    static ref LINK: Regex = Regex::new(r"!?\[([^\]\n]*)\]\([^)\n]*\)").unwrap();
}

/// Rewrite `content` for `target`, the strategy being degraded to.
pub fn transform_for(target: Strategy, content: &str) -> String {
    match target {
        Strategy::Simplified => to_simplified(content),
        Strategy::Basic => to_basic(content),
        Strategy::Plaintext => to_plaintext(content),
        Strategy::Full | Strategy::ErrorFallback => content.to_string(),
    }
}

/// Turn display math into inline math: `$$x$$` and `\[x\]` become `$x$`.
pub fn to_simplified(content: &str) -> String {
    let out = DISPLAY_DOLLARS.replace_all(content, as_inline_math);
    DISPLAY_BRACKETS.replace_all(&out, as_inline_math).into_owned()
}

fn as_inline_math(caps: &Captures) -> String {
    format!("${}$", squash_whitespace(&caps[1]))
}

/// Strip every math delimiter, leaving the TeX source in place.
pub fn to_basic(content: &str) -> String {
    let out = DISPLAY_DOLLARS.replace_all(content, |caps: &Captures| caps[1].trim().to_string());
    let out = INLINE_DOLLARS.replace_all(&out, "$1");
    let out = MATH_MARKER.replace_all(&out, "");
    out.replace('$', "")
}

/// Strip math and Markdown markup down to readable text.
pub fn to_plaintext(content: &str) -> String {
    let text = to_basic(content);

    let text = CODE_FENCE.replace_all(&text, "");
    let text = HEADER_MARK.replace_all(&text, "");
    let text = QUOTE_MARK.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = STRONG.replace_all(&text, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map_or(String::new(), |m| m.as_str().to_string())
    });
    let text = EMPHASIS.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");

    let mut text = text.into_owned();
    for _ in 0..MAX_NESTING_DEPTH {
        let next = SQUARE_ROOT.replace_all(&text, |caps: &Captures| {
            format!("√{}", wrap_operand(&caps[1]))
        });
        let next = FRACTION
            .replace_all(&next, |caps: &Captures| {
                format!("{}/{}", wrap_operand(&caps[1]), wrap_operand(&caps[2]))
            })
            .into_owned();
        if next == text {
            break;
        }
        text = next;
    }

    strip_tex(&text)
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wrap_operand(s: &str) -> String {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) || s.contains(|c: char| c == '+' || c == '-') {
        format!("({})", s)
    } else {
        s.to_string()
    }
}

/// Replace commands with glyphs or nothing, and drop grouping braces.
fn strip_tex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(next) if next.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !n.is_ascii_alphabetic() {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    push_command(&mut out, &name);
                }
                Some('\\') | Some(',') | Some(';') | Some(':') | Some('!') | Some(' ') => {
                    chars.next();
                    out.push(' ');
                }
                Some(next) => {
                    chars.next();
                    out.push(next);
                }
                None => {}
            },
            '{' | '}' => {}
            _ => out.push(c),
        }
    }

    out
}

fn push_command(out: &mut String, name: &str) {
    let glyph = match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "theta" => "θ",
        "lambda" => "λ",
        "mu" => "μ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "phi" | "varphi" => "φ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Phi" => "Φ",
        "Omega" => "Ω",
        "infty" => "∞",
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "equiv" => "≡",
        "pm" => "±",
        "times" => "×",
        "cdot" => "·",
        "div" => "÷",
        "sum" => "∑",
        "prod" => "∏",
        "int" => "∫",
        "partial" => "∂",
        "nabla" => "∇",
        "in" => "∈",
        "forall" => "∀",
        "exists" => "∃",
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "Rightarrow" | "implies" => "⇒",
        "sqrt" => "√",
        "cdots" | "ldots" | "dots" => "…",
        "quad" | "qquad" => " ",
        "sin" | "cos" | "tan" | "log" | "ln" | "exp" | "lim" | "max" | "min" => name,
        _ => "",
    };
    out.push_str(glyph);
}
