//! Single-pass scanners for `$` and brace balance.
//!
//! A character counts as escaped when the character right before it is a
//! backslash. Every function here is one left-to-right walk over the input,
//! so running time stays linear on pathological input.

/// Count occurrences of `target` that are not preceded by a backslash.
pub fn count_unescaped(input: &str, target: char) -> usize {
    let mut count = 0;
    let mut prev_backslash = false;

    for c in input.chars() {
        if c == target && !prev_backslash {
            count += 1;
        }
        prev_backslash = c == '\\';
    }

    count
}

/// Drop the last unescaped `$` when their count is odd.
///
/// This is a heuristic: the dropped delimiter is not necessarily the
/// spurious one.
pub fn balance_dollars(input: &str) -> String {
    let mut count = 0;
    let mut last = None;
    let mut prev_backslash = false;

    for (i, c) in input.char_indices() {
        if c == '$' && !prev_backslash {
            count += 1;
            last = Some(i);
        }
        prev_backslash = c == '\\';
    }

    match last {
        Some(i) if count % 2 == 1 => {
            let mut out = String::with_capacity(input.len());
            out.push_str(&input[..i]);
            out.push_str(&input[i + 1..]);
            out
        }
        _ => input.to_string(),
    }
}

/// Delete unmatched `}` and close unclosed `{` at the end.
pub fn balance_braces(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut depth = 0usize;
    let mut prev_backslash = false;

    for c in input.chars() {
        if !prev_backslash {
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => continue,
                '}' => depth -= 1,
                _ => {}
            }
        }
        out.push(c);
        prev_backslash = c == '\\';
    }

    if depth > 0 {
        // A trailing backslash would escape the first appended brace.
        if prev_backslash {
            out.push(' ');
        }
        out.extend(std::iter::repeat('}').take(depth));
    }

    out
}

/// Brace balance summary for diagnostics and validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BraceReport {
    /// `}` that appeared at depth zero.
    pub unmatched_close: usize,
    /// `{` still open at the end of input.
    pub unclosed_open: usize,
}

impl BraceReport {
    pub fn is_balanced(&self) -> bool {
        self.unmatched_close == 0 && self.unclosed_open == 0
    }
}

/// Report brace balance without modifying the input.
pub fn brace_report(input: &str) -> BraceReport {
    let mut report = BraceReport::default();
    let mut depth = 0usize;
    let mut prev_backslash = false;

    for c in input.chars() {
        if !prev_backslash {
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => report.unmatched_close += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        prev_backslash = c == '\\';
    }

    report.unclosed_open = depth;
    report
}
