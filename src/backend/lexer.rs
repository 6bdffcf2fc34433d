//! nom parsers for math segments and the Markdown the HTML backends understand.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while, take_while1},
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{map, not, peek, value, verify},
    sequence::{delimited, pair, tuple},
    IResult,
};

/// A run of content, either prose or math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    InlineMath(&'a str),
    DisplayMath(&'a str),
    /// An opening delimiter with no closing partner. `rest` runs from the
    /// delimiter to the end of input; `offset` is its byte position.
    Unterminated {
        delimiter: &'static str,
        rest: &'a str,
        offset: usize,
    },
}

/// An inline Markdown construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span<'a> {
    Code(&'a str),
    Strong(&'a str),
    Emphasis(&'a str),
    Link { text: &'a str, url: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Unordered,
    Ordered(u32),
}

/// Parse display math (`$$...$$` or `\[...\]`).
pub fn display_math(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        delimited(tag("$$"), map(take_until("$$"), Segment::DisplayMath), tag("$$")),
        delimited(tag("\\["), map(take_until("\\]"), Segment::DisplayMath), tag("\\]")),
    ))(input)
}

/// Parse inline math (`$...$` or `\(...\)`).
pub fn inline_math(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        delimited(
            pair(char('$'), peek(not(char('$')))), // Not display math
            map(take_until("$"), Segment::InlineMath),
            char('$'),
        ),
        delimited(tag("\\("), map(take_until("\\)"), Segment::InlineMath), tag("\\)")),
    ))(input)
}

fn opening_delimiter(input: &str) -> IResult<&str, &'static str> {
    alt((
        value("$$", tag("$$")),
        value("\\[", tag("\\[")),
        value("\\(", tag("\\(")),
        value("$", tag("$")),
    ))(input)
}

/// Split `input` into text and math segments.
///
/// Delimiters preceded by a backslash are text. The first delimiter without
/// a closing partner ends the scan with [`Segment::Unterminated`].
pub fn segments(input: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;
    let mut prev_backslash = false;

    while pos < input.len() {
        let rest = &input[pos..];
        let candidate = !prev_backslash
            && (rest.starts_with('$') || rest.starts_with("\\(") || rest.starts_with("\\["));

        if candidate {
            if let Ok((remaining, segment)) = alt((display_math, inline_math))(rest) {
                if text_start < pos {
                    out.push(Segment::Text(&input[text_start..pos]));
                }
                out.push(segment);
                pos = input.len() - remaining.len();
                text_start = pos;
                prev_backslash = false;
                continue;
            }
            if let Ok((_, delimiter)) = opening_delimiter(rest) {
                if text_start < pos {
                    out.push(Segment::Text(&input[text_start..pos]));
                }
                out.push(Segment::Unterminated {
                    delimiter,
                    rest,
                    offset: pos,
                });
                return out;
            }
        }

        let Some(c) = rest.chars().next() else { break };
        prev_backslash = c == '\\';
        pos += c.len_utf8();
    }

    if text_start < input.len() {
        out.push(Segment::Text(&input[text_start..]));
    }
    out
}

/// Parse an ATX heading (`## Title`), returning level and text.
pub fn heading(input: &str) -> IResult<&str, (u8, &str)> {
    let (input, hashes) = verify(take_while1(|c: char| c == '#'), |h: &str| h.len() <= 6)(input)?;
    let (input, _) = space1(input)?;
    let (input, content) = not_line_ending(input)?;

    // A closing run of `#` only counts when separated by a space
    let content = content.trim_end();
    let content = match content.trim_end_matches('#') {
        stripped if stripped.is_empty() || stripped.ends_with(' ') => stripped.trim_end(),
        _ => content,
    };
    Ok((input, (hashes.len() as u8, content)))
}

/// Parse a list item marker; the remaining input is the item text.
pub fn list_item_marker(input: &str) -> IResult<&str, ListMarker> {
    alt((
        value(
            ListMarker::Unordered,
            pair(alt((char('-'), char('*'), char('+'))), space1),
        ),
        map(
            tuple((
                take_while1(|c: char| c.is_ascii_digit()),
                alt((char('.'), char(')'))),
                space1,
            )),
            |(num, _, _): (&str, _, _)| ListMarker::Ordered(num.parse().unwrap_or(1)),
        ),
    ))(input)
}

/// Parse a code fence opener, returning the fence and the language tag.
pub fn fence_open(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, fence) = alt((tag("```"), tag("~~~")))(input)?;
    let (input, _) = space0(input)?;
    let (input, lang) =
        take_while(|c: char| c.is_alphanumeric() || c == '-' || c == '_' || c == '+')(input)?;
    Ok((input, (fence, lang)))
}

fn is_tight(s: &str) -> bool {
    !s.is_empty() && !s.starts_with(char::is_whitespace) && !s.ends_with(char::is_whitespace)
}

/// Parse inline code (`code`).
pub fn inline_code(input: &str) -> IResult<&str, Span<'_>> {
    let (input, _) = char('`')(input)?;
    let (input, _) = peek(not(char('`')))(input)?;
    let (input, content) = take_until("`")(input)?;
    let (input, _) = char('`')(input)?;
    Ok((input, Span::Code(content)))
}

/// Parse strong (**text** or __text__).
pub fn strong(input: &str) -> IResult<&str, Span<'_>> {
    alt((
        delimited(tag("**"), map(verify(take_until("**"), is_tight), Span::Strong), tag("**")),
        delimited(tag("__"), map(verify(take_until("__"), is_tight), Span::Strong), tag("__")),
    ))(input)
}

/// Parse emphasis (*text* or _text_).
pub fn emphasis(input: &str) -> IResult<&str, Span<'_>> {
    alt((
        delimited(
            pair(char('*'), peek(not(char('*')))),
            map(verify(take_until("*"), is_tight), Span::Emphasis),
            char('*'),
        ),
        delimited(
            pair(char('_'), peek(not(char('_')))),
            map(verify(take_until("_"), is_tight), Span::Emphasis),
            char('_'),
        ),
    ))(input)
}

/// Parse a link ([text](url)).
///
/// Link text stops at the next bracket or newline, so a run of unclosed `[`
/// is scanned once in total rather than once per bracket.
pub fn link(input: &str) -> IResult<&str, Span<'_>> {
    let (input, text) = delimited(
        char('['),
        take_till(|c: char| matches!(c, '[' | ']' | '\n')),
        char(']'),
    )(input)?;
    let (input, url) = delimited(
        char('('),
        take_while(|c: char| c != ')' && !c.is_whitespace()),
        char(')'),
    )(input)?;
    Ok((input, Span::Link { text, url }))
}

/// Parse any inline construct.
pub fn inline_span(input: &str) -> IResult<&str, Span<'_>> {
    alt((inline_code, strong, emphasis, link))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_math() {
        assert_eq!(
            inline_math("$E = mc^2$ rest"),
            Ok((" rest", Segment::InlineMath("E = mc^2")))
        );
        assert_eq!(
            inline_math(r"\(x\) rest"),
            Ok((" rest", Segment::InlineMath("x")))
        );
    }

    #[test]
    fn test_display_math() {
        assert_eq!(
            display_math("$$\\int_0^1 x dx$$"),
            Ok(("", Segment::DisplayMath("\\int_0^1 x dx")))
        );
        assert_eq!(
            display_math(r"\[a\]"),
            Ok(("", Segment::DisplayMath("a")))
        );
    }

    #[test]
    fn test_segments() {
        assert_eq!(
            segments("a $x$ b $$y$$ c"),
            vec![
                Segment::Text("a "),
                Segment::InlineMath("x"),
                Segment::Text(" b "),
                Segment::DisplayMath("y"),
                Segment::Text(" c"),
            ]
        );
    }

    #[test]
    fn test_segments_escaped_dollar_is_text() {
        assert_eq!(segments(r"costs \$5"), vec![Segment::Text(r"costs \$5")]);
    }

    #[test]
    fn test_segments_unterminated() {
        assert_eq!(
            segments("ok $x$ then $$broken"),
            vec![
                Segment::Text("ok "),
                Segment::InlineMath("x"),
                Segment::Text(" then "),
                Segment::Unterminated {
                    delimiter: "$$",
                    rest: "$$broken",
                    offset: 12,
                },
            ]
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(heading("# Hello World"), Ok(("", (1, "Hello World"))));
        assert_eq!(heading("### Level 3 ###"), Ok(("", (3, "Level 3"))));
        assert_eq!(heading("## C#"), Ok(("", (2, "C#"))));
        assert!(heading("####### seven").is_err());
        assert!(heading("#hashtag").is_err());
    }

    #[test]
    fn test_list_item_marker() {
        assert_eq!(list_item_marker("- item"), Ok(("item", ListMarker::Unordered)));
        assert_eq!(list_item_marker("3. item"), Ok(("item", ListMarker::Ordered(3))));
        assert!(list_item_marker("**bold**").is_err());
    }

    #[test]
    fn test_inline_spans() {
        assert_eq!(inline_span("**b** x"), Ok((" x", Span::Strong("b"))));
        assert_eq!(inline_span("*e*"), Ok(("", Span::Emphasis("e"))));
        assert_eq!(inline_span("`c`"), Ok(("", Span::Code("c"))));
        assert_eq!(
            inline_span("[docs](http://x)"),
            Ok(("", Span::Link { text: "docs", url: "http://x" }))
        );
        assert!(inline_span("* not emphasis *").is_err());
    }

    #[test]
    fn test_link_text_stops_at_bracket_or_newline() {
        assert!(link("[a[b](u)").is_err());
        assert!(link("[two\nlines](u)").is_err());
        assert_eq!(
            link("[b](u) rest"),
            Ok((" rest", Span::Link { text: "b", url: "u" }))
        );
    }

    #[test]
    fn test_fence_open() {
        assert_eq!(fence_open("```rust"), Ok(("", ("```", "rust"))));
        assert_eq!(fence_open("~~~"), Ok(("", ("~~~", ""))));
    }
}
