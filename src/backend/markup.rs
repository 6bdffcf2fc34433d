//! HTML building blocks shared by the built-in renderers.

use super::lexer::{self, ListMarker, Segment, Span};
use crate::error::RenderError;

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wrap a rendered body in the container every built-in backend emits.
pub(crate) fn wrap(prefix: &str, strategy: &str, body: &str) -> String {
    format!(
        "<div class=\"{p}-content {p}-{s}\">\n{b}</div>",
        p = prefix,
        s = strategy,
        b = body
    )
}

/// Link targets that could run script are replaced with `#`.
fn safe_url(url: &str) -> String {
    let lower = url.trim().to_ascii_lowercase();
    if ["javascript:", "vbscript:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        "#".to_string()
    } else {
        escape_html(url)
    }
}

/// Render inline Markdown in a text run. Never fails.
pub(crate) fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        // `_` inside a word is literal (snake_case)
        let opens = match c {
            '*' | '`' | '[' => true,
            '_' => !prev.map_or(false, char::is_alphanumeric),
            _ => false,
        };

        if opens {
            if let Ok((remaining, span)) = lexer::inline_span(rest) {
                push_span(&mut out, span);
                prev = rest[..rest.len() - remaining.len()].chars().last();
                rest = remaining;
                continue;
            }
        }

        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}

fn push_span(out: &mut String, span: Span<'_>) {
    match span {
        Span::Code(code) => {
            out.push_str("<code>");
            out.push_str(&escape_html(code));
            out.push_str("</code>");
        }
        Span::Strong(text) => {
            out.push_str("<strong>");
            out.push_str(&inline(text));
            out.push_str("</strong>");
        }
        Span::Emphasis(text) => {
            out.push_str("<em>");
            out.push_str(&inline(text));
            out.push_str("</em>");
        }
        Span::Link { text, url } => {
            out.push_str(&format!("<a href=\"{}\">", safe_url(url)));
            out.push_str(&inline(text));
            out.push_str("</a>");
        }
    }
}

/// Render text and math segments of `text`, delegating math to `math`.
///
/// `base` is the byte offset of `text` in the full content; it is added to
/// unterminated-delimiter offsets before `math` sees them.
pub(crate) fn render_spans<M>(text: &str, base: usize, mut math: M) -> Result<String, RenderError>
where
    M: FnMut(Segment<'_>) -> Result<String, RenderError>,
{
    let mut out = String::with_capacity(text.len() + 16);
    for segment in lexer::segments(text) {
        match segment {
            Segment::Text(run) => out.push_str(&inline(run)),
            Segment::Unterminated {
                delimiter,
                rest,
                offset,
            } => out.push_str(&math(Segment::Unterminated {
                delimiter,
                rest,
                offset: base + offset,
            })?),
            other => out.push_str(&math(other)?),
        }
    }
    Ok(out)
}

/// A block-level element of Markdown content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block<'a> {
    Heading(u8, &'a str),
    List {
        start: Option<u32>,
        items: Vec<&'a str>,
    },
    Code {
        lang: &'a str,
        body: &'a str,
    },
    Paragraph(&'a str),
}

/// Display-math delimiters seen so far in the open paragraph, counted line
/// by line so a long paragraph is never rescanned.
#[derive(Debug, Default, Clone, Copy)]
struct DisplayTally {
    dollars: usize,
    opens: usize,
    closes: usize,
}

impl DisplayTally {
    fn add(&mut self, line: &str) {
        self.dollars += line.matches("$$").count();
        self.opens += line.matches("\\[").count();
        self.closes += line.matches("\\]").count();
    }

    /// True while the paragraph holds an unclosed display-math block.
    fn is_open(&self) -> bool {
        self.dollars % 2 == 1 || self.opens > self.closes
    }
}

#[derive(Default)]
struct BlockBuilder<'a> {
    blocks: Vec<Block<'a>>,
    paragraph: Option<(usize, usize)>,
    display: DisplayTally,
    list: Option<(Option<u32>, Vec<&'a str>)>,
}

impl<'a> BlockBuilder<'a> {
    fn flush_paragraph(&mut self, content: &'a str) {
        self.display = DisplayTally::default();
        if let Some((start, end)) = self.paragraph.take() {
            self.blocks.push(Block::Paragraph(&content[start..end]));
        }
    }

    fn flush_list(&mut self) {
        if let Some((start, items)) = self.list.take() {
            self.blocks.push(Block::List { start, items });
        }
    }

    fn flush(&mut self, content: &'a str) {
        self.flush_paragraph(content);
        self.flush_list();
    }
}

/// Split content into blocks: fenced code, ATX headings, lists, paragraphs.
///
/// Blank lines inside an open display-math block do not end the paragraph.
pub(crate) fn blocks(content: &str) -> Vec<Block<'_>> {
    let mut builder = BlockBuilder::default();
    let mut fence: Option<(&str, &str, usize)> = None;
    let mut pos = 0;

    for raw in content.split_inclusive('\n') {
        let start = pos;
        pos += raw.len();
        let line = raw.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let end = start + line.len();

        if let Some((marker, lang, body_start)) = fence {
            if line.trim_start().starts_with(marker) {
                builder.blocks.push(Block::Code {
                    lang,
                    body: &content[body_start..start],
                });
                fence = None;
            }
            continue;
        }

        if let Some((para_start, _)) = builder.paragraph {
            if builder.display.is_open() {
                builder.paragraph = Some((para_start, end));
                builder.display.add(line);
                continue;
            }
        }

        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Ok((_, (marker, lang))) = lexer::fence_open(trimmed) {
            builder.flush(content);
            fence = Some((marker, lang, pos));
        } else if trimmed.is_empty() {
            builder.flush(content);
        } else if let Ok((_, (level, text))) = lexer::heading(trimmed) {
            builder.flush(content);
            builder.blocks.push(Block::Heading(level, text));
        } else if let Ok((item, marker)) = lexer::list_item_marker(trimmed) {
            builder.flush_paragraph(content);
            let start = match marker {
                ListMarker::Ordered(n) => Some(n),
                ListMarker::Unordered => None,
            };
            match &mut builder.list {
                Some((kind, items)) if kind.is_some() == start.is_some() => items.push(item),
                _ => {
                    builder.flush_list();
                    builder.list = Some((start, vec![item]));
                }
            }
        } else {
            builder.flush_list();
            builder.paragraph = Some(match builder.paragraph {
                Some((para_start, _)) => (para_start, end),
                None => (start + indent, end),
            });
            builder.display.add(trimmed);
        }
    }

    if let Some((_, lang, body_start)) = fence {
        builder.blocks.push(Block::Code {
            lang,
            body: &content[body_start..],
        });
    }
    builder.flush(content);
    builder.blocks
}

/// Byte offset of `inner` within `outer`; `inner` must be a subslice.
fn offset_in(outer: &str, inner: &str) -> usize {
    (inner.as_ptr() as usize).saturating_sub(outer.as_ptr() as usize)
}

fn is_display_only(text: &str) -> bool {
    let segments = lexer::segments(text);
    segments
        .iter()
        .any(|s| matches!(s, Segment::DisplayMath(_)))
        && segments.iter().all(|s| match s {
            Segment::DisplayMath(_) => true,
            Segment::Text(t) => t.trim().is_empty(),
            _ => false,
        })
}

/// Render `content` block by block; `spans` renders each block's inline text
/// given its byte offset in `content`.
pub(crate) fn render_blocks<F>(content: &str, mut spans: F) -> Result<String, RenderError>
where
    F: FnMut(&str, usize) -> Result<String, RenderError>,
{
    let mut html = String::with_capacity(content.len() * 2);

    for block in blocks(content) {
        match block {
            Block::Heading(level, text) => {
                let body = spans(text, offset_in(content, text))?;
                html.push_str(&format!("<h{0}>{1}</h{0}>\n", level, body));
            }
            Block::List { start, items } => {
                let (open, close) = match start {
                    None => ("<ul>\n".to_string(), "</ul>\n"),
                    Some(1) => ("<ol>\n".to_string(), "</ol>\n"),
                    Some(n) => (format!("<ol start=\"{}\">\n", n), "</ol>\n"),
                };
                html.push_str(&open);
                for item in items {
                    html.push_str("<li>");
                    html.push_str(&spans(item, offset_in(content, item))?);
                    html.push_str("</li>\n");
                }
                html.push_str(close);
            }
            Block::Code { lang, body } => {
                let body = escape_html(body.trim_end_matches('\n'));
                if lang.is_empty() {
                    html.push_str(&format!("<pre><code>{}</code></pre>\n", body));
                } else {
                    html.push_str(&format!(
                        "<pre><code class=\"language-{}\">{}</code></pre>\n",
                        escape_html(lang),
                        body
                    ));
                }
            }
            Block::Paragraph(text) => {
                let body = spans(text, offset_in(content, text))?;
                if is_display_only(text) {
                    html.push_str(body.trim());
                    html.push('\n');
                } else {
                    html.push_str("<p>");
                    html.push_str(&body);
                    html.push_str("</p>\n");
                }
            }
        }
    }

    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_markdown() {
        assert_eq!(
            inline("**bold** and *it* and `a<b` see [x](http://y)"),
            "<strong>bold</strong> and <em>it</em> and <code>a&lt;b</code> see <a href=\"http://y\">x</a>"
        );
    }

    #[test]
    fn test_snake_case_is_literal() {
        assert_eq!(inline("snake_case_name"), "snake_case_name");
        assert_eq!(inline("_word_"), "<em>word</em>");
    }

    #[test]
    fn test_script_links_are_neutralized() {
        assert_eq!(inline("[x](javascript:alert)"), "<a href=\"#\">x</a>");
        assert_eq!(inline("<script>"), "&lt;script&gt;");
    }

    #[test]
    fn test_unclosed_brackets_stay_literal() {
        assert_eq!(inline("[a[b](u)"), "[a<a href=\"u\">b</a>");
        assert_eq!(inline(&"[a".repeat(3)), "[a[a[a");
    }

    #[test]
    fn test_blocks() {
        let content =
            "# Title\n\nSome text\nmore\n\n- a\n- b\n1. c\n\n```rust\nlet x = 1;\n```\ntail";
        assert_eq!(
            blocks(content),
            vec![
                Block::Heading(1, "Title"),
                Block::Paragraph("Some text\nmore"),
                Block::List {
                    start: None,
                    items: vec!["a", "b"]
                },
                Block::List {
                    start: Some(1),
                    items: vec!["c"]
                },
                Block::Code {
                    lang: "rust",
                    body: "let x = 1;\n"
                },
                Block::Paragraph("tail"),
            ]
        );
    }

    #[test]
    fn test_display_math_spans_blank_lines() {
        assert_eq!(
            blocks("$$\na\n\nb\n$$\nafter\n\nnext"),
            vec![
                Block::Paragraph("$$\na\n\nb\n$$\nafter"),
                Block::Paragraph("next"),
            ]
        );
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        assert_eq!(
            blocks("```\ncode"),
            vec![Block::Code {
                lang: "",
                body: "code"
            }]
        );
    }

    #[test]
    fn test_render_spans_offsets() {
        let mut seen = None;
        let html = render_spans("a $b", 10, |segment| {
            if let Segment::Unterminated { offset, .. } = segment {
                seen = Some(offset);
            }
            Ok(String::from("!"))
        });
        assert_eq!(html, Ok("a !".to_string()));
        assert_eq!(seen, Some(12));
    }
}
