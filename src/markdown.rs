use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Styling of one run of assistant text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub text: String,
    pub style: SpanStyle,
}

fn parser(content: &str) -> Parser<'_> {
    Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH)
}

// Adjacent runs with the same style are merged
fn push(spans: &mut Vec<InlineSpan>, text: &str, style: SpanStyle) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(last) if last.style == style => last.text.push_str(text),
        _ => spans.push(InlineSpan {
            text: text.to_string(),
            style,
        }),
    }
}

/// Split text into styled runs, understanding `**bold**`, `*italic*`, `` `code` ``
/// and `~~strikethrough~~`. Block structure is flattened to line breaks.
pub fn inline_spans(content: &str) -> Vec<InlineSpan> {
    let mut spans: Vec<InlineSpan> = Vec::new();
    let mut style = SpanStyle::default();
    let mut blocks = 0usize;

    for event in parser(content) {
        match event {
            Event::Start(Tag::Strong) => style.bold = true,
            Event::End(TagEnd::Strong) => style.bold = false,
            Event::Start(Tag::Emphasis) => style.italic = true,
            Event::End(TagEnd::Emphasis) => style.italic = false,
            Event::Start(Tag::Strikethrough) => style.strikethrough = true,
            Event::End(TagEnd::Strikethrough) => style.strikethrough = false,
            Event::Start(Tag::Paragraph) | Event::Start(Tag::Heading { .. }) | Event::Start(Tag::Item) => {
                if blocks > 0 {
                    push(&mut spans, "\n", SpanStyle::default());
                }
                blocks += 1;
            }
            Event::Code(code) => push(
                &mut spans,
                &code,
                SpanStyle {
                    code: true,
                    ..style
                },
            ),
            Event::Text(text) => push(&mut spans, &text, style),
            Event::SoftBreak | Event::HardBreak => push(&mut spans, "\n", style),
            _ => {}
        }
    }

    spans
}

/// Text with markup turned into ANSI terminal styles
pub fn to_ansi(content: &str) -> String {
    let mut out = String::new();
    for span in inline_spans(content) {
        let mut codes = Vec::new();
        if span.style.bold {
            codes.push("1");
        }
        if span.style.italic {
            codes.push("3");
        }
        if span.style.code {
            codes.push("36");
        }
        if span.style.strikethrough {
            codes.push("9");
        }

        if codes.is_empty() {
            out.push_str(&span.text);
        } else {
            out.push_str(&format!("\x1b[{}m{}\x1b[0m", codes.join(";"), span.text));
        }
    }
    out
}
