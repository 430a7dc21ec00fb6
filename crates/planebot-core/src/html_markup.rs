//! Conversion between the tracker's HTML descriptions and chat markup.
//!
//! Only a small tag subset survives: bold, italic, underline, strike, code,
//! preformatted blocks, links and line breaks. Spans are unwrapped and every
//! other tag is dropped. Text between tags is escaped for MarkdownV2 after
//! entity decoding.

use crate::markup_escape::{escape_markdown_v2, escape_markdown_v2_code, escape_markdown_v2_link_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineStyle {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Pre,
    Link,
}

impl InlineStyle {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "b" | "strong" => Some(Self::Bold),
            "i" | "em" => Some(Self::Italic),
            "u" | "ins" => Some(Self::Underline),
            "s" | "strike" | "del" => Some(Self::Strike),
            "code" => Some(Self::Code),
            "pre" => Some(Self::Pre),
            "a" => Some(Self::Link),
            _ => None,
        }
    }

    fn open_marker(self) -> &'static str {
        match self {
            Self::Bold => "*",
            Self::Italic => "_",
            Self::Underline => "__",
            Self::Strike => "~",
            Self::Code => "`",
            Self::Pre => "```\n",
            Self::Link => "[",
        }
    }
}

#[derive(Debug, Clone)]
struct OpenStyle {
    style: InlineStyle,
    // Only set for links; `None` when the anchor had no usable href.
    href: Option<String>,
    // Output length right after the opening marker.
    content_start: usize,
}

#[derive(Debug)]
struct HtmlTag<'a> {
    name: String,
    closing: bool,
    attributes: &'a str,
}

/// Converts tracker description HTML into escaped MarkdownV2.
pub fn html_to_markdown_v2(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut open: Vec<OpenStyle> = Vec::new();
    let mut cursor = 0;

    while cursor < html.len() {
        let rest = &html[cursor..];
        let Some(tag_start) = rest.find('<') else {
            push_text(&mut output, rest, &open);
            break;
        };
        push_text(&mut output, &rest[..tag_start], &open);
        let tag_body = &rest[tag_start + 1..];
        let Some(tag_end) = tag_body.find('>') else {
            push_text(&mut output, &rest[tag_start..], &open);
            break;
        };
        match parse_tag(&tag_body[..tag_end]) {
            Some(tag) => {
                apply_tag(&mut output, &mut open, &tag);
                cursor += tag_start + tag_end + 2;
            }
            None => {
                push_text(&mut output, "<", &open);
                cursor += tag_start + 1;
            }
        }
    }

    while let Some(style) = open.pop() {
        close_style(&mut output, &style);
    }
    output.trim().to_string()
}

/// Plain-text view of a description, used to decide whether two descriptions differ.
pub fn html_to_plain_text(html: &str) -> String {
    let mut plain = String::with_capacity(html.len());
    let mut cursor = 0;
    while cursor < html.len() {
        let rest = &html[cursor..];
        let Some(tag_start) = rest.find('<') else {
            plain.push_str(&decode_entities(rest));
            break;
        };
        plain.push_str(&decode_entities(&rest[..tag_start]));
        let Some(tag_end) = rest[tag_start..].find('>') else {
            plain.push_str(&decode_entities(&rest[tag_start..]));
            break;
        };
        match parse_tag(&rest[tag_start + 1..tag_start + tag_end]) {
            Some(tag) => {
                if is_line_break(&tag) {
                    plain.push('\n');
                }
                cursor += tag_start + tag_end + 1;
            }
            None => {
                plain.push('<');
                cursor += tag_start + 1;
            }
        }
    }
    plain.trim().to_string()
}

/// Wraps user-typed description text into the HTML body the tracker stores.
pub fn plain_text_to_html(text: &str) -> String {
    let body = text
        .lines()
        .map(encode_entities)
        .collect::<Vec<_>>()
        .join("<br>");
    format!("<p>{body}</p>")
}

fn apply_tag(output: &mut String, open: &mut Vec<OpenStyle>, tag: &HtmlTag<'_>) {
    if is_line_break(tag) {
        output.push('\n');
        return;
    }
    let Some(style) = InlineStyle::from_tag(&tag.name) else {
        return;
    };
    if tag.closing {
        let Some(position) = open.iter().rposition(|entry| entry.style == style) else {
            return;
        };
        while open.len() > position {
            if let Some(entry) = open.pop() {
                close_style(output, &entry);
            }
        }
        return;
    }
    if inside_verbatim(open) {
        return;
    }
    let href = if style == InlineStyle::Link {
        match attribute_value(tag.attributes, "href") {
            Some(href) if !href.trim().is_empty() => Some(decode_entities(href.trim())),
            _ => return,
        }
    } else {
        None
    };
    output.push_str(style.open_marker());
    open.push(OpenStyle {
        style,
        href,
        content_start: output.len(),
    });
}

fn close_style(output: &mut String, entry: &OpenStyle) {
    if output.len() == entry.content_start {
        output.truncate(entry.content_start - entry.style.open_marker().len());
        return;
    }
    match entry.style {
        InlineStyle::Bold => output.push('*'),
        InlineStyle::Italic => output.push('_'),
        InlineStyle::Underline => output.push_str("__"),
        InlineStyle::Strike => output.push('~'),
        InlineStyle::Code => output.push('`'),
        InlineStyle::Pre => output.push_str("\n```"),
        InlineStyle::Link => {
            output.push_str("](");
            output.push_str(&escape_markdown_v2_link_url(
                entry.href.as_deref().unwrap_or_default(),
            ));
            output.push(')');
        }
    }
}

fn push_text(output: &mut String, raw: &str, open: &[OpenStyle]) {
    if raw.is_empty() {
        return;
    }
    let decoded = decode_entities(raw);
    if inside_verbatim(open) {
        output.push_str(&escape_markdown_v2_code(&decoded));
    } else {
        output.push_str(&escape_markdown_v2(&decoded));
    }
}

fn inside_verbatim(open: &[OpenStyle]) -> bool {
    open.iter()
        .any(|entry| matches!(entry.style, InlineStyle::Code | InlineStyle::Pre))
}

fn is_line_break(tag: &HtmlTag<'_>) -> bool {
    match tag.name.as_str() {
        "br" => true,
        "p" | "div" | "li" => tag.closing,
        _ => false,
    }
}

/// A tag name must follow `<` or `</` directly, so `a < b > c` stays text.
fn parse_tag(raw: &str) -> Option<HtmlTag<'_>> {
    let raw = raw.trim_end();
    let (closing, body) = match raw.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, raw),
    };
    if !body.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
        return None;
    }
    let body = body.strip_suffix('/').unwrap_or(body);
    let name_end = body
        .find(|ch: char| !ch.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    if name_end == 0 {
        return None;
    }
    Some(HtmlTag {
        name: body[..name_end].to_ascii_lowercase(),
        closing,
        attributes: &body[name_end..],
    })
}

fn attribute_value<'a>(attributes: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attributes;
    while let Some(position) = rest.find(name) {
        let preceded_ok = rest[..position]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let after = rest[position + name.len()..].trim_start();
        if preceded_ok {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let inner = &value[1..];
                    return inner.find(quote).map(|end| &inner[..end]);
                }
                let end = value.find(char::is_whitespace).unwrap_or(value.len());
                return Some(&value[..end]);
            }
        }
        rest = &rest[position + name.len()..];
    }
    None
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&candidate[1..end]) {
                Some(ch) => {
                    decoded.push(ch);
                    rest = &candidate[end + 1..];
                }
                None => {
                    decoded.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                decoded.push('&');
                rest = &candidate[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let numeric = name.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn encode_entities(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => encoded.push_str("&amp;"),
            '<' => encoded.push_str("&lt;"),
            '>' => encoded.push_str("&gt;"),
            '"' => encoded.push_str("&quot;"),
            _ => encoded.push(ch),
        }
    }
    encoded
}
