//! Telegram MarkdownV2 escaping helpers.

/// Characters that carry meaning in MarkdownV2 and must be escaped in literal text.
pub const MARKDOWN_V2_SPECIAL_CHARS: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn is_markdown_v2_special(ch: char) -> bool {
    MARKDOWN_V2_SPECIAL_CHARS.contains(&ch)
}

/// Prefixes every special character with a backslash.
///
/// Apply this to final literal fragments only. Escaping already-built markup
/// escapes it a second time.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if is_markdown_v2_special(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Reverses [`escape_markdown_v2`]. Backslashes that do not precede a special
/// character are kept as-is.
pub fn unescape_markdown_v2(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.peek().copied() {
                if is_markdown_v2_special(next) {
                    unescaped.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        unescaped.push(ch);
    }
    unescaped
}

/// Escapes text placed inside a code span or preformatted block, where only
/// backticks and backslashes are significant.
pub fn escape_markdown_v2_code(text: &str) -> String {
    escape_only(text, &['`', '\\'])
}

/// Escapes the URL part of an inline link, where only `)` and `\` are significant.
pub fn escape_markdown_v2_link_url(url: &str) -> String {
    escape_only(url, &[')', '\\'])
}

fn escape_only(text: &str, significant: &[char]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if significant.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
