/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Splits `text` into messages of at most `max_chars` characters, breaking on
/// line boundaries. A single line longer than the limit is cut at its last
/// whitespace within the limit, falling back to a character cut, and never
/// between a `\` and the character it escapes.
pub fn split_message_for_telegram(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0_usize;
    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= max_chars {
            current.push_str(line);
            current_len += line_len;
            continue;
        }
        let mut pieces = split_oversized_line(line, max_chars);
        if let Some(last) = pieces.pop() {
            chunks.extend(pieces);
            current_len = last.chars().count();
            current = last;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_oversized_line(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while chars.len() - start > max_chars {
        let window = &chars[start..start + max_chars];
        let mut cut = window
            .iter()
            .rposition(|ch| ch.is_whitespace())
            .map_or(max_chars, |index| index + 1);
        while cut > 0 && ends_with_unescaped_backslash(&window[..cut]) {
            cut -= 1;
        }
        if cut == 0 {
            cut = max_chars;
        }
        pieces.push(window[..cut].iter().collect());
        start += cut;
    }
    pieces.push(chars[start..].iter().collect());
    pieces
}

fn ends_with_unescaped_backslash(chars: &[char]) -> bool {
    chars.iter().rev().take_while(|ch| **ch == '\\').count() % 2 == 1
}
