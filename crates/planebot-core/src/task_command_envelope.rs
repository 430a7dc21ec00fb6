#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ChatCommandEnvelope` splitting a chat message into its
/// `/command` token and the untouched body that follows it.
pub struct ChatCommandEnvelope<'a> {
    pub command: &'a str,
    pub addressed_to: Option<&'a str>,
    pub body: &'a str,
}

/// Splits `/command[@bot]` from the rest of the message.
///
/// Returns `None` when the text is not a command or when it is addressed to a
/// different bot. The body keeps its original line structure.
pub fn parse_command_envelope<'a>(
    text: &'a str,
    bot_name: Option<&str>,
) -> Option<ChatCommandEnvelope<'a>> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('/')?;
    let token_end = rest
        .find(|ch: char| ch.is_whitespace() || ch == ',')
        .unwrap_or(rest.len());
    let token = &rest[..token_end];
    let (command, addressed_to) = match token.split_once('@') {
        Some((command, target)) => (command, Some(target)),
        None => (token, None),
    };
    if command.is_empty() || !command.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return None;
    }
    if let (Some(target), Some(expected)) = (addressed_to, bot_name) {
        let expected = expected.trim_start_matches('@');
        if !target.eq_ignore_ascii_case(expected) {
            return None;
        }
    }
    Some(ChatCommandEnvelope {
        command,
        addressed_to,
        body: &rest[token_end..],
    })
}

/// Strips a leading `/command[@bot]` token when present, otherwise returns the text unchanged.
pub fn strip_command_token<'a>(text: &'a str, expected_command: &str) -> &'a str {
    match parse_command_envelope(text, None) {
        Some(envelope) if envelope.command == expected_command => envelope.body,
        _ => text,
    }
}
