//! Line scanner for the labelled task command grammar.
//!
//! A command body is a sequence of `Label: value` lines followed by optional
//! `@mention` tokens:
//!
//! ```text
//! Title: Fix login bug
//! Description: Users are logged out
//!   after every deploy
//! Priority: 3
//! @alice @bob_smith
//! ```
//!
//! Labels are recognized only at the start of a line. A value runs until the
//! next label line, the first mention, or the end of the text. The whole body
//! must be accounted for; anything left over rejects the message.

use std::collections::{BTreeMap, BTreeSet};

use crate::command_errors::FormatError;
use crate::task_model::TaskId;

const MENTION_MIN_CHARS: usize = 5;
const MENTION_MAX_CHARS: usize = 32;
const UUID_GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Enumerates supported `TaskField` values.
pub enum TaskField {
    Uuid,
    Title,
    Description,
    Start,
    Deadline,
    Priority,
    State,
}

impl TaskField {
    pub const ALL: [TaskField; 7] = [
        TaskField::Uuid,
        TaskField::Title,
        TaskField::Description,
        TaskField::Start,
        TaskField::Deadline,
        TaskField::Priority,
        TaskField::State,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Uuid => "UUID",
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Start => "Start",
            Self::Deadline => "Deadline",
            Self::Priority => "Priority",
            Self::State => "State",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.label() == label)
    }

    // An empty value for these fields carries no information.
    fn empty_means_absent(self) -> bool {
        matches!(self, Self::Start | Self::Deadline | Self::Priority | Self::State)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Enumerates supported `TaskCommandKind` values.
pub enum TaskCommandKind {
    Create,
    Update,
    Delete,
}

impl TaskCommandKind {
    pub fn command_name(self) -> &'static str {
        match self {
            Self::Create => "newtask",
            Self::Update => "updatetask",
            Self::Delete => "deletetask",
        }
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        [Self::Create, Self::Update, Self::Delete]
            .into_iter()
            .find(|kind| kind.command_name() == name)
    }

    /// Label that must open the body.
    pub fn leading_field(self) -> TaskField {
        match self {
            Self::Create => TaskField::Title,
            Self::Update | Self::Delete => TaskField::Uuid,
        }
    }

    pub fn allows(self, field: TaskField) -> bool {
        match self {
            Self::Create => field != TaskField::Uuid,
            Self::Update => true,
            Self::Delete => field == TaskField::Uuid,
        }
    }

    pub fn allows_mentions(self) -> bool {
        self != Self::Delete
    }

    /// Message template shown when a command does not parse.
    pub fn usage(self) -> &'static str {
        match self {
            Self::Create => {
                "/newtask\nTitle: <title>\nDescription: <text>\nStart: YYYY-MM-DD\nDeadline: YYYY-MM-DD\nPriority: 0-4\nState: <state name>\n@assignee1 @assignee2"
            }
            Self::Update => {
                "/updatetask\nUUID: <task uuid>\nTitle: <title>\nDescription: <text>\nStart: YYYY-MM-DD\nDeadline: YYYY-MM-DD\nPriority: 0-4\nState: <state name>\n@assignee1 @assignee2"
            }
            Self::Delete => "/deletetask\nUUID: <task uuid>",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Raw field values and mentions extracted from one command body.
pub struct TaskCommandFields {
    pub values: BTreeMap<TaskField, String>,
    /// Mention handles without `@`, in first-appearance order.
    pub mentions: Vec<String>,
}

impl TaskCommandFields {
    pub fn get(&self, field: TaskField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn has_changes(&self) -> bool {
        self.values.keys().any(|field| *field != TaskField::Uuid) || !self.mentions.is_empty()
    }

    fn push_mention(&mut self, handle: &str) {
        if !self.mentions.iter().any(|existing| existing == handle) {
            self.mentions.push(handle.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTaskCommand {
    pub task_id: TaskId,
    pub fields: TaskCommandFields,
}

pub fn parse_create_command(body: &str) -> Result<TaskCommandFields, FormatError> {
    scan_command_fields(TaskCommandKind::Create, body)
}

pub fn parse_update_command(body: &str) -> Result<UpdateTaskCommand, FormatError> {
    let mut fields = scan_command_fields(TaskCommandKind::Update, body)?;
    let task_id = take_task_id(TaskCommandKind::Update, &mut fields)?;
    Ok(UpdateTaskCommand { task_id, fields })
}

pub fn parse_delete_command(body: &str) -> Result<TaskId, FormatError> {
    let mut fields = scan_command_fields(TaskCommandKind::Delete, body)?;
    take_task_id(TaskCommandKind::Delete, &mut fields)
}

/// Returns true when `value` has the 8-4-4-4-12 shape of a task identifier.
pub fn is_task_id_shape(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    groups.len() == UUID_GROUP_LENGTHS.len()
        && groups
            .iter()
            .zip(UUID_GROUP_LENGTHS)
            .all(|(group, length)| {
                group.len() == length && group.chars().all(|ch| ch.is_ascii_alphanumeric())
            })
}

fn take_task_id(
    kind: TaskCommandKind,
    fields: &mut TaskCommandFields,
) -> Result<TaskId, FormatError> {
    let raw = fields
        .values
        .remove(&TaskField::Uuid)
        .ok_or_else(|| FormatError::new(kind, "missing UUID"))?;
    if !is_task_id_shape(&raw) {
        return Err(FormatError::new(
            kind,
            format!("UUID '{}' is not a task identifier", truncate_snippet(&raw)),
        ));
    }
    Ok(TaskId::new(raw))
}

#[derive(Debug)]
enum ScanMode {
    Preamble,
    InField(TaskField, String),
    Trailer,
}

/// Scans a command body into labelled values and mentions.
pub fn scan_command_fields(
    kind: TaskCommandKind,
    body: &str,
) -> Result<TaskCommandFields, FormatError> {
    let mut fields = TaskCommandFields::default();
    let mut seen: BTreeSet<TaskField> = BTreeSet::new();
    let mut mode = ScanMode::Preamble;

    for raw_line in body.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some((field, value_start)) = match_label_line(line) {
            if let ScanMode::InField(open, buffer) = std::mem::replace(&mut mode, ScanMode::Trailer)
            {
                close_field(&mut fields, open, &buffer);
            }
            if !kind.allows(field) {
                return Err(FormatError::new(
                    kind,
                    format!("{} is not accepted here", field.label()),
                ));
            }
            if seen.is_empty() && field != kind.leading_field() {
                return Err(FormatError::new(
                    kind,
                    format!("{} must come first", kind.leading_field().label()),
                ));
            }
            if !seen.insert(field) {
                return Err(FormatError::new(
                    kind,
                    format!("{} is given more than once", field.label()),
                ));
            }
            mode = scan_field_text(kind, &mut fields, field, String::new(), &line[value_start..])?;
            continue;
        }

        mode = match mode {
            ScanMode::InField(field, mut buffer) => {
                buffer.push('\n');
                scan_field_text(kind, &mut fields, field, buffer, line)?
            }
            other => {
                scan_trailer(kind, &mut fields, line)?;
                other
            }
        };
    }

    if let ScanMode::InField(field, buffer) = mode {
        close_field(&mut fields, field, &buffer);
    }
    if seen.is_empty() {
        return Err(FormatError::new(
            kind,
            format!("missing {}", kind.leading_field().label()),
        ));
    }
    Ok(fields)
}

// Appends `segment` to the open field until a mention starts; the rest of the
// segment must then be separators and mentions only.
fn scan_field_text(
    kind: TaskCommandKind,
    fields: &mut TaskCommandFields,
    field: TaskField,
    mut buffer: String,
    segment: &str,
) -> Result<ScanMode, FormatError> {
    match find_mention(segment) {
        Some(start) => {
            buffer.push_str(&segment[..start]);
            close_field(fields, field, &buffer);
            scan_trailer(kind, fields, &segment[start..])?;
            Ok(ScanMode::Trailer)
        }
        None => {
            buffer.push_str(segment);
            Ok(ScanMode::InField(field, buffer))
        }
    }
}

fn close_field(fields: &mut TaskCommandFields, field: TaskField, buffer: &str) {
    let value = clean_value(buffer);
    if value.is_empty() && field.empty_means_absent() {
        return;
    }
    fields.values.insert(field, value.to_string());
}

fn clean_value(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(|ch: char| ch == ',' || ch.is_whitespace())
}

fn scan_trailer(
    kind: TaskCommandKind,
    fields: &mut TaskCommandFields,
    segment: &str,
) -> Result<(), FormatError> {
    let mut rest = segment;
    loop {
        rest = rest.trim_start_matches(is_separator);
        if rest.is_empty() {
            return Ok(());
        }
        let Some(end) = rest.strip_prefix('@').and_then(|_| mention_end(rest)) else {
            return Err(FormatError::new(
                kind,
                format!("unexpected text '{}'", truncate_snippet(rest)),
            ));
        };
        if !kind.allows_mentions() {
            return Err(FormatError::new(kind, "mentions are not accepted here"));
        }
        fields.push_mention(&rest[1..end]);
        rest = &rest[end..];
        if rest.starts_with('@') {
            return Err(FormatError::new(
                kind,
                format!("unexpected text '{}'", truncate_snippet(rest)),
            ));
        }
    }
}

fn is_separator(ch: char) -> bool {
    ch == ',' || ch.is_whitespace()
}

fn is_handle_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Returns the label and the byte offset just past its colon.
fn match_label_line(line: &str) -> Option<(TaskField, usize)> {
    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    let candidate = &line[indent..];
    TaskField::ALL.into_iter().find_map(|field| {
        let after_label = candidate.strip_prefix(field.label())?;
        let after_space = after_label.trim_start_matches([' ', '\t']);
        after_space.strip_prefix(':')?;
        Some((field, line.len() - after_space.len() + 1))
    })
}

/// Byte offset of the first mention token in `text`.
fn find_mention(text: &str) -> Option<usize> {
    text.char_indices().find_map(|(index, ch)| {
        if ch != '@' {
            return None;
        }
        let preceded_by_word = text[..index].chars().next_back().is_some_and(is_handle_char);
        if preceded_by_word {
            return None;
        }
        mention_end(&text[index..]).map(|_| index)
    })
}

/// For text starting with `@`, returns the byte offset just past the handle
/// when it forms a valid mention.
fn mention_end(text: &str) -> Option<usize> {
    let handle = text.strip_prefix('@')?;
    let length = handle
        .find(|ch: char| !is_handle_char(ch))
        .unwrap_or(handle.len());
    if !(MENTION_MIN_CHARS..=MENTION_MAX_CHARS).contains(&length) {
        return None;
    }
    let mut suffix = handle[length..].chars();
    if let Some(next) = suffix.next() {
        let url_like = matches!(next, '.' | '/' | ':')
            && suffix.next().is_some_and(|after| !after.is_whitespace());
        if url_like {
            return None;
        }
    }
    Some(length + 1)
}

fn truncate_snippet(text: &str) -> String {
    const MAX_SNIPPET_CHARS: usize = 40;
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= MAX_SNIPPET_CHARS {
        return line.to_string();
    }
    let truncated: String = line.chars().take(MAX_SNIPPET_CHARS).collect();
    format!("{truncated}...")
}
