//! Pure validators turning raw command fields into a mutation request.
//!
//! Checks run in a fixed order (title, priority, state, dates, assignees)
//! and stop at the first failure.

use chrono::NaiveDate;

use crate::command_errors::{CommandError, NotFoundError, ValidationError};
use crate::task_command_envelope::strip_command_token;
use crate::task_command_grammar::{
    parse_create_command, parse_update_command, TaskCommandFields, TaskCommandKind, TaskField,
    UpdateTaskCommand,
};
use crate::task_directory::NameResolver;
use crate::task_model::{
    MemberId, ProjectId, StateId, TaskMutationRequest, TaskPriority, TaskSnapshot,
    TaskUpdateRequest,
};

/// Titles must be shorter than this many code points.
pub const TITLE_MAX_CHARS: usize = 255;
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy)]
/// Project the command targets, with the resolver built for this request.
pub struct ProjectContext<'a> {
    pub project_id: &'a ProjectId,
    pub resolver: NameResolver<'a>,
}

impl<'a> ProjectContext<'a> {
    pub fn new(resolver: NameResolver<'a>) -> Self {
        Self {
            project_id: resolver.project_id(),
            resolver,
        }
    }
}

pub fn validate_title(raw: Option<&str>, required: bool) -> Result<Option<String>, ValidationError> {
    let Some(title) = raw else {
        return if required {
            Err(ValidationError::MissingTitle)
        } else {
            Ok(None)
        };
    };
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let length = title.chars().count();
    if length >= TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong {
            length,
            limit: TITLE_MAX_CHARS,
        });
    }
    Ok(Some(title.to_string()))
}

pub fn validate_priority(raw: Option<&str>) -> Result<Option<TaskPriority>, ValidationError> {
    raw.map(|digit| {
        TaskPriority::from_digit(digit).ok_or_else(|| ValidationError::InvalidPriority(digit.to_string()))
    })
    .transpose()
}

pub fn validate_state(
    raw: Option<&str>,
    context: &ProjectContext<'_>,
) -> Result<Option<(String, StateId)>, ValidationError> {
    let Some(label) = raw.filter(|label| !label.is_empty()) else {
        return Ok(None);
    };
    context
        .resolver
        .resolve_state(context.project_id, label)
        .map(|state_id| Some((label.to_string(), state_id.clone())))
        .ok_or_else(|| ValidationError::UnknownState(label.to_string()))
}

/// Parses a `YYYY-MM-DD` value. Absent and empty values are `None`.
pub fn parse_date_field(
    field: TaskField,
    raw: Option<&str>,
) -> Result<Option<NaiveDate>, ValidationError> {
    let Some(value) = raw.filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    };
    if !has_date_shape(value) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|_| invalid())
}

fn has_date_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

/// Start may equal the deadline but must not be after it.
pub fn validate_date_range(
    start: Option<NaiveDate>,
    deadline: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match (start, deadline) {
        (Some(start), Some(deadline)) if start > deadline => {
            Err(ValidationError::DatesOutOfOrder { start, deadline })
        }
        _ => Ok(()),
    }
}

/// Resolves every mention; the error lists all unresolved handles.
pub fn validate_assignees(
    mentions: &[String],
    resolver: &NameResolver<'_>,
) -> Result<Vec<MemberId>, ValidationError> {
    let mut resolved = Vec::with_capacity(mentions.len());
    let mut unresolved = Vec::new();
    for mention in mentions {
        match resolver.resolve_member(mention) {
            Some(member_id) => resolved.push(member_id.clone()),
            None => unresolved.push(mention.clone()),
        }
    }
    if !unresolved.is_empty() {
        return Err(ValidationError::UnknownAssignees(unresolved));
    }
    Ok(resolved)
}

/// Title and priority checks, which need no tracker data. Callers run them
/// before fetching states so these errors do not depend on the tracker.
pub fn validate_standalone_fields(
    fields: &TaskCommandFields,
    title_required: bool,
) -> Result<(), ValidationError> {
    validate_title(fields.get(TaskField::Title), title_required)?;
    validate_priority(fields.get(TaskField::Priority))?;
    Ok(())
}

fn validate_fields(
    fields: &TaskCommandFields,
    context: &ProjectContext<'_>,
    title_required: bool,
    existing_dates: (Option<NaiveDate>, Option<NaiveDate>),
) -> Result<TaskMutationRequest, ValidationError> {
    let title = validate_title(fields.get(TaskField::Title), title_required)?;
    let priority = validate_priority(fields.get(TaskField::Priority))?;
    let state = validate_state(fields.get(TaskField::State), context)?;
    let start_date = parse_date_field(TaskField::Start, fields.get(TaskField::Start))?;
    let deadline_date = parse_date_field(TaskField::Deadline, fields.get(TaskField::Deadline))?;
    validate_date_range(
        start_date.or(existing_dates.0),
        deadline_date.or(existing_dates.1),
    )?;
    let assignees = validate_assignees(&fields.mentions, &context.resolver)?;
    let (state_name, state_id) = match state {
        Some((name, id)) => (Some(name), Some(id)),
        None => (None, None),
    };
    Ok(TaskMutationRequest {
        title,
        description: fields.get(TaskField::Description).map(str::to_string),
        start_date,
        deadline_date,
        priority,
        state_name,
        state_id,
        mentions: fields.mentions.clone(),
        assignees,
    })
}

pub fn validate_create_command(
    fields: &TaskCommandFields,
    context: &ProjectContext<'_>,
) -> Result<TaskMutationRequest, ValidationError> {
    validate_fields(fields, context, true, (None, None))
}

/// Validates an update against the task it modifies. Dates are checked on
/// the merged range: new values where given, existing ones otherwise.
/// Mentioned members are appended to the task's current assignees.
pub fn validate_update_command(
    command: &UpdateTaskCommand,
    context: &ProjectContext<'_>,
    existing: &TaskSnapshot,
) -> Result<TaskUpdateRequest, CommandError> {
    if existing.id != command.task_id {
        return Err(NotFoundError::Task(command.task_id.clone()).into());
    }
    let mut changes = validate_fields(
        &command.fields,
        context,
        false,
        (existing.start_date, existing.target_date),
    )?;
    if let Some(merged) = changes.merged_assignees(&existing.assignees) {
        changes.assignees = merged;
    }
    Ok(TaskUpdateRequest {
        task_id: command.task_id.clone(),
        changes,
    })
}

/// Parses and validates a create command. The leading `/newtask` token is optional.
pub fn parse_and_validate_create(
    raw_text: &str,
    context: &ProjectContext<'_>,
) -> Result<TaskMutationRequest, CommandError> {
    let body = strip_command_token(raw_text, TaskCommandKind::Create.command_name());
    let fields = parse_create_command(body)?;
    Ok(validate_create_command(&fields, context)?)
}

/// Parses and validates an update command against the current task snapshot.
pub fn parse_and_validate_update(
    raw_text: &str,
    context: &ProjectContext<'_>,
    existing: &TaskSnapshot,
) -> Result<TaskUpdateRequest, CommandError> {
    let body = strip_command_token(raw_text, TaskCommandKind::Update.command_name());
    let command = parse_update_command(body)?;
    validate_update_command(&command, context, existing)
}
