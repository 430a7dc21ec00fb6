//! Typed failures of command parsing, validation and tracker calls.

use chrono::NaiveDate;
use thiserror::Error;

use crate::task_command_grammar::{TaskCommandKind, TaskField};
use crate::task_model::{ChatId, ProjectId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("/{} message does not match the expected format: {reason}", .kind.command_name())]
/// The message does not match the whole-message grammar of its command kind.
pub struct FormatError {
    pub kind: TaskCommandKind,
    pub reason: String,
}

impl FormatError {
    pub fn new(kind: TaskCommandKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `ValidationError` values.
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title is {length} characters long, it must be shorter than {limit}")]
    TitleTooLong { length: usize, limit: usize },
    #[error("priority '{0}' is not a digit from 0 to 4")]
    InvalidPriority(String),
    #[error("state '{0}' does not exist in this project")]
    UnknownState(String),
    #[error("{} date '{value}' is not a YYYY-MM-DD date", .field.label())]
    InvalidDate { field: TaskField, value: String },
    #[error("start date {start} is after deadline {deadline}")]
    DatesOutOfOrder { start: NaiveDate, deadline: NaiveDate },
    #[error("unknown assignees: {}", .0.join(", "))]
    UnknownAssignees(Vec<String>),
}

impl ValidationError {
    /// Field(s) the rejection refers to.
    pub fn fields(&self) -> Vec<TaskField> {
        match self {
            Self::MissingTitle | Self::EmptyTitle | Self::TitleTooLong { .. } => {
                vec![TaskField::Title]
            }
            Self::InvalidPriority(_) => vec![TaskField::Priority],
            Self::UnknownState(_) => vec![TaskField::State],
            Self::InvalidDate { field, .. } => vec![*field],
            Self::DatesOutOfOrder { .. } => vec![TaskField::Start, TaskField::Deadline],
            Self::UnknownAssignees(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("task {0} was not found")]
    Task(TaskId),
    #[error("project {0} was not found")]
    Project(ProjectId),
    #[error("chat {0} is not bound to any project")]
    ChatBinding(ChatId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tracker {operation} failed: {detail}")]
/// A tracker call failed. `detail` is only shown to users in verbose mode.
pub struct UpstreamError {
    pub operation: String,
    pub detail: String,
}

impl UpstreamError {
    pub fn new(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
