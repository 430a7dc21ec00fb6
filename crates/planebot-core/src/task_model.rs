//! Task data shared by the parser, validators, renderer and tracker clients.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Tracker-side task identifier (a UUID string).
    TaskId
);
opaque_id!(
    /// Tracker-side project identifier.
    ProjectId
);
opaque_id!(
    /// Tracker-side workspace member identifier.
    MemberId
);
opaque_id!(
    /// Tracker-side workflow state identifier.
    StateId
);
opaque_id!(
    /// Chat identifier as reported by the messaging service.
    ChatId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Enumerates supported `TaskPriority` values.
pub enum TaskPriority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 5] = [
        TaskPriority::None,
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    /// Maps the single-digit chat form (`0`..=`4`) onto a priority.
    pub fn from_digit(raw: &str) -> Option<Self> {
        match raw {
            "0" => Some(Self::None),
            "1" => Some(Self::Low),
            "2" => Some(Self::Medium),
            "3" => Some(Self::High),
            "4" => Some(Self::Urgent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value.trim())
            .ok_or_else(|| format!("unknown task priority '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `TaskState` describing one workflow state of a project.
pub struct TaskState {
    pub id: StateId,
    pub label: String,
}

impl TaskState {
    pub fn new(id: impl Into<StateId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Point-in-time copy of a tracker task. Never mutated in place by the core.
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub description_html: String,
    pub start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub priority: TaskPriority,
    pub state_id: StateId,
    pub assignees: Vec<MemberId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Validated mutation produced from a create or update command.
///
/// `mentions` keeps the chat handles as typed; `assignees` holds their
/// resolved member ids in the same order. `state_id` is only set once
/// `state_name` has been resolved against the project's states.
pub struct TaskMutationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub deadline_date: Option<NaiveDate>,
    pub priority: Option<TaskPriority>,
    pub state_name: Option<String>,
    pub state_id: Option<StateId>,
    pub mentions: Vec<String>,
    pub assignees: Vec<MemberId>,
}

impl TaskMutationRequest {
    /// True when no field would be sent to the tracker.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.deadline_date.is_none()
            && self.priority.is_none()
            && self.state_id.is_none()
            && self.assignees.is_empty()
    }

    /// Assignee list to send on update: existing members followed by any new ones.
    /// Returns `None` when the request adds nobody.
    pub fn merged_assignees(&self, existing: &[MemberId]) -> Option<Vec<MemberId>> {
        if self.assignees.is_empty() {
            return None;
        }
        let mut merged = existing.to_vec();
        for member in &self.assignees {
            if !merged.contains(member) {
                merged.push(member.clone());
            }
        }
        Some(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Partial update of one task. `changes.assignees` is the complete list to
/// store (existing members plus new ones) or empty when assignees stay as they are.
pub struct TaskUpdateRequest {
    pub task_id: TaskId,
    pub changes: TaskMutationRequest,
}
