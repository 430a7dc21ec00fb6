//! Plane REST API v1 payloads and their mapping onto core task types.

use chrono::NaiveDate;
use planebot_core::html_markup::plain_text_to_html;
use planebot_core::{
    MemberId, ProjectId, ProjectInfo, StateId, TaskId, TaskMutationRequest, TaskPriority,
    TaskSnapshot, TaskState, TaskUpdateRequest,
};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaneProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub identifier: String,
}

impl From<PlaneProject> for ProjectInfo {
    fn from(project: PlaneProject) -> Self {
        Self {
            id: ProjectId::from(project.id),
            name: project.name,
            identifier: project.identifier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaneState {
    pub id: String,
    pub name: String,
}

impl From<PlaneState> for TaskState {
    fn from(state: PlaneState) -> Self {
        TaskState::new(state.id, state.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
/// Public struct `PlaneIssue` as returned by the work-item endpoints.
pub struct PlaneIssue {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description_html: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    pub state: String,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl From<PlaneIssue> for TaskSnapshot {
    fn from(issue: PlaneIssue) -> Self {
        Self {
            id: TaskId::from(issue.id),
            name: issue.name,
            description_html: issue.description_html.unwrap_or_default(),
            start_date: issue.start_date,
            target_date: issue.target_date,
            priority: issue.priority.unwrap_or_default(),
            state_id: StateId::from(issue.state),
            assignees: issue.assignees.into_iter().map(MemberId::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanePage<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub next_page_results: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
/// List endpoints answer with a cursor page; older deployments return a bare array.
pub enum PlaneListResponse<T> {
    Paged(PlanePage<T>),
    Plain(Vec<T>),
}

impl<T> PlaneListResponse<T> {
    /// Rows of this page and the cursor of the next one, if any.
    pub fn into_parts(self) -> (Vec<T>, Option<String>) {
        match self {
            Self::Paged(page) => {
                let next = match page.next_page_results {
                    Some(true) => page.next_cursor.filter(|cursor| !cursor.is_empty()),
                    _ => None,
                };
                (page.results, next)
            }
            Self::Plain(rows) => (rows, None),
        }
    }
}

/// Body for `POST .../issues/`. Absent fields are left to tracker defaults.
pub fn build_create_payload(request: &TaskMutationRequest) -> Value {
    mutation_payload(request)
}

/// Body for `PATCH .../issues/{id}/` carrying only the changed fields.
pub fn build_update_payload(request: &TaskUpdateRequest) -> Value {
    mutation_payload(&request.changes)
}

fn mutation_payload(request: &TaskMutationRequest) -> Value {
    let mut payload = Map::new();
    if let Some(title) = &request.title {
        payload.insert("name".to_string(), Value::String(title.clone()));
    }
    if let Some(description) = &request.description {
        payload.insert(
            "description_html".to_string(),
            Value::String(plain_text_to_html(description)),
        );
    }
    if let Some(start) = request.start_date {
        payload.insert("start_date".to_string(), date_value(start));
    }
    if let Some(deadline) = request.deadline_date {
        payload.insert("target_date".to_string(), date_value(deadline));
    }
    if let Some(priority) = request.priority {
        payload.insert(
            "priority".to_string(),
            Value::String(priority.as_str().to_string()),
        );
    }
    if let Some(state_id) = &request.state_id {
        payload.insert("state".to_string(), Value::String(state_id.to_string()));
    }
    if !request.assignees.is_empty() {
        payload.insert("assignees".to_string(), member_ids(&request.assignees));
    }
    Value::Object(payload)
}

fn date_value(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

fn member_ids(members: &[MemberId]) -> Value {
    Value::Array(
        members
            .iter()
            .map(|member| Value::String(member.to_string()))
            .collect(),
    )
}
