use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use planebot_core::{
    ChatId, MemberDirectory, MemberId, ProjectChatBinding, ProjectId, ProjectInfo, StateId,
    TaskId, TaskLinkBuilder, TaskMutationRequest, TaskPriority, TaskSnapshot, TaskState,
    TaskUpdateRequest, TrackerClient, TrackerResult, UpstreamError,
};
use tokio::sync::Mutex;

use crate::CommandRuntimeContext;

pub(crate) const TASK_ID: &str = "0a1b2c3d-0000-1111-2222-333344445555";

/// In-memory tracker with a single project `P1` bound to chat `-100`.
#[derive(Default)]
pub(crate) struct InMemoryTracker {
    pub tasks: Mutex<BTreeMap<TaskId, TaskSnapshot>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_mutations: bool,
}

impl InMemoryTracker {
    pub(crate) fn with_task(task: TaskSnapshot) -> Self {
        let tracker = Self::default();
        tracker.tasks.try_lock().expect("fresh lock").insert(task.id.clone(), task);
        tracker
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: &str) {
        self.calls.lock().await.push(call.to_string());
    }
}

pub(crate) fn sample_task() -> TaskSnapshot {
    TaskSnapshot {
        id: TaskId::from(TASK_ID),
        name: "Fix login bug".to_string(),
        description_html: "<p>Steps</p>".to_string(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
        target_date: NaiveDate::from_ymd_opt(2024, 1, 10),
        priority: TaskPriority::None,
        state_id: StateId::from("S1"),
        assignees: vec![MemberId::from("M8")],
    }
}

pub(crate) fn test_context(tracker: Arc<InMemoryTracker>) -> CommandRuntimeContext {
    let members = MemberDirectory::from_entries([
        (MemberId::from("M7"), "alice"),
        (MemberId::from("M8"), "bob_smith"),
    ])
    .expect("members");
    let bindings = ProjectChatBinding::from_pairs([(ProjectId::from("P1"), ChatId::from("-100"))])
        .expect("bindings");
    CommandRuntimeContext::new(
        tracker,
        members,
        bindings,
        TaskLinkBuilder::new("https://plane.example.com/", "acme"),
    )
}

#[async_trait]
impl TrackerClient for InMemoryTracker {
    async fn get_project(&self, project_id: &ProjectId) -> TrackerResult<Option<ProjectInfo>> {
        self.record("get_project").await;
        Ok((project_id.as_str() == "P1").then(|| ProjectInfo {
            id: project_id.clone(),
            name: "Website".to_string(),
            identifier: "WEB".to_string(),
        }))
    }

    async fn get_states(&self, _project_id: &ProjectId) -> TrackerResult<Vec<TaskState>> {
        self.record("get_states").await;
        Ok(vec![
            TaskState::new("S1", "Todo"),
            TaskState::new("S2", "In Progress"),
            TaskState::new("S3", "Done"),
        ])
    }

    async fn get_tasks(&self, _project_id: &ProjectId) -> TrackerResult<Vec<TaskSnapshot>> {
        self.record("get_tasks").await;
        Ok(self.tasks.lock().await.values().cloned().collect())
    }

    async fn get_task(
        &self,
        _project_id: &ProjectId,
        task_id: &TaskId,
    ) -> TrackerResult<Option<TaskSnapshot>> {
        self.record("get_task").await;
        Ok(self.tasks.lock().await.get(task_id).cloned())
    }

    async fn create_task(
        &self,
        _project_id: &ProjectId,
        request: &TaskMutationRequest,
    ) -> TrackerResult<TaskSnapshot> {
        self.record("create_task").await;
        if self.fail_mutations {
            return Err(UpstreamError::new("create_task", "status 500: boom"));
        }
        let task = TaskSnapshot {
            id: TaskId::from("T-new"),
            name: request.title.clone().unwrap_or_default(),
            description_html: String::new(),
            start_date: request.start_date,
            target_date: request.deadline_date,
            priority: request.priority.unwrap_or_default(),
            state_id: request.state_id.clone().unwrap_or_else(|| StateId::from("S1")),
            assignees: request.assignees.clone(),
        };
        self.tasks.lock().await.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn update_task(
        &self,
        _project_id: &ProjectId,
        request: &TaskUpdateRequest,
    ) -> TrackerResult<TaskSnapshot> {
        self.record("update_task").await;
        if self.fail_mutations {
            return Err(UpstreamError::new("update_task", "status 500: boom"));
        }
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&request.task_id)
            .ok_or_else(|| UpstreamError::new("update_task", "status 404"))?;
        let changes = &request.changes;
        if let Some(title) = &changes.title {
            task.name = title.clone();
        }
        if let Some(description) = &changes.description {
            task.description_html = format!("<p>{description}</p>");
        }
        if changes.start_date.is_some() {
            task.start_date = changes.start_date;
        }
        if changes.deadline_date.is_some() {
            task.target_date = changes.deadline_date;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(state_id) = &changes.state_id {
            task.state_id = state_id.clone();
        }
        if !changes.assignees.is_empty() {
            task.assignees = changes.assignees.clone();
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, _project_id: &ProjectId, task_id: &TaskId) -> TrackerResult<()> {
        self.record("delete_task").await;
        if self.fail_mutations {
            return Err(UpstreamError::new("delete_task", "status 500: boom"));
        }
        self.tasks.lock().await.remove(task_id);
        Ok(())
    }
}
