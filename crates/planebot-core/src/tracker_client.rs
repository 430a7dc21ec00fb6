use async_trait::async_trait;

use crate::command_errors::UpstreamError;
use crate::task_model::{
    ProjectId, ProjectInfo, TaskId, TaskMutationRequest, TaskSnapshot, TaskState,
    TaskUpdateRequest,
};

pub type TrackerResult<T> = Result<T, UpstreamError>;

#[async_trait]
/// Trait contract for `TrackerClient` behavior.
///
/// Getters return `Ok(None)` when the tracker reports the entity as missing.
/// `update_task` sends only the fields present in the request.
pub trait TrackerClient: Send + Sync {
    async fn get_project(&self, project_id: &ProjectId) -> TrackerResult<Option<ProjectInfo>>;

    async fn get_states(&self, project_id: &ProjectId) -> TrackerResult<Vec<TaskState>>;

    async fn get_tasks(&self, project_id: &ProjectId) -> TrackerResult<Vec<TaskSnapshot>>;

    async fn get_task(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
    ) -> TrackerResult<Option<TaskSnapshot>>;

    async fn create_task(
        &self,
        project_id: &ProjectId,
        request: &TaskMutationRequest,
    ) -> TrackerResult<TaskSnapshot>;

    async fn update_task(
        &self,
        project_id: &ProjectId,
        request: &TaskUpdateRequest,
    ) -> TrackerResult<TaskSnapshot>;

    async fn delete_task(&self, project_id: &ProjectId, task_id: &TaskId) -> TrackerResult<()>;
}
