use std::sync::Arc;

use planebot_core::{
    ChatId, MemberDirectory, NotFoundError, ProjectChatBinding, ProjectId, StateDirectory,
    TaskLinkBuilder, TrackerClient, UpstreamError,
};

#[derive(Clone)]
/// Public struct `CommandRuntimeContext` holding the collaborators shared by
/// command handling and reports. Directories are loaded once at startup and
/// never mutated afterwards.
pub struct CommandRuntimeContext {
    pub tracker: Arc<dyn TrackerClient>,
    pub members: Arc<MemberDirectory>,
    pub bindings: Arc<ProjectChatBinding>,
    pub links: TaskLinkBuilder,
}

impl CommandRuntimeContext {
    pub fn new(
        tracker: Arc<dyn TrackerClient>,
        members: MemberDirectory,
        bindings: ProjectChatBinding,
        links: TaskLinkBuilder,
    ) -> Self {
        Self {
            tracker,
            members: Arc::new(members),
            bindings: Arc::new(bindings),
            links,
        }
    }

    pub fn project_for_chat(&self, chat_id: &ChatId) -> Result<ProjectId, NotFoundError> {
        self.bindings
            .project_for_chat(chat_id)
            .cloned()
            .ok_or_else(|| NotFoundError::ChatBinding(chat_id.clone()))
    }

    /// Fetches the project's states. Not cached between calls.
    pub async fn fetch_state_directory(
        &self,
        project_id: &ProjectId,
    ) -> Result<StateDirectory, UpstreamError> {
        let states = self.tracker.get_states(project_id).await?;
        tracing::debug!(project_id = %project_id, states = states.len(), "fetched project states");
        Ok(StateDirectory::new(project_id.clone(), states))
    }
}
