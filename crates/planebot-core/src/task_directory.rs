//! Lookup tables between chat-visible names and tracker identifiers.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::task_model::{ChatId, MemberId, ProjectId, StateId, TaskState};

/// Rendered in place of names whose identifiers are not in a directory.
pub const UNKNOWN_PLACEHOLDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("member id {0} is listed more than once")]
    DuplicateMemberId(MemberId),
    #[error("chat handle '{0}' is listed more than once")]
    DuplicateMention(String),
    #[error("chat handle for member {0} is empty")]
    EmptyMention(MemberId),
    #[error("project {0} is bound to more than one chat")]
    DuplicateProject(ProjectId),
    #[error("chat {0} is bound to more than one project")]
    DuplicateChat(ChatId),
}

fn normalize_mention(raw: &str) -> &str {
    raw.trim().trim_start_matches('@')
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Process-wide member id ↔ chat handle table. Built once at startup.
pub struct MemberDirectory {
    by_member: BTreeMap<MemberId, String>,
    by_mention: BTreeMap<String, MemberId>,
}

impl MemberDirectory {
    pub fn from_entries<I, S>(entries: I) -> Result<Self, DirectoryError>
    where
        I: IntoIterator<Item = (MemberId, S)>,
        S: AsRef<str>,
    {
        let mut directory = Self::default();
        for (member_id, mention) in entries {
            let mention = normalize_mention(mention.as_ref());
            if mention.is_empty() {
                return Err(DirectoryError::EmptyMention(member_id));
            }
            if directory.by_member.contains_key(&member_id) {
                return Err(DirectoryError::DuplicateMemberId(member_id));
            }
            if directory.by_mention.contains_key(mention) {
                return Err(DirectoryError::DuplicateMention(mention.to_string()));
            }
            directory
                .by_mention
                .insert(mention.to_string(), member_id.clone());
            directory.by_member.insert(member_id, mention.to_string());
        }
        Ok(directory)
    }

    /// Case-sensitive; a leading `@` is ignored.
    pub fn member_for_mention(&self, mention: &str) -> Option<&MemberId> {
        self.by_mention.get(normalize_mention(mention))
    }

    pub fn mention_for_member(&self, member_id: &MemberId) -> Option<&str> {
        self.by_member.get(member_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One project's states as fetched for the current request.
pub struct StateDirectory {
    project_id: ProjectId,
    states: Vec<TaskState>,
}

impl StateDirectory {
    pub fn new(project_id: ProjectId, states: Vec<TaskState>) -> Self {
        Self { project_id, states }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn states(&self) -> &[TaskState] {
        &self.states
    }

    pub fn resolve_state(&self, project_id: &ProjectId, label: &str) -> Option<&StateId> {
        if project_id != &self.project_id {
            return None;
        }
        self.states
            .iter()
            .find(|state| state.label == label)
            .map(|state| &state.id)
    }

    pub fn label_for_state(&self, project_id: &ProjectId, state_id: &StateId) -> Option<&str> {
        if project_id != &self.project_id {
            return None;
        }
        self.states
            .iter()
            .find(|state| &state.id == state_id)
            .map(|state| state.label.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Project ↔ chat bijection. Construction fails if either side repeats.
pub struct ProjectChatBinding {
    chat_by_project: BTreeMap<ProjectId, ChatId>,
    project_by_chat: BTreeMap<ChatId, ProjectId>,
}

impl ProjectChatBinding {
    pub fn from_pairs<I>(pairs: I) -> Result<Self, DirectoryError>
    where
        I: IntoIterator<Item = (ProjectId, ChatId)>,
    {
        let mut binding = Self::default();
        for (project_id, chat_id) in pairs {
            if binding.chat_by_project.contains_key(&project_id) {
                return Err(DirectoryError::DuplicateProject(project_id));
            }
            if binding.project_by_chat.contains_key(&chat_id) {
                return Err(DirectoryError::DuplicateChat(chat_id));
            }
            binding
                .project_by_chat
                .insert(chat_id.clone(), project_id.clone());
            binding.chat_by_project.insert(project_id, chat_id);
        }
        Ok(binding)
    }

    pub fn project_for_chat(&self, chat_id: &ChatId) -> Option<&ProjectId> {
        self.project_by_chat.get(chat_id)
    }

    pub fn chat_for_project(&self, project_id: &ProjectId) -> Option<&ChatId> {
        self.chat_by_project.get(project_id)
    }

    /// Bindings ordered by project id.
    pub fn iter(&self) -> impl Iterator<Item = (&ProjectId, &ChatId)> {
        self.chat_by_project.iter()
    }

    pub fn len(&self) -> usize {
        self.chat_by_project.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chat_by_project.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
/// Request-scoped resolver over the static member table and freshly fetched states.
pub struct NameResolver<'a> {
    members: &'a MemberDirectory,
    states: &'a StateDirectory,
}

impl<'a> NameResolver<'a> {
    pub fn new(members: &'a MemberDirectory, states: &'a StateDirectory) -> Self {
        Self { members, states }
    }

    pub fn project_id(&self) -> &'a ProjectId {
        self.states.project_id()
    }

    pub fn states(&self) -> &'a StateDirectory {
        self.states
    }

    pub fn resolve_state(&self, project_id: &ProjectId, label: &str) -> Option<&'a StateId> {
        self.states.resolve_state(project_id, label)
    }

    pub fn resolve_member(&self, mention: &str) -> Option<&'a MemberId> {
        self.members.member_for_mention(mention)
    }

    pub fn label_for_state(&self, project_id: &ProjectId, state_id: &StateId) -> Option<&'a str> {
        self.states.label_for_state(project_id, state_id)
    }

    pub fn mention_for_member(&self, member_id: &MemberId) -> Option<&'a str> {
        self.members.mention_for_member(member_id)
    }

    /// State label for display, or the placeholder for stale ids.
    pub fn state_label_or_unknown(&self, project_id: &ProjectId, state_id: &StateId) -> &'a str {
        self.label_for_state(project_id, state_id)
            .unwrap_or(UNKNOWN_PLACEHOLDER)
    }

    /// `@handle` for known members, the bare placeholder otherwise.
    pub fn member_display(&self, member_id: &MemberId) -> String {
        match self.mention_for_member(member_id) {
            Some(mention) => format!("@{mention}"),
            None => UNKNOWN_PLACEHOLDER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DirectoryError, MemberDirectory, NameResolver, ProjectChatBinding, StateDirectory,
        UNKNOWN_PLACEHOLDER,
    };
    use crate::task_model::{ChatId, MemberId, ProjectId, StateId, TaskState};

    fn members() -> MemberDirectory {
        MemberDirectory::from_entries([
            (MemberId::from("M7"), "alice"),
            (MemberId::from("M8"), "@bob_smith"),
        ])
        .expect("members")
    }

    fn states() -> StateDirectory {
        StateDirectory::new(
            ProjectId::from("P1"),
            vec![TaskState::new("S1", "Todo"), TaskState::new("S2", "In Progress")],
        )
    }

    #[test]
    fn unit_member_directory_resolves_both_directions() {
        let directory = members();
        assert_eq!(directory.member_for_mention("alice"), Some(&MemberId::from("M7")));
        assert_eq!(directory.member_for_mention("@bob_smith"), Some(&MemberId::from("M8")));
        assert_eq!(directory.member_for_mention("Alice"), None);
        assert_eq!(directory.mention_for_member(&MemberId::from("M8")), Some("bob_smith"));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn regression_member_directory_rejects_duplicates() {
        let error = MemberDirectory::from_entries([
            (MemberId::from("M1"), "alice"),
            (MemberId::from("M2"), "@alice"),
        ])
        .expect_err("duplicate");
        assert_eq!(error, DirectoryError::DuplicateMention("alice".to_string()));
        assert!(MemberDirectory::from_entries([(MemberId::from("M1"), "@")]).is_err());
    }

    #[test]
    fn unit_state_directory_is_scoped_to_its_project() {
        let directory = states();
        let project = ProjectId::from("P1");
        assert_eq!(
            directory.resolve_state(&project, "In Progress"),
            Some(&StateId::from("S2"))
        );
        assert_eq!(directory.resolve_state(&project, "in progress"), None);
        assert_eq!(directory.resolve_state(&ProjectId::from("P2"), "Todo"), None);
        assert_eq!(directory.label_for_state(&project, &StateId::from("S1")), Some("Todo"));
    }

    #[test]
    fn functional_project_chat_binding_is_a_bijection() {
        let binding = ProjectChatBinding::from_pairs([
            (ProjectId::from("P1"), ChatId::from("-100")),
            (ProjectId::from("P2"), ChatId::from("-200")),
        ])
        .expect("binding");
        assert_eq!(binding.project_for_chat(&ChatId::from("-200")), Some(&ProjectId::from("P2")));
        assert_eq!(binding.chat_for_project(&ProjectId::from("P1")), Some(&ChatId::from("-100")));
        assert_eq!(binding.iter().count(), 2);

        let error = ProjectChatBinding::from_pairs([
            (ProjectId::from("P1"), ChatId::from("-100")),
            (ProjectId::from("P2"), ChatId::from("-100")),
        ])
        .expect_err("duplicate chat");
        assert_eq!(error, DirectoryError::DuplicateChat(ChatId::from("-100")));
    }

    #[test]
    fn regression_name_resolver_renders_placeholder_for_stale_ids() {
        let members = members();
        let states = states();
        let resolver = NameResolver::new(&members, &states);
        let project = ProjectId::from("P1");
        assert_eq!(
            resolver.state_label_or_unknown(&project, &StateId::from("gone")),
            UNKNOWN_PLACEHOLDER
        );
        assert_eq!(resolver.member_display(&MemberId::from("M7")), "@alice");
        assert_eq!(resolver.member_display(&MemberId::from("M404")), "unknown");
        assert_eq!(resolver.resolve_member("ghost"), None);
    }
}
