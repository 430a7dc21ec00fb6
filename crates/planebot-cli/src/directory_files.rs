//! JSON files describing chat members and project-to-chat bindings.

use std::path::Path;

use anyhow::{Context, Result};
use planebot_core::{ChatId, MemberDirectory, MemberId, ProjectChatBinding, ProjectId};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
/// Telegram ids appear both as JSON strings and as numbers.
enum JsonIdentifier {
    Text(String),
    Number(i64),
}

impl JsonIdentifier {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value.trim().to_string(),
            Self::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MemberRecord {
    member_id: String,
    telegram_id: JsonIdentifier,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectRecord {
    project_id: String,
    chat_id: JsonIdentifier,
}

fn read_json_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Loads `[{"member_id": ..., "telegram_id": ...}]` into a member directory.
pub fn load_member_directory(path: &Path) -> Result<MemberDirectory> {
    let records: Vec<MemberRecord> = read_json_records(path)?;
    MemberDirectory::from_entries(records.into_iter().map(|record| {
        (
            MemberId::new(record.member_id.trim()),
            record.telegram_id.into_string(),
        )
    }))
    .with_context(|| format!("invalid member directory {}", path.display()))
}

/// Loads `[{"project_id": ..., "chat_id": ...}]` into a project/chat binding.
pub fn load_project_bindings(path: &Path) -> Result<ProjectChatBinding> {
    let records: Vec<ProjectRecord> = read_json_records(path)?;
    ProjectChatBinding::from_pairs(records.into_iter().map(|record| {
        (
            ProjectId::new(record.project_id.trim()),
            ChatId::new(record.chat_id.into_string()),
        )
    }))
    .with_context(|| format!("invalid project bindings {}", path.display()))
}
