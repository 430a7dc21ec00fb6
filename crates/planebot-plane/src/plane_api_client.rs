//! Plane REST API v1 client implementing the tracker port.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use planebot_core::task_report_render::TaskLinkBuilder;
use planebot_core::{
    ProjectId, ProjectInfo, TaskId, TaskMutationRequest, TaskSnapshot, TaskState,
    TaskUpdateRequest, TrackerClient, TrackerResult, UpstreamError,
};
use planebot_transport::{
    decode_json_response, ensure_success, send_non_idempotent, send_with_retry, RetryPolicy,
};
use serde::de::DeserializeOwned;

use crate::plane_payloads::{
    build_create_payload, build_update_payload, PlaneIssue, PlaneListResponse, PlaneProject,
    PlaneState,
};

const SERVICE_NAME: &str = "plane";
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `PlaneApiConfig` with connection settings for one workspace.
pub struct PlaneApiConfig {
    /// Site root, e.g. `https://app.plane.so/`. API calls go to `{base_url}/api/v1`.
    pub base_url: String,
    pub workspace_slug: String,
    pub api_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone)]
pub struct PlaneApiClient {
    http: reqwest::Client,
    base_url: String,
    workspace_slug: String,
    retry: RetryPolicy,
}

impl PlaneApiClient {
    pub fn new(config: PlaneApiConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("planebot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "x-api-key",
            reqwest::header::HeaderValue::from_str(config.api_token.trim())
                .context("invalid plane api key header")?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create plane api client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            workspace_slug: config.workspace_slug.trim_matches('/').to_string(),
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay_ms),
        })
    }

    pub fn link_builder(&self) -> TaskLinkBuilder {
        TaskLinkBuilder::new(self.base_url.clone(), self.workspace_slug.clone())
    }

    fn project_url(&self, project_id: &ProjectId) -> String {
        format!(
            "{}/api/v1/workspaces/{}/projects/{}",
            self.base_url, self.workspace_slug, project_id
        )
    }

    fn issue_url(&self, project_id: &ProjectId, task_id: &TaskId) -> String {
        format!("{}/issues/{}/", self.project_url(project_id), task_id)
    }

    pub async fn fetch_project(&self, project_id: &ProjectId) -> Result<Option<ProjectInfo>> {
        let url = format!("{}/", self.project_url(project_id));
        let project: Option<PlaneProject> = self.get_optional("get project", &url).await?;
        Ok(project.map(ProjectInfo::from))
    }

    pub async fn fetch_states(&self, project_id: &ProjectId) -> Result<Vec<TaskState>> {
        let url = format!("{}/states/", self.project_url(project_id));
        let states: Vec<PlaneState> = self.get_all_pages("list states", &url).await?;
        Ok(states.into_iter().map(TaskState::from).collect())
    }

    pub async fn fetch_tasks(&self, project_id: &ProjectId) -> Result<Vec<TaskSnapshot>> {
        let url = format!("{}/issues/", self.project_url(project_id));
        let issues: Vec<PlaneIssue> = self.get_all_pages("list issues", &url).await?;
        Ok(issues.into_iter().map(TaskSnapshot::from).collect())
    }

    pub async fn fetch_task(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
    ) -> Result<Option<TaskSnapshot>> {
        let url = self.issue_url(project_id, task_id);
        let issue: Option<PlaneIssue> = self.get_optional("get issue", &url).await?;
        Ok(issue.map(TaskSnapshot::from))
    }

    pub async fn post_task(
        &self,
        project_id: &ProjectId,
        request: &TaskMutationRequest,
    ) -> Result<TaskSnapshot> {
        let url = format!("{}/issues/", self.project_url(project_id));
        let payload = build_create_payload(request);
        tracing::debug!(project_id = %project_id, payload = %payload, "creating plane issue");
        let response = send_non_idempotent(SERVICE_NAME, "create issue", self.retry, || {
            self.http.post(&url).json(&payload)
        })
        .await?;
        let issue: PlaneIssue = decode_json_response(SERVICE_NAME, "create issue", response).await?;
        tracing::info!(project_id = %project_id, task_id = %issue.id, "plane issue created");
        Ok(TaskSnapshot::from(issue))
    }

    pub async fn patch_task(
        &self,
        project_id: &ProjectId,
        request: &TaskUpdateRequest,
    ) -> Result<TaskSnapshot> {
        let url = self.issue_url(project_id, &request.task_id);
        let payload = build_update_payload(request);
        tracing::debug!(
            project_id = %project_id,
            task_id = %request.task_id,
            payload = %payload,
            "updating plane issue"
        );
        let response = send_with_retry(SERVICE_NAME, "update issue", self.retry, || {
            self.http.patch(&url).json(&payload)
        })
        .await?;
        let issue: PlaneIssue = decode_json_response(SERVICE_NAME, "update issue", response).await?;
        tracing::info!(project_id = %project_id, task_id = %issue.id, "plane issue updated");
        Ok(TaskSnapshot::from(issue))
    }

    pub async fn remove_task(&self, project_id: &ProjectId, task_id: &TaskId) -> Result<()> {
        let url = self.issue_url(project_id, task_id);
        let response = send_with_retry(SERVICE_NAME, "delete issue", self.retry, || {
            self.http.delete(&url)
        })
        .await?;
        // A retried delete may land after the first one already succeeded.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(project_id = %project_id, task_id = %task_id, "plane issue already deleted");
            return Ok(());
        }
        ensure_success(SERVICE_NAME, "delete issue", response).await?;
        tracing::info!(project_id = %project_id, task_id = %task_id, "plane issue deleted");
        Ok(())
    }

    async fn get_optional<T>(&self, operation: &str, url: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response =
            send_with_retry(SERVICE_NAME, operation, self.retry, || self.http.get(url)).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(operation, url, "plane entity not found");
            return Ok(None);
        }
        decode_json_response(SERVICE_NAME, operation, response)
            .await
            .map(Some)
    }

    async fn get_all_pages<T>(&self, operation: &str, url: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let response = send_with_retry(SERVICE_NAME, operation, self.retry, || {
                let request = self.http.get(url).query(&[("per_page", PAGE_SIZE)]);
                match cursor.as_deref() {
                    Some(cursor) => request.query(&[("cursor", cursor)]),
                    None => request,
                }
            })
            .await?;
            let page: PlaneListResponse<T> =
                decode_json_response(SERVICE_NAME, operation, response).await?;
            let (chunk, next) = page.into_parts();
            rows.extend(chunk);
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(rows),
            }
        }
        tracing::warn!(operation, pages = MAX_PAGES, "plane pagination limit reached");
        Ok(rows)
    }
}

fn upstream(operation: &str, error: anyhow::Error) -> UpstreamError {
    tracing::warn!(operation, error = %format!("{error:#}"), "plane request failed");
    UpstreamError::new(operation, format!("{error:#}"))
}

#[async_trait]
impl TrackerClient for PlaneApiClient {
    async fn get_project(&self, project_id: &ProjectId) -> TrackerResult<Option<ProjectInfo>> {
        self.fetch_project(project_id)
            .await
            .map_err(|error| upstream("get_project", error))
    }

    async fn get_states(&self, project_id: &ProjectId) -> TrackerResult<Vec<TaskState>> {
        self.fetch_states(project_id)
            .await
            .map_err(|error| upstream("get_states", error))
    }

    async fn get_tasks(&self, project_id: &ProjectId) -> TrackerResult<Vec<TaskSnapshot>> {
        self.fetch_tasks(project_id)
            .await
            .map_err(|error| upstream("get_tasks", error))
    }

    async fn get_task(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
    ) -> TrackerResult<Option<TaskSnapshot>> {
        self.fetch_task(project_id, task_id)
            .await
            .map_err(|error| upstream("get_task", error))
    }

    async fn create_task(
        &self,
        project_id: &ProjectId,
        request: &TaskMutationRequest,
    ) -> TrackerResult<TaskSnapshot> {
        self.post_task(project_id, request)
            .await
            .map_err(|error| upstream("create_task", error))
    }

    async fn update_task(
        &self,
        project_id: &ProjectId,
        request: &TaskUpdateRequest,
    ) -> TrackerResult<TaskSnapshot> {
        self.patch_task(project_id, request)
            .await
            .map_err(|error| upstream("update_task", error))
    }

    async fn delete_task(&self, project_id: &ProjectId, task_id: &TaskId) -> TrackerResult<()> {
        self.remove_task(project_id, task_id)
            .await
            .map_err(|error| upstream("delete_task", error))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use planebot_core::{
        MemberId, ProjectId, StateId, TaskId, TaskMutationRequest, TaskPriority,
        TaskUpdateRequest, TrackerClient,
    };
    use serde_json::json;

    use super::{PlaneApiClient, PlaneApiConfig};

    const PROJECT_PATH: &str = "/api/v1/workspaces/acme/projects/P1";

    fn client(base_url: &str) -> PlaneApiClient {
        PlaneApiClient::new(PlaneApiConfig {
            base_url: format!("{base_url}/"),
            workspace_slug: "acme".to_string(),
            api_token: "plane-token".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 2,
            retry_base_delay_ms: 1,
        })
        .expect("client")
    }

    fn issue_json(id: &str, state: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("Task {id}"),
            "description_html": "<p>text</p>",
            "start_date": null,
            "target_date": null,
            "priority": "none",
            "state": state,
            "assignees": []
        })
    }

    #[tokio::test]
    async fn functional_get_states_follows_cursor_pages_with_api_key() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path(format!("{PROJECT_PATH}/states/"))
                .header("x-api-key", "plane-token")
                .query_param("per_page", "100")
                .query_param_missing("cursor");
            then.status(200).json_body(json!({
                "results": [{"id": "S1", "name": "Todo"}],
                "next_cursor": "100:1:0",
                "next_page_results": true
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path(format!("{PROJECT_PATH}/states/"))
                .query_param("cursor", "100:1:0");
            then.status(200).json_body(json!({
                "results": [{"id": "S2", "name": "Done"}],
                "next_cursor": "100:2:0",
                "next_page_results": false
            }));
        });

        let states = client(&server.base_url())
            .get_states(&ProjectId::from("P1"))
            .await
            .expect("states");
        let labels: Vec<&str> = states.iter().map(|state| state.label.as_str()).collect();
        assert_eq!(labels, vec!["Todo", "Done"]);
        first.assert_calls(1);
        second.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_get_task_maps_not_found_to_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(format!("{PROJECT_PATH}/issues/T404/"));
            then.status(404).json_body(json!({"detail": "Not found."}));
        });
        let task = client(&server.base_url())
            .get_task(&ProjectId::from("P1"), &TaskId::from("T404"))
            .await
            .expect("lookup");
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn functional_create_task_posts_payload_and_maps_snapshot() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path(format!("{PROJECT_PATH}/issues/"))
                .json_body(json!({
                    "name": "Fix login bug",
                    "target_date": "2024-03-01",
                    "priority": "high",
                    "assignees": ["M7"]
                }));
            then.status(201).json_body(json!({
                "id": "T1",
                "name": "Fix login bug",
                "description_html": "<p></p>",
                "start_date": null,
                "target_date": "2024-03-01",
                "priority": "high",
                "state": "S1",
                "assignees": ["M7"]
            }));
        });
        let request = TaskMutationRequest {
            title: Some("Fix login bug".to_string()),
            deadline_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            priority: Some(TaskPriority::High),
            mentions: vec!["alice".to_string()],
            assignees: vec![MemberId::from("M7")],
            ..TaskMutationRequest::default()
        };
        let created = client(&server.base_url())
            .create_task(&ProjectId::from("P1"), &request)
            .await
            .expect("created");
        create.assert_calls(1);
        assert_eq!(created.id, TaskId::from("T1"));
        assert_eq!(created.priority, TaskPriority::High);
        assert_eq!(created.assignees, vec![MemberId::from("M7")]);
    }

    #[tokio::test]
    async fn functional_update_task_patches_only_present_fields() {
        let server = MockServer::start();
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path(format!("{PROJECT_PATH}/issues/T1/"))
                .json_body(json!({"state": "S2"}));
            then.status(200).json_body(issue_json("T1", "S2"));
        });
        let request = TaskUpdateRequest {
            task_id: TaskId::from("T1"),
            changes: TaskMutationRequest {
                state_name: Some("Done".to_string()),
                state_id: Some(StateId::from("S2")),
                ..TaskMutationRequest::default()
            },
        };
        let updated = client(&server.base_url())
            .update_task(&ProjectId::from("P1"), &request)
            .await
            .expect("updated");
        patch.assert_calls(1);
        assert_eq!(updated.state_id, StateId::from("S2"));
    }

    #[tokio::test]
    async fn integration_delete_task_accepts_no_content_and_surfaces_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path(format!("{PROJECT_PATH}/issues/T1/"));
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(DELETE).path(format!("{PROJECT_PATH}/issues/T2/"));
            then.status(403).body("forbidden");
        });
        let client = client(&server.base_url());
        client
            .delete_task(&ProjectId::from("P1"), &TaskId::from("T1"))
            .await
            .expect("deleted");
        let error = client
            .delete_task(&ProjectId::from("P1"), &TaskId::from("T2"))
            .await
            .expect_err("forbidden");
        assert_eq!(error.operation, "delete_task");
        assert!(error.detail.contains("status 403"));
        assert!(error.detail.contains("forbidden"));
    }

    #[tokio::test]
    async fn regression_create_task_is_sent_once_when_server_fails() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST).path(format!("{PROJECT_PATH}/issues/"));
            then.status(502).body("bad gateway");
        });
        let request = TaskMutationRequest {
            title: Some("Fix login bug".to_string()),
            ..TaskMutationRequest::default()
        };
        let error = client(&server.base_url())
            .create_task(&ProjectId::from("P1"), &request)
            .await
            .expect_err("upstream");
        create.assert_calls(1);
        assert_eq!(error.operation, "create_task");
        assert!(error.detail.contains("status 502"));
    }

    #[tokio::test]
    async fn regression_delete_of_already_removed_task_succeeds() {
        let server = MockServer::start();
        let gone = server.mock(|when, then| {
            when.method(DELETE).path(format!("{PROJECT_PATH}/issues/T1/"));
            then.status(404).json_body(json!({"detail": "Not found."}));
        });
        client(&server.base_url())
            .delete_task(&ProjectId::from("P1"), &TaskId::from("T1"))
            .await
            .expect("already deleted");
        gone.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_server_errors_are_retried_before_surfacing() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path(format!("{PROJECT_PATH}/issues/"));
            then.status(502).body("bad gateway");
        });
        let error = client(&server.base_url())
            .get_tasks(&ProjectId::from("P1"))
            .await
            .expect_err("upstream");
        failing.assert_calls(2);
        assert!(error.detail.contains("status 502"));
    }

    #[test]
    fn unit_link_builder_uses_site_root_and_workspace() {
        let client = client("https://plane.example.com");
        assert_eq!(
            client
                .link_builder()
                .task_url(&ProjectId::from("P1"), &TaskId::from("T1")),
            "https://plane.example.com/acme/projects/P1/issues/T1"
        );
    }
}
