use std::sync::Arc;

use httpmock::prelude::*;
use planebot_core::{ChatId, MemberDirectory, MemberId, ProjectChatBinding, ProjectId};
use planebot_plane::{PlaneApiClient, PlaneApiConfig};
use planebot_runtime::{ChatCommand, CommandRuntimeContext, ProjectReportService, TaskCommandService};
use serde_json::json;

const PROJECT_PATH: &str = "/api/v1/workspaces/acme/projects/P1";
const TASK_ID: &str = "0a1b2c3d-0000-1111-2222-333344445555";

fn plane_client(server: &MockServer) -> PlaneApiClient {
    PlaneApiClient::new(PlaneApiConfig {
        base_url: format!("{}/", server.base_url()),
        workspace_slug: "acme".to_string(),
        api_token: "plane-token".to_string(),
        request_timeout_ms: 2_000,
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
    })
    .expect("plane client")
}

fn command_service(server: &MockServer) -> TaskCommandService {
    let plane = plane_client(server);
    let links = plane.link_builder();
    let context = CommandRuntimeContext::new(
        Arc::new(plane),
        MemberDirectory::from_entries([
            (MemberId::from("M7"), "alice"),
            (MemberId::from("M8"), "bob"),
        ])
        .expect("members"),
        ProjectChatBinding::from_pairs([(ProjectId::from("P1"), ChatId::from("-100"))])
            .expect("bindings"),
        links,
    );
    let reports = ProjectReportService::new(context.clone(), vec!["Todo".to_string()]);
    TaskCommandService::new(context, reports, false)
}

fn mock_states(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("{PROJECT_PATH}/states/"))
            .header("x-api-key", "plane-token");
        then.status(200).json_body(json!({
            "results": [
                {"id": "S1", "name": "Todo"},
                {"id": "S2", "name": "Done"}
            ],
            "next_cursor": "",
            "next_page_results": false
        }));
    })
}

fn chat() -> ChatId {
    ChatId::from("-100")
}

#[tokio::test]
async fn integration_newtask_creates_issue_through_plane_api() {
    let server = MockServer::start();
    let states = mock_states(&server);
    let create = server.mock(|when, then| {
        when.method(POST)
            .path(format!("{PROJECT_PATH}/issues/"))
            .body_includes("\"name\":\"Fix login bug\"")
            .body_includes("\"priority\":\"high\"")
            .body_includes("\"assignees\":[\"M7\"]");
        then.status(201).json_body(json!({
            "id": TASK_ID,
            "name": "Fix login bug",
            "description_html": "",
            "priority": "high",
            "state": "S1",
            "assignees": ["M7"]
        }));
    });

    let reply = command_service(&server)
        .handle_message(
            &chat(),
            "/newtask\nTitle: Fix login bug\nPriority: 3\n@alice",
            Some("planebot"),
        )
        .await
        .expect("command reply");

    states.assert_calls(1);
    create.assert_calls(1);
    assert!(reply.starts_with("✅Task created successfully:\n"));
    assert!(reply.contains("Fix login bug"));
    assert!(reply.contains("@alice"));
}

#[tokio::test]
async fn integration_updatetask_patches_only_changed_state() {
    let server = MockServer::start();
    mock_states(&server);
    let existing = server.mock(|when, then| {
        when.method(GET).path(format!("{PROJECT_PATH}/issues/{TASK_ID}/"));
        then.status(200).json_body(json!({
            "id": TASK_ID,
            "name": "Fix login bug",
            "priority": "none",
            "state": "S1",
            "assignees": ["M8"]
        }));
    });
    let patch = server.mock(|when, then| {
        when.method(PATCH)
            .path(format!("{PROJECT_PATH}/issues/{TASK_ID}/"))
            .json_body(json!({"state": "S2"}));
        then.status(200).json_body(json!({
            "id": TASK_ID,
            "name": "Fix login bug",
            "priority": "none",
            "state": "S2",
            "assignees": ["M8"]
        }));
    });

    let reply = command_service(&server)
        .handle(
            &chat(),
            ChatCommand::UpdateTask,
            &format!("\nUUID: {TASK_ID}\nState: Done"),
        )
        .await;

    existing.assert_calls(1);
    patch.assert_calls(1);
    assert!(reply.starts_with("✅Task updated successfully:\n"));
    assert!(reply.contains("State: ~Todo~ ⇒ Done\n"));
}

#[tokio::test]
async fn integration_report_lists_tasks_in_configured_states() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(format!("{PROJECT_PATH}/"));
        then.status(200)
            .json_body(json!({"id": "P1", "name": "Website", "identifier": "WEB"}));
    });
    mock_states(&server);
    server.mock(|when, then| {
        when.method(GET).path(format!("{PROJECT_PATH}/issues/"));
        then.status(200).json_body(json!([
            {"id": "T1", "name": "Write docs", "state": "S1", "assignees": ["M7"]},
            {"id": "T2", "name": "Ship it", "state": "S2", "assignees": ["M8"]}
        ]));
    });

    let report = command_service(&server)
        .handle(&chat(), ChatCommand::Report, "")
        .await;

    assert!(report.starts_with("📍*Project: Website*\n"));
    assert!(report.contains("Write docs"));
    assert!(report.contains("Assigned to: @alice"));
    assert!(!report.contains("Ship it"));
}

#[tokio::test]
async fn regression_plane_outage_yields_generic_error_reply() {
    let server = MockServer::start();
    let states = server.mock(|when, then| {
        when.method(GET).path(format!("{PROJECT_PATH}/states/"));
        then.status(503).body("maintenance");
    });

    let reply = command_service(&server)
        .handle(&chat(), ChatCommand::GetStates, "")
        .await;

    states.assert_calls(1);
    assert_eq!(
        reply,
        "❌The tracker request failed\\. Please try again later\\."
    );
}
