//! Periodic and on-demand project list reports.

use planebot_core::{
    CategorizedTaskSet, ChatId, NameResolver, ProjectId, ReportRenderer, UpstreamError,
};

use crate::CommandRuntimeContext;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `ChatReport` pairing a rendered report with its destination chat.
pub struct ChatReport {
    pub chat_id: ChatId,
    pub project_id: ProjectId,
    pub text: String,
}

#[derive(Clone)]
pub struct ProjectReportService {
    context: CommandRuntimeContext,
    report_states: Vec<String>,
}

impl ProjectReportService {
    /// `report_states` are state labels in the order their sections appear.
    pub fn new(context: CommandRuntimeContext, report_states: Vec<String>) -> Self {
        Self {
            context,
            report_states,
        }
    }

    pub fn report_states(&self) -> &[String] {
        &self.report_states
    }

    /// Renders the list report for one project.
    ///
    /// Returns `Ok(None)` when the project is unknown to the tracker or has
    /// none of the configured report states.
    pub async fn render_project_report(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<String>, UpstreamError> {
        let tracker = &self.context.tracker;
        let Some(project) = tracker.get_project(project_id).await? else {
            tracing::warn!(project_id = %project_id, "project not found, skipping report");
            return Ok(None);
        };
        let states = self.context.fetch_state_directory(project_id).await?;
        let tasks = tracker.get_tasks(project_id).await?;
        let Some(categorized) =
            CategorizedTaskSet::categorize(&self.report_states, &states, &tasks)
        else {
            tracing::warn!(
                project_id = %project_id,
                report_states = ?self.report_states,
                "project has none of the report states, skipping report"
            );
            return Ok(None);
        };
        tracing::debug!(
            project_id = %project_id,
            sections = categorized.sections.len(),
            tasks = categorized.task_count(),
            "rendering project report"
        );
        let resolver = NameResolver::new(&self.context.members, &states);
        let renderer = ReportRenderer::new(&self.context.links, resolver);
        Ok(Some(renderer.render_list_report(&project.name, &categorized)))
    }

    /// Renders a report for every bound project. Failing projects are logged and skipped.
    pub async fn collect_reports(&self) -> Vec<ChatReport> {
        let mut reports = Vec::new();
        for (project_id, chat_id) in self.context.bindings.iter() {
            match self.render_project_report(project_id).await {
                Ok(Some(text)) => reports.push(ChatReport {
                    chat_id: chat_id.clone(),
                    project_id: project_id.clone(),
                    text,
                }),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        project_id = %project_id,
                        chat_id = %chat_id,
                        error = %error,
                        "failed to build project report"
                    );
                }
            }
        }
        tracing::info!(
            reports = reports.len(),
            projects = self.context.bindings.len(),
            "collected project reports"
        );
        reports
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use planebot_core::{ChatId, MemberId, ProjectId, StateId, TaskId};

    use super::ProjectReportService;
    use crate::test_tracker::{sample_task, test_context, InMemoryTracker};

    fn service(tracker: Arc<InMemoryTracker>, states: &[&str]) -> ProjectReportService {
        ProjectReportService::new(
            test_context(tracker),
            states.iter().map(|state| state.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn functional_render_project_report_groups_tasks_in_configured_order() {
        let mut in_progress = sample_task();
        in_progress.id = TaskId::from("T2");
        in_progress.name = "Ship v2".to_string();
        in_progress.state_id = StateId::from("S2");
        in_progress.assignees = vec![MemberId::from("M7"), MemberId::from("M8")];
        let tracker = Arc::new(InMemoryTracker::with_task(sample_task()));
        tracker
            .tasks
            .lock()
            .await
            .insert(in_progress.id.clone(), in_progress);

        let report = service(tracker, &["In Progress", "Review", "Todo"])
            .render_project_report(&ProjectId::from("P1"))
            .await
            .expect("report")
            .expect("rendered");

        assert!(report.starts_with("📍*Project: Website*\n"));
        let in_progress_at = report.find("*In Progress*:").expect("in progress section");
        let todo_at = report.find("*Todo*:").expect("todo section");
        assert!(in_progress_at < todo_at);
        assert!(!report.contains("Review"));
        assert!(report.contains("Assigned to: @alice, @bob\\_smith"));
        assert!(report.contains("[Fix login bug](https://plane.example.com/acme/projects/P1/issues/"));
    }

    #[tokio::test]
    async fn regression_report_is_skipped_when_no_configured_state_exists() {
        let tracker = Arc::new(InMemoryTracker::with_task(sample_task()));
        let report = service(tracker, &["Backlog"])
            .render_project_report(&ProjectId::from("P1"))
            .await
            .expect("report");
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn integration_collect_reports_targets_bound_chat() {
        let tracker = Arc::new(InMemoryTracker::default());
        let reports = service(tracker.clone(), &["Todo"]).collect_reports().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].chat_id, ChatId::from("-100"));
        assert!(reports[0].text.contains("*Todo*:\n_No tasks_"));
        assert_eq!(
            tracker.calls().await,
            vec!["get_project", "get_states", "get_tasks"]
        );
    }
}
