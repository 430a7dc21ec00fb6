//! MarkdownV2 renderers for list reports and create/update/delete replies.
//!
//! Every literal fragment (titles, labels, dates, handles, links) goes
//! through the escaper exactly once, at the point where it is placed into
//! markup. Description HTML is converted by [`html_to_markdown_v2`], which
//! escapes its own text.

use chrono::NaiveDate;

use crate::html_markup::{html_to_markdown_v2, html_to_plain_text};
use crate::markup_escape::{
    escape_markdown_v2, escape_markdown_v2_code, escape_markdown_v2_link_url,
};
use crate::task_directory::{NameResolver, StateDirectory};
use crate::task_model::{MemberId, ProjectId, TaskId, TaskSnapshot};

pub const SUCCESS_MARKER: &str = "✅";
pub const FAILURE_MARKER: &str = "❌";
const CHANGE_ARROW: &str = "⇒";
const ADDITION_MARKER: &str = "➕";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ReportField` values.
pub enum ReportField {
    Title,
    Description,
    StartDate,
    Deadline,
    Priority,
    State,
    Assignees,
}

impl ReportField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Description => "Description",
            Self::StartDate => "Start",
            Self::Deadline => "Deadline",
            Self::Priority => "Priority",
            Self::State => "State",
            Self::Assignees => "Assignees",
        }
    }
}

/// Order in which changed fields appear in update replies.
pub const UPDATE_REPORT_FIELD_ORDER: [ReportField; 7] = [
    ReportField::Title,
    ReportField::Description,
    ReportField::StartDate,
    ReportField::Deadline,
    ReportField::Priority,
    ReportField::State,
    ReportField::Assignees,
];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Builds web links to tasks in the tracker UI.
pub struct TaskLinkBuilder {
    web_base: String,
    workspace_slug: String,
}

impl TaskLinkBuilder {
    pub fn new(web_base: impl Into<String>, workspace_slug: impl Into<String>) -> Self {
        Self {
            web_base: web_base.into().trim_end_matches('/').to_string(),
            workspace_slug: workspace_slug.into().trim_matches('/').to_string(),
        }
    }

    pub fn task_url(&self, project_id: &ProjectId, task_id: &TaskId) -> String {
        format!(
            "{}/{}/projects/{}/issues/{}",
            self.web_base, self.workspace_slug, project_id, task_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSection {
    pub status: String,
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Tasks grouped by report state, in configured order. Built per report.
pub struct CategorizedTaskSet {
    pub sections: Vec<TaskSection>,
}

impl CategorizedTaskSet {
    /// Groups `tasks` under each configured report state that exists in the
    /// project. Returns `None` when none of the configured states exist.
    pub fn categorize(
        report_states: &[String],
        states: &StateDirectory,
        tasks: &[TaskSnapshot],
    ) -> Option<Self> {
        let project_id = states.project_id();
        let sections: Vec<TaskSection> = report_states
            .iter()
            .filter_map(|label| {
                let state_id = states.resolve_state(project_id, label)?;
                let tasks = tasks
                    .iter()
                    .filter(|task| &task.state_id == state_id)
                    .cloned()
                    .collect();
                Some(TaskSection {
                    status: label.clone(),
                    tasks,
                })
            })
            .collect();
        if sections.is_empty() {
            return None;
        }
        Some(Self { sections })
    }

    pub fn task_count(&self) -> usize {
        self.sections.iter().map(|section| section.tasks.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportRenderer<'a> {
    links: &'a TaskLinkBuilder,
    resolver: NameResolver<'a>,
}

impl<'a> ReportRenderer<'a> {
    pub fn new(links: &'a TaskLinkBuilder, resolver: NameResolver<'a>) -> Self {
        Self { links, resolver }
    }

    /// One section per status; empty sections say so explicitly.
    pub fn render_list_report(&self, project_label: &str, tasks: &CategorizedTaskSet) -> String {
        let project_id = self.resolver.project_id();
        let mut lines = vec![format!(
            "📍*Project: {}*\n",
            escape_markdown_v2(project_label)
        )];
        for section in &tasks.sections {
            lines.push(format!("*{}*:", escape_markdown_v2(&section.status)));
            if section.tasks.is_empty() {
                lines.push("_No tasks_\n".to_string());
                continue;
            }
            for task in &section.tasks {
                lines.push(format!(
                    "• {}\n  └ Assigned to: {}",
                    self.task_link(project_id, task),
                    self.assignee_summary(&task.assignees)
                ));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    /// Lists every populated field of a freshly created task.
    pub fn render_create_report(&self, task: &TaskSnapshot, project_id: &ProjectId) -> String {
        let mut reply = format!(
            "{SUCCESS_MARKER}Task created successfully:\n{}\nID: `{}`\n",
            self.task_link(project_id, task),
            escape_markdown_v2_code(task.id.as_str())
        );
        reply.push_str(&field_line(ReportField::Title, &escape_markdown_v2(&task.name)));
        let description = html_to_markdown_v2(&task.description_html);
        if !description.is_empty() {
            reply.push_str(&field_line(ReportField::Description, &description));
        }
        if let Some(start) = task.start_date {
            reply.push_str(&field_line(ReportField::StartDate, &escape_date(start)));
        }
        if let Some(deadline) = task.target_date {
            reply.push_str(&field_line(ReportField::Deadline, &escape_date(deadline)));
        }
        if !task.priority.is_none() {
            reply.push_str(&field_line(
                ReportField::Priority,
                &escape_markdown_v2(task.priority.as_str()),
            ));
        }
        if let Some(label) = self.resolver.label_for_state(project_id, &task.state_id) {
            reply.push_str(&field_line(ReportField::State, &escape_markdown_v2(label)));
        }
        if !task.assignees.is_empty() {
            reply.push_str("Assignees:\n");
            for member in &task.assignees {
                reply.push_str(&format!("  {}\n", self.member_label(member)));
            }
        }
        reply
    }

    /// Lists only the fields that differ between `old` and `new`.
    pub fn render_update_report(
        &self,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
        project_id: &ProjectId,
    ) -> String {
        let mut reply = format!(
            "{SUCCESS_MARKER}Task updated successfully:\n{}\nUUID: `{}`\n",
            self.task_link(project_id, new),
            escape_markdown_v2_code(new.id.as_str())
        );
        for field in UPDATE_REPORT_FIELD_ORDER {
            if let Some(section) = self.render_field_change(field, old, new, project_id) {
                reply.push_str(&section);
            }
        }
        reply
    }

    pub fn render_delete_report(&self, task: &TaskSnapshot) -> String {
        format!(
            "{SUCCESS_MARKER}Task deleted successfully:\n{}\nUUID: `{}`\n",
            escape_markdown_v2(&task.name),
            escape_markdown_v2_code(task.id.as_str())
        )
    }

    fn render_field_change(
        &self,
        field: ReportField,
        old: &TaskSnapshot,
        new: &TaskSnapshot,
        project_id: &ProjectId,
    ) -> Option<String> {
        match field {
            ReportField::Title => (old.name != new.name).then(|| {
                scalar_change(
                    field,
                    Some(escape_markdown_v2(&old.name)),
                    Some(escape_markdown_v2(&new.name)),
                )
            }),
            ReportField::Description => {
                let changed = html_to_plain_text(&old.description_html)
                    != html_to_plain_text(&new.description_html);
                changed.then(|| {
                    scalar_change(
                        field,
                        non_empty(html_to_markdown_v2(&old.description_html)),
                        non_empty(html_to_markdown_v2(&new.description_html)),
                    )
                })
            }
            ReportField::StartDate => date_change(field, old.start_date, new.start_date),
            ReportField::Deadline => date_change(field, old.target_date, new.target_date),
            ReportField::Priority => (old.priority != new.priority).then(|| {
                scalar_change(
                    field,
                    Some(escape_markdown_v2(old.priority.as_str())),
                    Some(escape_markdown_v2(new.priority.as_str())),
                )
            }),
            ReportField::State => (old.state_id != new.state_id).then(|| {
                let label = |task: &TaskSnapshot| {
                    escape_markdown_v2(
                        self.resolver
                            .state_label_or_unknown(project_id, &task.state_id),
                    )
                };
                scalar_change(field, Some(label(old)), Some(label(new)))
            }),
            ReportField::Assignees => {
                let added: Vec<&MemberId> = new
                    .assignees
                    .iter()
                    .filter(|member| !old.assignees.contains(member))
                    .collect();
                if added.is_empty() {
                    return None;
                }
                let mut section = String::from("Assignees:\n");
                for member in added {
                    section.push_str(&format!(" {ADDITION_MARKER} {}\n", self.member_label(member)));
                }
                Some(section)
            }
        }
    }

    fn task_link(&self, project_id: &ProjectId, task: &TaskSnapshot) -> String {
        format!(
            "[{}]({})",
            escape_markdown_v2(&task.name),
            escape_markdown_v2_link_url(&self.links.task_url(project_id, &task.id))
        )
    }

    fn member_label(&self, member_id: &MemberId) -> String {
        escape_markdown_v2(&self.resolver.member_display(member_id))
    }

    fn assignee_summary(&self, assignees: &[MemberId]) -> String {
        let mut unique: Vec<&MemberId> = Vec::with_capacity(assignees.len());
        for member in assignees {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        if unique.is_empty() {
            return "_Unassigned_".to_string();
        }
        let names: Vec<String> = unique
            .into_iter()
            .map(|member| self.resolver.member_display(member))
            .collect();
        escape_markdown_v2(&names.join(", "))
    }
}

/// One escaped state label per line.
pub fn render_state_list(states: &StateDirectory) -> String {
    states
        .states()
        .iter()
        .map(|state| escape_markdown_v2(&state.label))
        .collect::<Vec<_>>()
        .join("\n")
}

fn field_line(field: ReportField, rendered_value: &str) -> String {
    format!("{}: {}\n", field.label(), rendered_value)
}

fn scalar_change(field: ReportField, old: Option<String>, new: Option<String>) -> String {
    let new = new.unwrap_or_else(|| "_none_".to_string());
    match old {
        Some(old) => format!("{}: ~{}~ {CHANGE_ARROW} {}\n", field.label(), old, new),
        None => field_line(field, &new),
    }
}

fn date_change(
    field: ReportField,
    old: Option<NaiveDate>,
    new: Option<NaiveDate>,
) -> Option<String> {
    (old != new).then(|| scalar_change(field, old.map(escape_date), new.map(escape_date)))
}

fn escape_date(date: NaiveDate) -> String {
    escape_markdown_v2(&date.format("%Y-%m-%d").to_string())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        render_state_list, CategorizedTaskSet, ReportRenderer, TaskLinkBuilder,
    };
    use crate::markup_escape::MARKDOWN_V2_SPECIAL_CHARS;
    use crate::task_directory::{MemberDirectory, NameResolver, StateDirectory};
    use crate::task_model::{MemberId, ProjectId, StateId, TaskId, TaskPriority, TaskSnapshot, TaskState};

    const TASK_ID: &str = "3f2b9c1e-7a4d-4e8b-9c0f-1a2b3c4d5e6f";

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn members() -> MemberDirectory {
        MemberDirectory::from_entries([
            (MemberId::from("M7"), "alice"),
            (MemberId::from("M8"), "bob_smith"),
        ])
        .expect("members")
    }

    fn states() -> StateDirectory {
        StateDirectory::new(
            ProjectId::from("P1"),
            vec![
                TaskState::new("S1", "Todo"),
                TaskState::new("S2", "In Progress"),
                TaskState::new("S3", "Done"),
            ],
        )
    }

    fn links() -> TaskLinkBuilder {
        TaskLinkBuilder::new("https://plane.example.com/", "acme")
    }

    fn task(name: &str, state: &str, assignees: &[&str]) -> TaskSnapshot {
        TaskSnapshot {
            id: TaskId::from(TASK_ID),
            name: name.to_string(),
            description_html: String::new(),
            start_date: None,
            target_date: None,
            priority: TaskPriority::None,
            state_id: StateId::from(state),
            assignees: assignees.iter().map(|id| MemberId::from(*id)).collect(),
        }
    }

    fn has_unescaped_special(text: &str, allowed: &[char]) -> bool {
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                chars.next();
                continue;
            }
            if MARKDOWN_V2_SPECIAL_CHARS.contains(&ch) && !allowed.contains(&ch) {
                return true;
            }
        }
        false
    }

    #[test]
    fn unit_task_link_builder_joins_base_slug_and_ids() {
        assert_eq!(
            links().task_url(&ProjectId::from("P1"), &TaskId::from("T1")),
            "https://plane.example.com/acme/projects/P1/issues/T1"
        );
    }

    #[test]
    fn functional_categorize_keeps_configured_order_and_skips_missing_states() {
        let tasks = vec![
            task("a", "S3", &[]),
            task("b", "S1", &[]),
            task("c", "S3", &[]),
        ];
        let report_states = vec!["Done".to_string(), "Blocked".to_string(), "Todo".to_string()];
        let set = CategorizedTaskSet::categorize(&report_states, &states(), &tasks).expect("set");
        let statuses: Vec<&str> = set.sections.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(statuses, vec!["Done", "Todo"]);
        assert_eq!(set.sections[0].tasks.len(), 2);
        assert_eq!(set.task_count(), 3);
        assert!(CategorizedTaskSet::categorize(&["Blocked".to_string()], &states(), &tasks).is_none());
    }

    #[test]
    fn functional_render_list_report_marks_empty_sections_and_unassigned_tasks() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let tasks = vec![
            task("Fix bug.", "S1", &["M7", "M8", "M7"]),
            task("Write docs", "S1", &[]),
        ];
        let set = CategorizedTaskSet::categorize(
            &["Todo".to_string(), "Done".to_string()],
            &states,
            &tasks,
        )
        .expect("set");
        let report = renderer.render_list_report("Web (beta)", &set);
        let expected = format!(
            "📍*Project: Web \\(beta\\)*\n\n*Todo*:\n\
             • [Fix bug\\.](https://plane.example.com/acme/projects/P1/issues/{TASK_ID})\n  └ Assigned to: @alice, @bob\\_smith\n\
             • [Write docs](https://plane.example.com/acme/projects/P1/issues/{TASK_ID})\n  └ Assigned to: _Unassigned_\n\
             \n*Done*:\n_No tasks_\n"
        );
        assert_eq!(report, expected);
    }

    #[test]
    fn functional_render_create_report_shows_populated_fields_only() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let mut created = task("Fix login bug", "S1", &["M7"]);
        created.priority = TaskPriority::High;
        created.target_date = Some(date("2024-03-01"));
        let report = renderer.render_create_report(&created, &ProjectId::from("P1"));
        assert!(report.starts_with("✅Task created successfully:\n[Fix login bug]("));
        assert!(report.contains(&format!("ID: `{TASK_ID}`")));
        assert!(report.contains("Title: Fix login bug\n"));
        assert!(report.contains("Priority: high\n"));
        assert!(report.contains("Deadline: 2024\\-03\\-01\n"));
        assert!(report.contains("State: Todo\n"));
        assert!(report.contains("Assignees:\n  @alice\n"));
        assert!(!report.contains("Start:"));
        assert!(!report.contains("Description:"));

        created.priority = TaskPriority::None;
        created.state_id = StateId::from("stale");
        let report = renderer.render_create_report(&created, &ProjectId::from("P1"));
        assert!(!report.contains("Priority:"));
        assert!(!report.contains("State:"));
    }

    #[test]
    fn regression_update_report_omits_unchanged_priority() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let old = task("Fix", "S1", &[]);
        let new = task("Fix", "S2", &[]);
        let report = renderer.render_update_report(&old, &new, &ProjectId::from("P1"));
        assert!(report.contains("State: ~Todo~ ⇒ In Progress\n"));
        assert!(!report.contains("Priority"));
        assert!(!report.contains("Title:"));
    }

    #[test]
    fn functional_update_report_lists_changes_in_fixed_order() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let mut old = task("Old title", "S1", &["M8"]);
        old.description_html = "<p>old text</p>".to_string();
        old.target_date = Some(date("2024-01-10"));
        let mut new = task("New title", "S3", &["M8", "M7", "M99"]);
        new.description_html = String::new();
        new.start_date = Some(date("2024-01-02"));
        new.target_date = Some(date("2024-01-20"));
        new.priority = TaskPriority::Urgent;
        let report = renderer.render_update_report(&old, &new, &ProjectId::from("P1"));
        let body: Vec<&str> = report.lines().skip(3).collect();
        assert_eq!(
            body,
            vec![
                "Title: ~Old title~ ⇒ New title",
                "Description: ~old text~ ⇒ _none_",
                "Start: 2024\\-01\\-02",
                "Deadline: ~2024\\-01\\-10~ ⇒ 2024\\-01\\-20",
                "Priority: ~none~ ⇒ urgent",
                "State: ~Todo~ ⇒ Done",
                "Assignees:",
                " ➕ @alice",
                " ➕ unknown",
            ]
        );
    }

    #[test]
    fn regression_update_report_ignores_assignee_removals() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let old = task("Fix", "S1", &["M7", "M8"]);
        let new = task("Fix", "S1", &["M7"]);
        let report = renderer.render_update_report(&old, &new, &ProjectId::from("P1"));
        assert!(!report.contains("Assignees"));
        assert_eq!(report.lines().count(), 3);
    }

    #[test]
    fn functional_rendered_reports_escape_every_literal_fragment() {
        let members = members();
        let states = StateDirectory::new(
            ProjectId::from("P1"),
            vec![TaskState::new("S1", "To-do (v2.0)!")],
        );
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let hostile: String = MARKDOWN_V2_SPECIAL_CHARS.iter().collect();
        let mut created = task(&hostile, "S1", &["M8"]);
        created.description_html = format!("<p>{}</p>", hostile.replace('&', "&amp;"));
        let report = renderer.render_create_report(&created, &ProjectId::from("P1"));
        let fields = report.lines().skip(3).collect::<Vec<_>>().join("\n");
        assert!(fields.starts_with("Title: "));
        assert!(!has_unescaped_special(&fields, &[]));
        assert!(report.contains("State: To\\-do \\(v2\\.0\\)\\!\n"));
    }

    #[test]
    fn unit_render_state_list_escapes_each_label() {
        assert_eq!(render_state_list(&states()), "Todo\nIn Progress\nDone");
        let states = StateDirectory::new(ProjectId::from("P1"), vec![TaskState::new("S1", "QA-ready")]);
        assert_eq!(render_state_list(&states), "QA\\-ready");
    }

    #[test]
    fn unit_render_delete_report_names_task() {
        let members = members();
        let states = states();
        let links = links();
        let renderer = ReportRenderer::new(&links, NameResolver::new(&members, &states));
        let report = renderer.render_delete_report(&task("Old_task", "S1", &[]));
        assert!(report.starts_with("✅Task deleted successfully:\nOld\\_task\n"));
    }
}
