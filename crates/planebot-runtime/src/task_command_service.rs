//! Chat command handling: parse, validate, call the tracker, render the reply.

use planebot_core::task_report_render::FAILURE_MARKER;
use planebot_core::{
    escape_markdown_v2, parse_command_envelope, parse_create_command, parse_delete_command,
    parse_update_command, render_state_list, validate_create_command, validate_standalone_fields,
    validate_update_command, ChatId, CommandError, NameResolver, NotFoundError, ProjectContext, ProjectId, ReportRenderer,
    StateDirectory, TaskCommandKind, ValidationError,
};

use crate::{CommandRuntimeContext, ProjectReportService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ChatCommand` values.
pub enum ChatCommand {
    NewTask,
    UpdateTask,
    DeleteTask,
    GetStates,
    Report,
    Help,
}

impl ChatCommand {
    pub const ALL: [ChatCommand; 6] = [
        ChatCommand::NewTask,
        ChatCommand::UpdateTask,
        ChatCommand::DeleteTask,
        ChatCommand::GetStates,
        ChatCommand::Report,
        ChatCommand::Help,
    ];

    pub fn from_command_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.command_name() == name)
    }

    pub fn command_name(self) -> &'static str {
        match self {
            Self::NewTask => "newtask",
            Self::UpdateTask => "updatetask",
            Self::DeleteTask => "deletetask",
            Self::GetStates => "getstates",
            Self::Report => "report",
            Self::Help => "help",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            Self::NewTask => "create a task",
            Self::UpdateTask => "change fields of a task",
            Self::DeleteTask => "delete a task",
            Self::GetStates => "list the states of this chat's project",
            Self::Report => "show the project report now",
            Self::Help => "show this help",
        }
    }

    fn task_kind(self) -> Option<TaskCommandKind> {
        match self {
            Self::NewTask => Some(TaskCommandKind::Create),
            Self::UpdateTask => Some(TaskCommandKind::Update),
            Self::DeleteTask => Some(TaskCommandKind::Delete),
            Self::GetStates | Self::Report | Self::Help => None,
        }
    }
}

#[derive(Clone)]
pub struct TaskCommandService {
    context: CommandRuntimeContext,
    reports: ProjectReportService,
    verbose_errors: bool,
}

impl TaskCommandService {
    pub fn new(
        context: CommandRuntimeContext,
        reports: ProjectReportService,
        verbose_errors: bool,
    ) -> Self {
        Self {
            context,
            reports,
            verbose_errors,
        }
    }

    /// Handles a raw chat message. Returns `None` for anything that is not one
    /// of our commands, including commands addressed to another bot.
    pub async fn handle_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        bot_name: Option<&str>,
    ) -> Option<String> {
        let envelope = parse_command_envelope(text, bot_name)?;
        let command = ChatCommand::from_command_name(envelope.command)?;
        Some(self.handle(chat_id, command, envelope.body).await)
    }

    /// Runs one command and renders the MarkdownV2 reply, success or failure.
    pub async fn handle(&self, chat_id: &ChatId, command: ChatCommand, body: &str) -> String {
        tracing::info!(
            chat_id = %chat_id,
            command = command.command_name(),
            "handling chat command"
        );
        match self.execute(chat_id, command, body).await {
            Ok(reply) => reply,
            Err(error) => {
                match &error {
                    CommandError::Upstream(_) => tracing::warn!(
                        chat_id = %chat_id,
                        command = command.command_name(),
                        error = %error,
                        "tracker call failed"
                    ),
                    _ => tracing::info!(
                        chat_id = %chat_id,
                        command = command.command_name(),
                        error = %error,
                        "chat command rejected"
                    ),
                }
                render_command_error(&error, self.verbose_errors)
            }
        }
    }

    async fn execute(
        &self,
        chat_id: &ChatId,
        command: ChatCommand,
        body: &str,
    ) -> Result<String, CommandError> {
        if command == ChatCommand::Help {
            return Ok(render_help());
        }
        let project_id = self.context.project_for_chat(chat_id)?;
        match command {
            ChatCommand::NewTask => self.create_task(&project_id, body).await,
            ChatCommand::UpdateTask => self.update_task(&project_id, body).await,
            ChatCommand::DeleteTask => self.delete_task(&project_id, body).await,
            ChatCommand::GetStates => self.list_states(&project_id).await,
            ChatCommand::Report => self.project_report(&project_id).await,
            ChatCommand::Help => Ok(render_help()),
        }
    }

    async fn create_task(&self, project_id: &ProjectId, body: &str) -> Result<String, CommandError> {
        let fields = parse_create_command(body)?;
        validate_standalone_fields(&fields, true)?;
        let states = self.context.fetch_state_directory(project_id).await?;
        let resolver = NameResolver::new(&self.context.members, &states);
        let request = validate_create_command(&fields, &ProjectContext::new(resolver))?;
        let created = self.context.tracker.create_task(project_id, &request).await?;
        tracing::info!(project_id = %project_id, task_id = %created.id, "task created from chat");
        Ok(ReportRenderer::new(&self.context.links, resolver).render_create_report(&created, project_id))
    }

    async fn update_task(&self, project_id: &ProjectId, body: &str) -> Result<String, CommandError> {
        let command = parse_update_command(body)?;
        if !command.fields.has_changes() {
            return Ok(escape_markdown_v2(&format!(
                "Nothing to update for task {}.",
                command.task_id
            )));
        }
        validate_standalone_fields(&command.fields, false)?;
        let states = self.context.fetch_state_directory(project_id).await?;
        let existing = self
            .context
            .tracker
            .get_task(project_id, &command.task_id)
            .await?
            .ok_or_else(|| NotFoundError::Task(command.task_id.clone()))?;
        let resolver = NameResolver::new(&self.context.members, &states);
        let request = validate_update_command(&command, &ProjectContext::new(resolver), &existing)?;
        if request.changes.is_empty() {
            return Ok(escape_markdown_v2(&format!(
                "Nothing to update for task {}.",
                command.task_id
            )));
        }
        let updated = self.context.tracker.update_task(project_id, &request).await?;
        tracing::info!(project_id = %project_id, task_id = %updated.id, "task updated from chat");
        Ok(ReportRenderer::new(&self.context.links, resolver)
            .render_update_report(&existing, &updated, project_id))
    }

    async fn delete_task(&self, project_id: &ProjectId, body: &str) -> Result<String, CommandError> {
        let task_id = parse_delete_command(body)?;
        let existing = self
            .context
            .tracker
            .get_task(project_id, &task_id)
            .await?
            .ok_or_else(|| NotFoundError::Task(task_id.clone()))?;
        self.context.tracker.delete_task(project_id, &task_id).await?;
        tracing::info!(project_id = %project_id, task_id = %task_id, "task deleted from chat");
        let states = StateDirectory::new(project_id.clone(), Vec::new());
        let resolver = NameResolver::new(&self.context.members, &states);
        Ok(ReportRenderer::new(&self.context.links, resolver).render_delete_report(&existing))
    }

    async fn list_states(&self, project_id: &ProjectId) -> Result<String, CommandError> {
        let states = self.context.fetch_state_directory(project_id).await?;
        if states.states().is_empty() {
            return Err(NotFoundError::Project(project_id.clone()).into());
        }
        Ok(render_state_list(&states))
    }

    async fn project_report(&self, project_id: &ProjectId) -> Result<String, CommandError> {
        match self.reports.render_project_report(project_id).await? {
            Some(report) => Ok(report),
            None => Ok(escape_markdown_v2(&format!(
                "No report available. None of the report states ({}) exist in this project.",
                self.reports.report_states().join(", ")
            ))),
        }
    }
}

/// Maps a command failure onto a user-facing MarkdownV2 reply.
///
/// Tracker details are only included when `verbose` is set.
pub fn render_command_error(error: &CommandError, verbose: bool) -> String {
    let message = match error {
        CommandError::Format(format) => format!(
            "The /{} message does not match the expected format: {}.\nUse:\n{}",
            format.kind.command_name(),
            format.reason,
            format.kind.usage()
        ),
        CommandError::Validation(validation) => {
            format!("{} rejected: {validation}.", validation_subject(validation))
        }
        CommandError::NotFound(not_found) => format!("Not found: {not_found}."),
        CommandError::Upstream(upstream) => {
            let mut message =
                "The tracker request failed. Please try again later.".to_string();
            if verbose {
                message.push_str(&format!("\n{upstream}"));
            }
            message
        }
    };
    format!("{FAILURE_MARKER}{}", escape_markdown_v2(&message))
}

fn validation_subject(error: &ValidationError) -> String {
    let fields = error.fields();
    if fields.is_empty() {
        return "Assignees".to_string();
    }
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_help() -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for command in ChatCommand::ALL {
        lines.push(format!("/{} - {}", command.command_name(), command.summary()));
    }
    for command in ChatCommand::ALL {
        if let Some(kind) = command.task_kind() {
            lines.push(String::new());
            lines.push(kind.usage().to_string());
        }
    }
    escape_markdown_v2(&lines.join("\n"))
}
