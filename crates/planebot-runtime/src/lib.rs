//! Chat-facing services: command handling, project reports and their schedule.

pub mod command_runtime_context;
pub mod project_report_service;
pub mod report_schedule;
pub mod task_command_service;

#[cfg(test)]
mod test_tracker;

pub use command_runtime_context::CommandRuntimeContext;
pub use project_report_service::{ChatReport, ProjectReportService};
pub use report_schedule::{run_report_scheduler, ReportDispatcher, ReportSchedule};
pub use task_command_service::{render_command_error, ChatCommand, TaskCommandService};
