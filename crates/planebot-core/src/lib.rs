//! Command grammar, validation, name resolution and MarkdownV2 rendering for
//! the Plane chat bot. Everything here is synchronous and free of I/O except
//! the [`TrackerClient`] port, which transport crates implement.

pub mod command_errors;
pub mod html_markup;
pub mod markup_escape;
pub mod task_command_envelope;
pub mod task_command_grammar;
pub mod task_directory;
pub mod task_field_validation;
pub mod task_model;
pub mod task_report_render;
pub mod tracker_client;

pub use command_errors::{CommandError, FormatError, NotFoundError, UpstreamError, ValidationError};
pub use markup_escape::{escape_markdown_v2, unescape_markdown_v2};
pub use task_command_envelope::{parse_command_envelope, ChatCommandEnvelope};
pub use task_command_grammar::{
    parse_create_command, parse_delete_command, parse_update_command, TaskCommandFields,
    TaskCommandKind, TaskField, UpdateTaskCommand,
};
pub use task_directory::{
    DirectoryError, MemberDirectory, NameResolver, ProjectChatBinding, StateDirectory,
};
pub use task_field_validation::{
    parse_and_validate_create, parse_and_validate_update, validate_create_command,
    validate_standalone_fields, validate_update_command, ProjectContext,
};
pub use task_model::{
    ChatId, MemberId, ProjectId, ProjectInfo, StateId, TaskId, TaskMutationRequest, TaskPriority,
    TaskSnapshot, TaskState, TaskUpdateRequest,
};
pub use task_report_render::{
    render_state_list, CategorizedTaskSet, ReportRenderer, TaskLinkBuilder,
};
pub use tracker_client::{TrackerClient, TrackerResult};
