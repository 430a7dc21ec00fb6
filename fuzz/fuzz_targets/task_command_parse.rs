#![no_main]

use libfuzzer_sys::fuzz_target;
use planebot_core::{
    parse_command_envelope, parse_create_command, parse_delete_command, parse_update_command, TaskField,
};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Some(envelope) = parse_command_envelope(&raw, Some("planebot")) {
        assert!(!envelope.command.is_empty());
        assert!(raw.ends_with(envelope.body));
    }
    if let Ok(fields) = parse_create_command(&raw) {
        assert!(fields.get(TaskField::Uuid).is_none());
    }
    if let Ok(command) = parse_update_command(&raw) {
        assert!(!command.task_id.as_str().is_empty());
    }
    let _ = parse_delete_command(&raw);
});
