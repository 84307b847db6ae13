use crate::commands::{with_database, CommandResult};

pub fn run() -> CommandResult {
    match with_database("migrate", |_, _| async { Ok(()) }) {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure,
    }
}
