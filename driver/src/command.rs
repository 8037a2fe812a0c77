use std::process::Command;

use deckhand_core::session::CommandRunner;

/// Spawns configured commands through the shell and never waits on
/// them; a spawn failure costs only that one invocation.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn execute(&mut self, command: &str) {
        match Command::new("sh").arg("-c").arg(command).spawn() {
            Ok(child) => log::debug!("spawned {command:?} (pid {})", child.id()),
            Err(err) => log::error!("cannot spawn {command:?}: {err}"),
        }
    }
}
