use msh_types::{Context, ExitStatus};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

mod bg;
pub mod cd;
mod fg;
mod jobs;
mod stop;

/// Interface builtin commands use to reach back into the shell without
/// direct coupling.
pub trait ShellProxy {
    /// Initiates shell exit.
    fn exit_shell(&mut self);

    /// Hands a command to the shell's dispatch logic. Job-control builtins
    /// go through here because they mutate shell-owned state.
    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> anyhow::Result<()>;

    /// Changes the current working directory.
    fn changepwd(&mut self, path: &str) -> anyhow::Result<()>;
}

/// Signature every builtin command conforms to.
pub type BuiltinCommand =
    fn(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus;

/// Global registry of builtin commands.
pub static BUILTIN_COMMAND: Lazy<Mutex<HashMap<&str, BuiltinCommand>>> = Lazy::new(|| {
    let mut builtin = HashMap::new();

    builtin.insert("exit", exit as BuiltinCommand);
    builtin.insert("cd", cd::command as BuiltinCommand);

    // job control
    builtin.insert("jobs", jobs::command as BuiltinCommand);
    builtin.insert("fg", fg::command as BuiltinCommand);
    builtin.insert("bg", bg::command as BuiltinCommand);
    builtin.insert("stop", stop::command as BuiltinCommand);

    Mutex::new(builtin)
});

/// Looks up a builtin by name.
pub fn get_command(name: &str) -> Option<BuiltinCommand> {
    BUILTIN_COMMAND
        .lock()
        .ok()
        .and_then(|map| map.get(name).copied())
}

fn exit(_ctx: &Context, _argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    proxy.exit_shell();
    ExitStatus::ExitedWith(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_the_job_control_builtins() {
        for name in ["exit", "cd", "jobs", "fg", "bg", "stop"] {
            assert!(get_command(name).is_some(), "missing builtin: {name}");
        }
        assert!(get_command("ls").is_none());
    }
}
