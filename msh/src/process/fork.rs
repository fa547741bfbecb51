//! Process creation.
//!
//! Forks one pipeline stage and execs it in the child. The child resets
//! the job-control signal dispositions the shell overrides for itself,
//! wires up its pipe ends and redirection files, then `execvp`s so the
//! program name is resolved through `PATH`.

use anyhow::{Context as _, Result};
use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::{ForkResult, Pid, close, dup2, execvp, fork};
use std::ffi::CString;
use std::os::unix::io::RawFd;
use tracing::debug;

use super::redirect::Redirect;
use crate::parser::Command;

/// Restore default dispositions in the child (the shell itself diverts
/// these into its notification flags).
fn reset_signals() -> Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTIN,
        Signal::SIGTTOU,
        Signal::SIGCHLD,
    ] {
        unsafe {
            sigaction(signal, &action)
                .map_err(|e| anyhow::anyhow!("failed to reset {:?} handler: {}", signal, e))?;
        }
    }
    Ok(())
}

fn exec_stage(
    command: &Command,
    stdin: RawFd,
    stdout: RawFd,
    redirects: &[Redirect],
    close_fds: &[RawFd],
) -> Result<()> {
    reset_signals()?;

    if stdin != STDIN_FILENO {
        dup2(stdin, STDIN_FILENO).context("failed dup2 stdin")?;
    }
    if stdout != STDOUT_FILENO {
        dup2(stdout, STDOUT_FILENO).context("failed dup2 stdout")?;
    }
    for fd in close_fds {
        close(*fd).ok();
    }
    for redirect in redirects {
        redirect.apply()?;
    }

    let argv: Result<Vec<CString>> = command
        .argv()
        .iter()
        .map(|a| CString::new(a.as_str()).context("argument contains NUL"))
        .collect();
    let argv = argv?;
    let name = CString::new(command.name()).context("command name contains NUL")?;

    debug!("execvp {:?} argv {:?}", name, argv);
    execvp(&name, &argv).with_context(|| format!("{}: command not found", command.name()))?;
    Ok(())
}

/// Forks one stage of a pipeline.
///
/// `stdin`/`stdout` are the pipe ends this stage reads and writes (the
/// standard descriptors when it sits at the corresponding edge of the
/// pipeline); `redirects` are the file redirections that apply to this
/// stage; `close_fds` are the remaining pipe fds the child must not
/// inherit open. The parent returns the child's pid and must tolerate the
/// exec failing afterwards — in that case the child exits 127 and the
/// reaper observes a plain exit.
pub(crate) fn fork_command(
    command: &Command,
    stdin: RawFd,
    stdout: RawFd,
    redirects: &[Redirect],
    close_fds: &[RawFd],
) -> Result<Pid> {
    debug!(
        "fork_command {:?} stdin:{} stdout:{}",
        command.name(),
        stdin,
        stdout
    );
    let pid = unsafe { fork().context("failed fork")? };

    match pid {
        ForkResult::Parent { child } => {
            debug!("forked {:?} as pid {}", command.name(), child);
            Ok(child)
        }
        ForkResult::Child => {
            // on any failure the child must exit, never unwind back into
            // the shell's main loop
            if let Err(e) = exec_stage(command, stdin, stdout, redirects, close_fds) {
                eprintln!("msh: {e}");
            }
            std::process::exit(127);
        }
    }
}
