//! The execution dispatcher.
//!
//! Consumes parsed command lines: builtins run in-process through the
//! `msh-builtin` registry, everything else is forked. Pipeline stages are
//! connected left to right with pipes; the last stage's pid is the one
//! the shell tracks, either as the foreground process it waits on or as a
//! background job in the registry.

use anyhow::{Context as _, Result};
use libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{Pid, close, getpid, pipe};
use std::os::unix::io::RawFd;
use tracing::{debug, warn};

use crate::parser::{self, CommandLine};
use crate::process::fork::fork_command;
use crate::process::{JobControl, JobEvent, Redirect, signal, wait};
use msh_types::{Context, ExitStatus};

pub struct Shell {
    pub pid: Pid,
    pub jobs: JobControl,
    exited: Option<ExitStatus>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            pid: getpid(),
            jobs: JobControl::default(),
            exited: None,
        }
    }

    pub fn set_signals(&mut self) {
        if let Err(e) = signal::install_handlers() {
            warn!("failed to install signal handlers: {}", e);
        }
    }

    pub fn exit(&mut self) {
        debug!("shell exit requested");
        self.exited = Some(ExitStatus::ExitedWith(0));
    }

    pub fn is_exited(&self) -> bool {
        self.exited.is_some()
    }

    pub fn print_error(&self, msg: String) {
        eprintln!("msh: {msg}");
    }

    /// Evaluates one input line. Parse errors are reported and recovered;
    /// an empty line triggers no action.
    pub fn eval_str(&mut self, ctx: &mut Context, input: String) -> Result<ExitStatus> {
        let cmdline = match parser::parse(&input) {
            Ok(cmdline) => cmdline,
            Err(err) => {
                self.print_error(err.to_string());
                return Ok(ExitStatus::ExitedWith(2));
            }
        };
        if cmdline.is_empty() {
            return Ok(ExitStatus::ExitedWith(0));
        }

        if cmdline.pipeline.len() == 1 && !cmdline.background {
            let name = cmdline.pipeline[0].name().to_string();
            if let Some(cmd_fn) = msh_builtin::get_command(&name) {
                debug!("builtin {:?}", name);
                let argv = cmdline.pipeline[0].argv().to_vec();
                return Ok(cmd_fn(ctx, argv, self));
            }
        }

        self.launch(ctx, &cmdline, input.trim())
    }

    /// Forks the pipeline and either waits on it or registers it as a
    /// background job.
    fn launch(&mut self, _ctx: &mut Context, cmdline: &CommandLine, input: &str) -> Result<ExitStatus> {
        let stages = &cmdline.pipeline;
        let mut pipes: Vec<(RawFd, RawFd)> = Vec::new();
        for _ in 1..stages.len() {
            pipes.push(pipe().context("failed pipe")?);
        }
        let pipe_fds: Vec<RawFd> = pipes.iter().flat_map(|(r, w)| [*r, *w]).collect();

        let input_redirect = Redirect::input_of(cmdline);
        let output_redirect = Redirect::output_of(cmdline);

        let mut last_pid: Option<Pid> = None;
        for (i, command) in stages.iter().enumerate() {
            let stdin = if i == 0 { STDIN_FILENO } else { pipes[i - 1].0 };
            let stdout = if i == stages.len() - 1 {
                STDOUT_FILENO
            } else {
                pipes[i].1
            };

            let mut redirects = Vec::new();
            if i == 0 {
                if let Some(redirect) = &input_redirect {
                    redirects.push(redirect.clone());
                }
            }
            if i == stages.len() - 1 {
                if let Some(redirect) = &output_redirect {
                    redirects.push(redirect.clone());
                }
            }

            let pid = fork_command(command, stdin, stdout, &redirects, &pipe_fds)?;
            last_pid = Some(pid);
        }
        for fd in &pipe_fds {
            close(*fd).ok();
        }

        // stages is non-empty here, the empty line returned early
        let pid = match last_pid {
            Some(pid) => pid,
            None => return Ok(ExitStatus::ExitedWith(0)),
        };

        if cmdline.background {
            match self.jobs.register_background(pid, input) {
                Ok(job_id) => println!("[{job_id}] {pid}"),
                // the process keeps running, it just is not tracked
                Err(err) => self.print_error(err.to_string()),
            }
            Ok(ExitStatus::Running(pid))
        } else {
            self.jobs.set_foreground(pid, input);
            self.wait_foreground()
        }
    }

    /// Blocks on the foreground process until it terminates or is
    /// suspended. Suspend/terminate requests that arrive while blocked are
    /// serviced here, in main-flow context, before waiting again.
    pub(crate) fn wait_foreground(&mut self) -> Result<ExitStatus> {
        let mut status = ExitStatus::ExitedWith(0);
        while let Some(pid) = self.jobs.foreground_pid() {
            if signal::take_suspend_request() {
                self.jobs.suspend_foreground();
            }
            if signal::take_interrupt_request() {
                self.jobs.terminate_foreground();
            }
            match wait::wait_process(pid) {
                Some(change) => {
                    if let wait::StatusChange::Exited(_, code) = change {
                        status = ExitStatus::ExitedWith(code);
                    }
                    if let Some(JobEvent::Suspended(job)) = self.jobs.apply(change) {
                        println!("\nmsh: job {} '{}' {}", job.job_id, job.cmd, job.state);
                    }
                }
                // interrupted before any status change; loop to service
                // the pending request and wait again
                None => continue,
            }
        }
        Ok(status)
    }

    /// Services the asynchronous notification channel from the main flow:
    /// pending interactive requests first, then a full drain of child
    /// status changes. Called before every prompt iteration.
    pub fn check_job_state(&mut self) -> Vec<JobEvent> {
        if signal::take_suspend_request() {
            self.jobs.suspend_foreground();
        }
        if signal::take_interrupt_request() {
            self.jobs.terminate_foreground();
        }
        if signal::take_child_event() {
            self.jobs.drain()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    #[test]
    fn parse_error_is_recovered() {
        init();
        let mut shell = Shell::new();
        let mut ctx = Context::new(shell.pid, true);
        let status = shell.eval_str(&mut ctx, "a && b".to_string()).unwrap();
        assert_eq!(status, ExitStatus::ExitedWith(2));
        assert!(!shell.is_exited());
    }

    #[test]
    fn empty_line_triggers_no_action() {
        init();
        let mut shell = Shell::new();
        let mut ctx = Context::new(shell.pid, true);
        let status = shell.eval_str(&mut ctx, "   ".to_string()).unwrap();
        assert_eq!(status, ExitStatus::ExitedWith(0));
        assert!(shell.jobs.registry().is_empty());
    }

    #[test]
    fn exit_builtin_marks_shell_exited() {
        init();
        let mut shell = Shell::new();
        let mut ctx = Context::new(shell.pid, true);
        shell.eval_str(&mut ctx, "exit".to_string()).unwrap();
        assert!(shell.is_exited());
    }
}
