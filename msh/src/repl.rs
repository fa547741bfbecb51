//! The prompt loop.
//!
//! Single-threaded: each iteration first services the asynchronous
//! notification channel (interactive requests and pending child status
//! changes) in main-flow context, then prompts and evaluates one line.

use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::debug;

use crate::process::JobEvent;
use crate::shell::Shell;
use msh_types::Context;

const PROMPT: &str = "msh$ ";

pub struct Repl<'a> {
    pub shell: &'a mut Shell,
}

impl<'a> Repl<'a> {
    pub fn new(shell: &'a mut Shell) -> Self {
        Repl { shell }
    }

    fn print_prompt(&self) {
        let mut out = std::io::stdout().lock();
        write!(out, "{PROMPT}").ok();
        out.flush().ok();
    }

    fn report_events(&self, events: &[JobEvent]) {
        for event in events {
            match event {
                JobEvent::Done(job) => {
                    println!("msh: job {} '{}' done", job.job_id, job.cmd);
                }
                JobEvent::Suspended(job) => {
                    println!("msh: job {} '{}' suspended", job.job_id, job.cmd);
                }
                JobEvent::Resumed(job) => {
                    println!("msh: job {} '{}' continued", job.job_id, job.cmd);
                }
            }
        }
    }

    pub fn run_interactive(&mut self, ctx: &mut Context) -> Result<()> {
        debug!("starting repl");
        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            let events = self.shell.check_job_state();
            self.report_events(&events);

            if self.shell.is_exited() {
                break;
            }

            self.print_prompt();
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if let Err(err) = self.shell.eval_str(ctx, input.to_string()) {
                        eprintln!("msh: {err}");
                    }
                }
                // EOF
                None => break,
            }

            if self.shell.is_exited() {
                break;
            }
        }
        Ok(())
    }
}
