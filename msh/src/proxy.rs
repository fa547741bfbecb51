//! `ShellProxy` implementation: the bridge the builtin commands use to
//! reach the shell's job-control state.

use crate::shell::Shell;
use anyhow::{Result, anyhow};
use msh_builtin::ShellProxy;
use msh_types::Context;
use tabled::{Table, Tabled};
use tracing::debug;

#[derive(Tabled)]
struct JobRow {
    job: u32,
    pid: i32,
    state: String,
    command: String,
}

/// Parses a job specification (`"%1"` or `"1"`) into a job id.
fn parse_job_spec(spec: &str) -> Option<u32> {
    let spec = spec.trim();
    let digits = spec.strip_prefix('%').unwrap_or(spec);
    digits.parse::<u32>().ok()
}

fn job_id_arg(name: &str, argv: &[String]) -> Result<u32> {
    let spec = argv
        .get(1)
        .ok_or_else(|| anyhow!("usage: {name} %job"))?;
    parse_job_spec(spec).ok_or_else(|| anyhow!("invalid job specification: {spec}"))
}

impl ShellProxy for Shell {
    fn exit_shell(&mut self) {
        self.exit();
    }

    fn changepwd(&mut self, path: &str) -> Result<()> {
        std::env::set_current_dir(path)?;
        Ok(())
    }

    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()> {
        match cmd {
            "jobs" => {
                let snapshot = self.jobs.registry().snapshot();
                if snapshot.is_empty() {
                    ctx.write_stdout("jobs: there are no jobs")?;
                } else {
                    let rows: Vec<JobRow> = snapshot
                        .iter()
                        .map(|job| JobRow {
                            job: job.job_id,
                            pid: job.pid.as_raw(),
                            state: format!("{}", job.state),
                            command: job.cmd.clone(),
                        })
                        .collect();
                    let table = Table::new(rows).to_string();
                    ctx.write_stdout(table.as_str())?;
                }
            }
            "fg" => {
                let job_id = job_id_arg("fg", &argv)?;
                let pid = self.jobs.fg_job(job_id)?;
                debug!("fg job {} pid {}", job_id, pid);
                self.wait_foreground()?;
            }
            "bg" => {
                let job_id = job_id_arg("bg", &argv)?;
                self.jobs.bg_job(job_id)?;
            }
            "stop" => {
                let job_id = job_id_arg("stop", &argv)?;
                self.jobs.stop_job(job_id)?;
            }
            _ => {
                return Err(anyhow!("unknown command: {cmd}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    #[test]
    fn job_specs_accept_percent_prefix() {
        init();
        assert_eq!(parse_job_spec("%3"), Some(3));
        assert_eq!(parse_job_spec("3"), Some(3));
        assert_eq!(parse_job_spec(" %12 "), Some(12));
        assert_eq!(parse_job_spec("abc"), None);
        assert_eq!(parse_job_spec("%"), None);
    }

    #[test]
    fn fg_without_argument_is_an_error() {
        init();
        let mut shell = Shell::new();
        let ctx = Context::new(shell.pid, true);
        let err = shell.dispatch(&ctx, "fg", vec!["fg".to_string()]).unwrap_err();
        assert!(err.to_string().contains("usage"));
        assert_eq!(shell.jobs.foreground_pid(), None);
    }

    #[test]
    fn fg_unknown_job_reports_and_changes_nothing() {
        init();
        let mut shell = Shell::new();
        let ctx = Context::new(shell.pid, true);
        let err = shell
            .dispatch(&ctx, "fg", vec!["fg".to_string(), "%9".to_string()])
            .unwrap_err();
        assert_eq!(err.to_string(), "no such job: %9");
        assert_eq!(shell.jobs.foreground_pid(), None);
        assert!(shell.jobs.registry().is_empty());
    }
}
