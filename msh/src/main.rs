use anyhow::Result;
use clap::Parser;
use msh::repl::Repl;
use msh::shell::Shell;
use msh_types::Context;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Evaluate a single command line and exit
    #[arg(short, long)]
    command: Option<String>,
}

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("msh: failed to initialize tracing: {err}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    let mut shell = Shell::new();
    let mut ctx = Context::new(shell.pid, true);
    shell.set_signals();

    if let Some(command) = cli.command.as_deref() {
        execute_command(&mut shell, &mut ctx, command)
    } else {
        run_interactive(&mut shell, &mut ctx)
    }
}

/// Diagnostics go to a log file, never the terminal; enabled by setting
/// `MSH_LOG` to a tracing filter (e.g. `MSH_LOG=debug`).
fn init_tracing() -> Result<()> {
    if std::env::var_os("MSH_LOG").is_none() {
        return Ok(());
    }
    let log_file = std::sync::Arc::new(std::fs::File::create("./msh.log")?);
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("MSH_LOG"))
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .init();
    Ok(())
}

fn execute_command(shell: &mut Shell, ctx: &mut Context, command: &str) -> ExitCode {
    debug!("command mode: {:?}", command);
    match shell.eval_str(ctx, command.to_string()) {
        Ok(status) => {
            debug!("command mode result: {:?}", status);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("msh: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_interactive(shell: &mut Shell, ctx: &mut Context) -> ExitCode {
    debug!("interactive mode");
    let mut repl = Repl::new(shell);
    match repl.run_interactive(ctx) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("msh: {err}");
            ExitCode::FAILURE
        }
    }
}
