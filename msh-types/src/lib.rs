use anyhow::Result;
use libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{isatty, Pid};
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::mem;
use std::os::unix::io::FromRawFd;
use std::os::unix::io::RawFd;
use thiserror::Error;

/// msh specific error types
#[derive(Error, Debug)]
pub enum MshError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("process execution failed: {message}")]
    Process { message: String },

    #[error("{operation} failed on {path}: {source}")]
    File {
        operation: String,
        path: String,
        source: std::io::Error,
    },

    #[error("system call failed: {0}")]
    System(String),
}

pub type MshResult<T> = std::result::Result<T, MshError>;

/// Per-evaluation context handed to the dispatcher and builtin commands.
///
/// Carries the shell's identity and the file descriptors the current
/// command should talk to. Builtins write through the fds recorded here
/// instead of the process-wide stdout/stderr so redirected invocations
/// behave the same as external commands.
#[derive(Clone)]
pub struct Context {
    pub shell_pid: Pid,
    pub foreground: bool,
    pub interactive: bool,
    pub infile: RawFd,
    pub outfile: RawFd,
    pub errfile: RawFd,
}

impl Context {
    pub fn new(shell_pid: Pid, foreground: bool) -> Self {
        let interactive = isatty(STDIN_FILENO).unwrap_or(false);
        Context {
            shell_pid,
            foreground,
            interactive,
            infile: STDIN_FILENO,
            outfile: STDOUT_FILENO,
            errfile: STDERR_FILENO,
        }
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Context")
            .field("shell_pid", &self.shell_pid)
            .field("foreground", &self.foreground)
            .field("interactive", &self.interactive)
            .field("infile", &self.infile)
            .field("outfile", &self.outfile)
            .field("errfile", &self.errfile)
            .finish()
    }
}

impl Context {
    pub fn write_stdout(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.outfile) };
        writeln!(&mut file, "{msg}")?;
        mem::forget(file);
        Ok(())
    }

    pub fn write_stderr(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.errfile) };
        writeln!(&mut file, "{msg}")?;
        mem::forget(file);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.infile = STDIN_FILENO;
        self.outfile = STDOUT_FILENO;
        self.errfile = STDERR_FILENO;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    ExitedWith(i32),
    Running(Pid),
}
