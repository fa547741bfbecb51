//! Whole-line redirections.
//!
//! The parser decides *what* to open; this module performs the opens on
//! behalf of the launched child. Input paths are opened read-only, output
//! paths write-only, created if absent and truncated if present.

use libc::{STDIN_FILENO, STDOUT_FILENO};
use msh_types::{MshError, MshResult};
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};
use std::os::unix::io::RawFd;

use crate::parser::CommandLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Input(String),
    Output(String),
}

impl Redirect {
    /// The redirections a parsed line asks for. Input applies to the first
    /// pipeline stage, output to the last; the caller routes them.
    pub fn input_of(cmdline: &CommandLine) -> Option<Redirect> {
        cmdline.stdin_file.clone().map(Redirect::Input)
    }

    pub fn output_of(cmdline: &CommandLine) -> Option<Redirect> {
        cmdline.stdout_file.clone().map(Redirect::Output)
    }

    fn open_fd(&self) -> MshResult<RawFd> {
        let (path, oflag, mode, operation) = match self {
            Redirect::Input(path) => (path, OFlag::O_RDONLY, Mode::empty(), "open for reading"),
            Redirect::Output(path) => (
                path,
                OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                Mode::from_bits_truncate(0o644),
                "open for writing",
            ),
        };
        open(path.as_str(), oflag, mode).map_err(|e| MshError::File {
            operation: operation.to_string(),
            path: path.clone(),
            source: std::io::Error::from_raw_os_error(e as i32),
        })
    }

    fn target_fd(&self) -> RawFd {
        match self {
            Redirect::Input(_) => STDIN_FILENO,
            Redirect::Output(_) => STDOUT_FILENO,
        }
    }

    /// Opens the file and splices it onto stdin/stdout. Runs in the child
    /// between fork and exec.
    pub(crate) fn apply(&self) -> MshResult<()> {
        let fd = self.open_fd()?;
        dup2(fd, self.target_fd())
            .map_err(|e| MshError::System(format!("dup2 failed: {e}")))?;
        close(fd).map_err(|e| MshError::System(format!("close failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn redirections_come_from_the_parsed_line() {
        let cmdline = parse("sort < data | head > top").unwrap();
        assert_eq!(
            Redirect::input_of(&cmdline),
            Some(Redirect::Input("data".to_string()))
        );
        assert_eq!(
            Redirect::output_of(&cmdline),
            Some(Redirect::Output("top".to_string()))
        );

        let cmdline = parse("ls").unwrap();
        assert_eq!(Redirect::input_of(&cmdline), None);
        assert_eq!(Redirect::output_of(&cmdline), None);
    }

    #[test]
    fn missing_input_file_is_reported() {
        let redirect = Redirect::Input("/nonexistent/msh-test-input".to_string());
        let err = redirect.open_fd().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/msh-test-input"));
    }
}
