//! waitpid plumbing.
//!
//! Converts raw `WaitStatus` values into [`StatusChange`] notifications
//! the job control engine consumes. `wait_any_nohang` is the non-blocking
//! step the reaper loops over; `wait_process` is the single blocking
//! operation in the shell, used for the synchronous foreground wait.

use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, error};

/// One process-status notification, as delivered by the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Normal exit with the given status code.
    Exited(Pid, i32),
    /// Killed by a signal.
    Signaled(Pid, Signal),
    /// Suspended by a signal.
    Stopped(Pid, Signal),
    /// Resumed after a stop.
    Continued(Pid),
}

impl StatusChange {
    pub fn pid(&self) -> Pid {
        match self {
            StatusChange::Exited(pid, _)
            | StatusChange::Signaled(pid, _)
            | StatusChange::Stopped(pid, _)
            | StatusChange::Continued(pid) => *pid,
        }
    }
}

fn from_wait_status(status: WaitStatus) -> Option<StatusChange> {
    match status {
        WaitStatus::Exited(pid, code) => Some(StatusChange::Exited(pid, code)),
        WaitStatus::Signaled(pid, signal, _core_dumped) => {
            Some(StatusChange::Signaled(pid, signal))
        }
        WaitStatus::Stopped(pid, signal) => Some(StatusChange::Stopped(pid, signal)),
        WaitStatus::Continued(pid) => Some(StatusChange::Continued(pid)),
        WaitStatus::StillAlive => None,
        status => {
            error!("unexpected waitpid status: {:?}", status);
            None
        }
    }
}

/// One non-blocking poll over all children. Returns `None` once no child
/// has a pending status change; callers loop until then so a single drain
/// observes every pending notification, not just one.
pub fn wait_any_nohang() -> Option<StatusChange> {
    let options = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    match waitpid(Pid::from_raw(-1), Some(options)) {
        Ok(status) => {
            let change = from_wait_status(status);
            if let Some(change) = change {
                debug!("wait_any_nohang: {:?}", change);
            }
            change
        }
        Err(nix::errno::Errno::ECHILD) => None,
        Err(e) => {
            error!("waitpid(-1) failed: {}", e);
            None
        }
    }
}

/// Blocking wait on one specific process until it terminates or stops.
///
/// Returns `None` when the wait was interrupted by a signal before any
/// status change; the caller services pending suspend/terminate requests
/// and waits again. A vanished child (ECHILD) is reported as an exit so
/// the caller never spins on a pid that no longer exists.
pub fn wait_process(pid: Pid) -> Option<StatusChange> {
    match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
        Ok(status) => from_wait_status(status),
        Err(nix::errno::Errno::EINTR) => {
            debug!("wait_process({}) interrupted", pid);
            None
        }
        Err(nix::errno::Errno::ECHILD) => {
            debug!("wait_process({}): no such child, treating as exited", pid);
            Some(StatusChange::Exited(pid, 1))
        }
        Err(e) => {
            error!("waitpid({}) failed: {}", pid, e);
            Some(StatusChange::Exited(pid, 1))
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
    fn status_change_carries_pid() {
        init();
        let pid = Pid::from_raw(1234);
        assert_eq!(StatusChange::Exited(pid, 0).pid(), pid);
        assert_eq!(StatusChange::Signaled(pid, Signal::SIGKILL).pid(), pid);
        assert_eq!(StatusChange::Stopped(pid, Signal::SIGTSTP).pid(), pid);
        assert_eq!(StatusChange::Continued(pid).pid(), pid);
    }

    #[test]
    fn wait_any_without_children_is_none() {
        init();
        // The test harness has no unwaited children of its own; the drain
        // step must report "nothing pending" rather than fail.
        assert_eq!(wait_any_nohang(), None);
    }
}
