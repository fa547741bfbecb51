//! Asynchronous notification channel.
//!
//! Signal handlers run at arbitrary points relative to the main flow, so
//! they are restricted to storing into atomic flags. All registry and
//! foreground-cursor mutation happens later, when the main flow consumes
//! the flags via the `take_*` functions and drains child status changes.

use anyhow::Result;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, kill, sigaction};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

static CHILD_EVENT: AtomicBool = AtomicBool::new(false);
static SUSPEND_REQUEST: AtomicBool = AtomicBool::new(false);
static INTERRUPT_REQUEST: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_: i32) {
    CHILD_EVENT.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigtstp(_: i32) {
    SUSPEND_REQUEST.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigint(_: i32) {
    INTERRUPT_REQUEST.store(true, Ordering::SeqCst);
}

/// Installs the shell's handlers for SIGCHLD, SIGTSTP and SIGINT and makes
/// sure none of them is blocked.
pub(crate) fn install_handlers() -> Result<()> {
    install(Signal::SIGCHLD, handle_sigchld)?;
    install(Signal::SIGTSTP, handle_sigtstp)?;
    install(Signal::SIGINT, handle_sigint)?;
    unblock(&[Signal::SIGCHLD, Signal::SIGTSTP, Signal::SIGINT])?;
    debug!("signal handlers installed");
    Ok(())
}

fn install(signal: Signal, handler: extern "C" fn(i32)) -> Result<()> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(signal, &action)?;
    }
    Ok(())
}

fn unblock(signals: &[Signal]) -> Result<()> {
    let mut set = SigSet::empty();
    for signal in signals {
        set.add(*signal);
    }
    nix::sys::signal::sigprocmask(nix::sys::signal::SigmaskHow::SIG_UNBLOCK, Some(&set), None)?;
    Ok(())
}

/// True when one or more children changed state since the last call.
pub(crate) fn take_child_event() -> bool {
    CHILD_EVENT.swap(false, Ordering::SeqCst)
}

/// True when the user requested the foreground process be suspended.
pub(crate) fn take_suspend_request() -> bool {
    SUSPEND_REQUEST.swap(false, Ordering::SeqCst)
}

/// True when the user requested the foreground process be terminated.
pub(crate) fn take_interrupt_request() -> bool {
    INTERRUPT_REQUEST.swap(false, Ordering::SeqCst)
}

pub(crate) fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    debug!("sending {:?} to pid {}", signal, pid);
    match kill(pid, signal) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("failed to send {:?} to pid {}: {}", signal, pid, e);
            Err(e.into())
        }
    }
}

/// Seam between job control and process signalling. The production
/// implementation sends real signals; tests substitute a recorder.
pub trait ProcessSignaler {
    fn suspend(&self, pid: Pid) -> Result<()>;
    fn resume(&self, pid: Pid) -> Result<()>;
    fn kill(&self, pid: Pid) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NixSignaler;

impl ProcessSignaler for NixSignaler {
    fn suspend(&self, pid: Pid) -> Result<()> {
        send_signal(pid, Signal::SIGSTOP)
    }

    fn resume(&self, pid: Pid) -> Result<()> {
        send_signal(pid, Signal::SIGCONT)
    }

    fn kill(&self, pid: Pid) -> Result<()> {
        send_signal(pid, Signal::SIGKILL)
    }
}
