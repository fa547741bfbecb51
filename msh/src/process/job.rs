//! The job control engine.
//!
//! [`JobControl`] owns the job registry and the foreground cursor and is
//! the only place that mutates them. User-issued operations (`stop`, `bg`,
//! `fg`) and the reaper's status-change transitions both funnel through
//! here, always from the main flow; asynchronous signal context never
//! touches this state (see `signal.rs`).

use nix::unistd::Pid;
use tracing::{debug, warn};

use super::registry::{DEFAULT_JOB_CAPACITY, Job, JobError, JobRegistry};
use super::signal::{NixSignaler, ProcessSignaler};
use super::state::JobState;
use super::wait::{StatusChange, wait_any_nohang};

/// The process the shell is synchronously waiting on, if any. Not
/// necessarily a registry entry; it only becomes one when suspended.
#[derive(Debug, Clone)]
struct Foreground {
    pid: Pid,
    cmd: String,
}

/// A registry transition worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The job terminated (exit or fatal signal) and left the table.
    Done(Job),
    /// The job is now suspended (including a foreground process demoted
    /// into the table by a stop).
    Suspended(Job),
    /// The job resumed running in the background.
    Resumed(Job),
}

pub struct JobControl {
    registry: JobRegistry,
    foreground: Option<Foreground>,
    signaler: Box<dyn ProcessSignaler>,
}

impl std::fmt::Debug for JobControl {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("JobControl")
            .field("registry", &self.registry)
            .field("foreground", &self.foreground)
            .finish()
    }
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_CAPACITY, Box::new(NixSignaler))
    }
}

impl JobControl {
    pub fn new(capacity: usize, signaler: Box<dyn ProcessSignaler>) -> Self {
        JobControl {
            registry: JobRegistry::new(capacity),
            foreground: None,
            signaler,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn foreground_pid(&self) -> Option<Pid> {
        self.foreground.as_ref().map(|fg| fg.pid)
    }

    /// Marks the process the shell is about to wait on.
    pub fn set_foreground(&mut self, pid: Pid, cmd: &str) {
        debug!("foreground cursor -> pid {}", pid);
        self.foreground = Some(Foreground {
            pid,
            cmd: cmd.to_string(),
        });
    }

    pub fn clear_foreground(&mut self) {
        if let Some(fg) = self.foreground.take() {
            debug!("foreground cursor cleared (was pid {})", fg.pid);
        }
    }

    /// Tracks a freshly launched backgrounded process.
    pub fn register_background(&mut self, pid: Pid, cmd: &str) -> Result<u32, JobError> {
        self.registry.add_job(pid, cmd, JobState::Background)
    }

    /// `stop N`: requests the process suspend and records the new state.
    pub fn stop_job(&mut self, job_id: u32) -> Result<(), JobError> {
        let pid = self.registry.pid_by_job_id(job_id)?;
        if let Err(e) = self.signaler.suspend(pid) {
            warn!("stop: failed to suspend pid {}: {}", pid, e);
        }
        self.registry.update_state(pid, JobState::Suspended)
    }

    /// `bg N`: requests the process continue and records the new state.
    pub fn bg_job(&mut self, job_id: u32) -> Result<(), JobError> {
        let pid = self.registry.pid_by_job_id(job_id)?;
        if let Err(e) = self.signaler.resume(pid) {
            warn!("bg: failed to resume pid {}: {}", pid, e);
        }
        self.registry.update_state(pid, JobState::Background)
    }

    /// `fg N`: promotes the job to foreground, resumes it and returns its
    /// pid. The caller must then block on that pid until it terminates or
    /// is suspended. On `UnknownJob` neither the cursor nor the registry
    /// is touched.
    pub fn fg_job(&mut self, job_id: u32) -> Result<Pid, JobError> {
        let pid = self.registry.pid_by_job_id(job_id)?;
        self.registry.update_state(pid, JobState::Foreground)?;
        if let Err(e) = self.signaler.resume(pid) {
            warn!("fg: failed to resume pid {}: {}", pid, e);
        }
        let cmd = self
            .registry
            .get(pid)
            .map(|job| job.cmd.clone())
            .unwrap_or_default();
        self.set_foreground(pid, &cmd);
        Ok(pid)
    }

    /// User suspend request (Ctrl-Z). Acts only on the foreground cursor;
    /// a no-op, not an error, when nothing runs in the foreground. The
    /// resulting stop notification is what actually registers the job.
    pub fn suspend_foreground(&mut self) {
        if let Some(pid) = self.foreground_pid() {
            debug!("suspend request for foreground pid {}", pid);
            if let Err(e) = self.signaler.suspend(pid) {
                warn!("failed to suspend foreground pid {}: {}", pid, e);
            }
        }
    }

    /// User terminate request (Ctrl-C). Acts only on the foreground
    /// cursor; the exit notification removes any registry trace.
    pub fn terminate_foreground(&mut self) {
        if let Some(pid) = self.foreground_pid() {
            debug!("terminate request for foreground pid {}", pid);
            if let Err(e) = self.signaler.kill(pid) {
                warn!("failed to kill foreground pid {}: {}", pid, e);
            }
        }
    }

    /// Applies one status-change notification to the registry and the
    /// foreground cursor. Idempotent for termination: a pid that already
    /// left the table produces no event.
    pub fn apply(&mut self, change: StatusChange) -> Option<JobEvent> {
        debug!("apply {:?}", change);
        match change {
            StatusChange::Exited(pid, _) | StatusChange::Signaled(pid, _) => {
                if self.foreground_pid() == Some(pid) {
                    self.clear_foreground();
                }
                self.registry.remove_job(pid).ok().map(JobEvent::Done)
            }
            StatusChange::Stopped(pid, _) => {
                if self.registry.contains(pid) {
                    if self.foreground_pid() == Some(pid) {
                        self.clear_foreground();
                    }
                    // resolution can't fail, the entry was just found
                    self.registry.update_state(pid, JobState::Suspended).ok()?;
                    self.registry.get(pid).cloned().map(JobEvent::Suspended)
                } else if self.foreground_pid() == Some(pid) {
                    // demote the foreground process into the table
                    let fg = self.foreground.take()?;
                    match self.registry.add_job(fg.pid, &fg.cmd, JobState::Suspended) {
                        Ok(_) => self.registry.get(pid).cloned().map(JobEvent::Suspended),
                        Err(e) => {
                            warn!("cannot track suspended pid {}: {}", pid, e);
                            None
                        }
                    }
                } else {
                    None
                }
            }
            StatusChange::Continued(pid) => {
                // continuation implies prior tracking; an untracked pid is
                // not created here
                if self.registry.contains(pid) {
                    self.registry.update_state(pid, JobState::Background).ok()?;
                    self.registry.get(pid).cloned().map(JobEvent::Resumed)
                } else {
                    None
                }
            }
        }
    }

    /// Processes every currently pending child status change, not just
    /// one, so notifications never back up between prompt iterations.
    pub fn drain(&mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Some(change) = wait_any_nohang() {
            if let Some(event) = self.apply(change) {
                events.push(event);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use nix::sys::signal::Signal;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Suspend(Pid),
        Resume(Pid),
        Kill(Pid),
    }

    /// Records requested signals instead of delivering them.
    #[derive(Default)]
    struct RecordingSignaler {
        sent: Rc<RefCell<Vec<Sent>>>,
    }

    impl ProcessSignaler for RecordingSignaler {
        fn suspend(&self, pid: Pid) -> Result<()> {
            self.sent.borrow_mut().push(Sent::Suspend(pid));
            Ok(())
        }

        fn resume(&self, pid: Pid) -> Result<()> {
            self.sent.borrow_mut().push(Sent::Resume(pid));
            Ok(())
        }

        fn kill(&self, pid: Pid) -> Result<()> {
            self.sent.borrow_mut().push(Sent::Kill(pid));
            Ok(())
        }
    }

    fn control() -> (JobControl, Rc<RefCell<Vec<Sent>>>) {
        let signaler = RecordingSignaler::default();
        let sent = Rc::clone(&signaler.sent);
        (JobControl::new(8, Box::new(signaler)), sent)
    }

    #[test]
    fn stop_then_bg_cycles_state() {
        init();
        let (mut control, sent) = control();
        let id = control.register_background(pid(100), "sleep 60 &").unwrap();
        assert_eq!(control.registry().get(pid(100)).unwrap().state, JobState::Background);

        control.stop_job(id).unwrap();
        assert_eq!(control.registry().get(pid(100)).unwrap().state, JobState::Suspended);

        control.bg_job(id).unwrap();
        let job = control.registry().get(pid(100)).unwrap();
        assert_eq!(job.state, JobState::Background);
        assert_eq!(job.job_id, id);

        assert_eq!(
            *sent.borrow(),
            vec![Sent::Suspend(pid(100)), Sent::Resume(pid(100))]
        );
    }

    #[test]
    fn fg_promotes_and_sets_cursor() {
        init();
        let (mut control, sent) = control();
        let id = control.register_background(pid(200), "vim notes.txt").unwrap();

        let resolved = control.fg_job(id).unwrap();
        assert_eq!(resolved, pid(200));
        assert_eq!(control.foreground_pid(), Some(pid(200)));
        assert_eq!(control.registry().get(pid(200)).unwrap().state, JobState::Foreground);
        assert_eq!(*sent.borrow(), vec![Sent::Resume(pid(200))]);
    }

    #[test]
    fn fg_unknown_job_changes_nothing() {
        init();
        let (mut control, sent) = control();
        control.register_background(pid(300), "sleep 5 &").unwrap();

        assert_eq!(control.fg_job(99), Err(JobError::UnknownJob(99)));
        assert_eq!(control.foreground_pid(), None);
        assert_eq!(control.registry().len(), 1);
        assert_eq!(control.registry().get(pid(300)).unwrap().state, JobState::Background);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn exit_notification_removes_job_exactly_once() {
        init();
        let (mut control, _) = control();
        control.register_background(pid(400), "sleep 1 &").unwrap();

        let event = control.apply(StatusChange::Exited(pid(400), 0));
        assert!(matches!(event, Some(JobEvent::Done(ref job)) if job.pid == pid(400)));
        assert!(control.registry().is_empty());

        // a second drain observing nothing new is a no-op
        assert_eq!(control.apply(StatusChange::Exited(pid(400), 0)), None);
        assert!(control.registry().is_empty());
    }

    #[test]
    fn fatal_signal_clears_foreground_cursor() {
        init();
        let (mut control, _) = control();
        control.set_foreground(pid(500), "cat");

        let event = control.apply(StatusChange::Signaled(pid(500), Signal::SIGKILL));
        // the foreground process was never registered, so there is no
        // table entry to report
        assert_eq!(event, None);
        assert_eq!(control.foreground_pid(), None);
    }

    #[test]
    fn stop_of_foreground_registers_suspended_job() {
        init();
        let (mut control, _) = control();
        control.set_foreground(pid(600), "vim notes.txt");

        let event = control.apply(StatusChange::Stopped(pid(600), Signal::SIGTSTP));
        match event {
            Some(JobEvent::Suspended(job)) => {
                assert_eq!(job.pid, pid(600));
                assert_eq!(job.state, JobState::Suspended);
                assert_eq!(job.cmd, "vim notes.txt");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(control.foreground_pid(), None);
        assert_eq!(control.registry().len(), 1);
    }

    #[test]
    fn stop_of_tracked_job_updates_in_place() {
        init();
        let (mut control, _) = control();
        let id = control.register_background(pid(700), "sleep 60 &").unwrap();

        let event = control.apply(StatusChange::Stopped(pid(700), Signal::SIGSTOP));
        assert!(matches!(event, Some(JobEvent::Suspended(ref job)) if job.job_id == id));
        assert_eq!(control.registry().len(), 1);
    }

    #[test]
    fn continued_untracked_pid_is_ignored() {
        init();
        let (mut control, _) = control();
        assert_eq!(control.apply(StatusChange::Continued(pid(800))), None);
        assert!(control.registry().is_empty());

        let id = control.register_background(pid(801), "sleep 60 &").unwrap();
        control.stop_job(id).unwrap();
        let event = control.apply(StatusChange::Continued(pid(801)));
        assert!(matches!(event, Some(JobEvent::Resumed(ref job)) if job.state == JobState::Background));
    }

    #[test]
    fn interactive_requests_without_foreground_are_noops() {
        init();
        let (mut control, sent) = control();
        control.suspend_foreground();
        control.terminate_foreground();
        assert!(sent.borrow().is_empty());

        control.set_foreground(pid(900), "cat");
        control.suspend_foreground();
        control.terminate_foreground();
        assert_eq!(
            *sent.borrow(),
            vec![Sent::Suspend(pid(900)), Sent::Kill(pid(900))]
        );
    }

    #[test]
    fn capacity_error_surfaces_from_register() {
        init();
        let signaler = RecordingSignaler::default();
        let mut control = JobControl::new(1, Box::new(signaler));
        control.register_background(pid(1), "a &").unwrap();
        assert_eq!(
            control.register_background(pid(2), "b &"),
            Err(JobError::CapacityExceeded(1))
        );
    }
}
