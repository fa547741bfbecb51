//! The job table.
//!
//! An ordered collection of tracked processes keyed both by process id and
//! by job id. Job ids are issued strictly increasing over the registry's
//! lifetime and never reused; removals compact the table while preserving
//! the relative order of the surviving entries.

use nix::unistd::Pid;
use thiserror::Error;
use tracing::debug;

use super::state::JobState;

/// Upper bound on live entries, kept as an explicit configured limit
/// rather than a hard array bound.
pub const DEFAULT_JOB_CAPACITY: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("no such process: {0}")]
    UnknownProcess(Pid),

    #[error("no such job: %{0}")]
    UnknownJob(u32),

    #[error("job table is full ({0} jobs)")]
    CapacityExceeded(usize),
}

/// One tracked process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: u32,
    pub pid: Pid,
    pub state: JobState,
    pub cmd: String,
}

#[derive(Debug)]
pub struct JobRegistry {
    jobs: Vec<Job>,
    max_id: u32,
    capacity: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_CAPACITY)
    }
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        JobRegistry {
            jobs: Vec::new(),
            max_id: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.jobs.iter().any(|job| job.pid == pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.pid == pid)
    }

    /// Tracks a new process and returns its job id. The next id is derived
    /// from the maximum ever issued, not the live count, so ids survive
    /// removals without being reused.
    pub fn add_job(&mut self, pid: Pid, cmd: &str, state: JobState) -> Result<u32, JobError> {
        if self.jobs.len() >= self.capacity {
            return Err(JobError::CapacityExceeded(self.capacity));
        }
        self.max_id += 1;
        let job_id = self.max_id;
        debug!("add_job id:{} pid:{} state:{} cmd:{:?}", job_id, pid, state, cmd);
        self.jobs.push(Job {
            job_id,
            pid,
            state,
            cmd: cmd.to_string(),
        });
        Ok(job_id)
    }

    /// Removes the entry for `pid`, preserving the relative order of the
    /// remaining entries.
    pub fn remove_job(&mut self, pid: Pid) -> Result<Job, JobError> {
        let index = self
            .jobs
            .iter()
            .position(|job| job.pid == pid)
            .ok_or(JobError::UnknownProcess(pid))?;
        let job = self.jobs.remove(index);
        debug!("remove_job id:{} pid:{}", job.job_id, job.pid);
        Ok(job)
    }

    /// Overwrites the state of the entry for `pid` in place; job id and pid
    /// are unchanged.
    pub fn update_state(&mut self, pid: Pid, new_state: JobState) -> Result<(), JobError> {
        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.pid == pid)
            .ok_or(JobError::UnknownProcess(pid))?;
        debug!(
            "update_state id:{} pid:{} {} -> {}",
            job.job_id, job.pid, job.state, new_state
        );
        job.state = new_state;
        Ok(())
    }

    pub fn pid_by_job_id(&self, job_id: u32) -> Result<Pid, JobError> {
        self.jobs
            .iter()
            .find(|job| job.job_id == job_id)
            .map(|job| job.pid)
            .ok_or(JobError::UnknownJob(job_id))
    }

    /// Read-only listing in registry order, for display.
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn job_ids_are_strictly_increasing_and_never_reused() {
        init();
        let mut registry = JobRegistry::new(10);
        let a = registry.add_job(pid(100), "sleep 1 &", JobState::Background).unwrap();
        let b = registry.add_job(pid(101), "sleep 2 &", JobState::Background).unwrap();
        assert!(b > a);

        registry.remove_job(pid(101)).unwrap();
        registry.remove_job(pid(100)).unwrap();
        assert!(registry.is_empty());

        let c = registry.add_job(pid(102), "sleep 3 &", JobState::Background).unwrap();
        assert!(c > b);
    }

    #[test]
    fn remove_preserves_relative_order() {
        init();
        let mut registry = JobRegistry::new(10);
        registry.add_job(pid(1), "a", JobState::Background).unwrap();
        let middle = registry.add_job(pid(2), "b", JobState::Background).unwrap();
        registry.add_job(pid(3), "c", JobState::Background).unwrap();

        registry.remove_job(pid(2)).unwrap();

        let snapshot = registry.snapshot();
        let pids: Vec<i32> = snapshot.iter().map(|job| job.pid.as_raw()).collect();
        assert_eq!(pids, vec![1, 3]);
        assert_eq!(
            registry.pid_by_job_id(middle),
            Err(JobError::UnknownJob(middle))
        );
    }

    #[test]
    fn unknown_process_is_reported() {
        init();
        let mut registry = JobRegistry::new(10);
        assert_eq!(
            registry.remove_job(pid(42)),
            Err(JobError::UnknownProcess(pid(42)))
        );
        assert_eq!(
            registry.update_state(pid(42), JobState::Suspended),
            Err(JobError::UnknownProcess(pid(42)))
        );
    }

    #[test]
    fn capacity_is_enforced() {
        init();
        let mut registry = JobRegistry::new(2);
        registry.add_job(pid(1), "a", JobState::Background).unwrap();
        registry.add_job(pid(2), "b", JobState::Background).unwrap();

        let err = registry.add_job(pid(3), "c", JobState::Background);
        assert_eq!(err, Err(JobError::CapacityExceeded(2)));

        // the failed add leaves the table unchanged
        assert_eq!(registry.len(), 2);
        let pids: Vec<i32> = registry.snapshot().iter().map(|job| job.pid.as_raw()).collect();
        assert_eq!(pids, vec![1, 2]);
    }

    #[test]
    fn update_state_keeps_id_and_pid() {
        init();
        let mut registry = JobRegistry::new(10);
        let id = registry.add_job(pid(7), "vim", JobState::Background).unwrap();

        registry.update_state(pid(7), JobState::Suspended).unwrap();
        registry.update_state(pid(7), JobState::Background).unwrap();

        let job = registry.get(pid(7)).unwrap();
        assert_eq!(job.job_id, id);
        assert_eq!(job.state, JobState::Background);
        assert_eq!(registry.pid_by_job_id(id).unwrap(), pid(7));
    }
}
