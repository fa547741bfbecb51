pub mod fork;
pub mod job;
pub mod redirect;
pub mod registry;
pub mod signal;
pub mod state;
pub mod wait;

pub use job::{JobControl, JobEvent};
pub use redirect::Redirect;
pub use registry::{DEFAULT_JOB_CAPACITY, Job, JobError, JobRegistry};
pub use signal::{NixSignaler, ProcessSignaler};
pub use state::JobState;
pub use wait::StatusChange;
