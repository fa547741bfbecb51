/// Lifecycle state of a tracked job.
///
/// `Foreground` marks the entry the shell is currently waiting on after
/// `fg`; termination is implicit, a terminated job is removed from the
/// registry rather than kept in a dead state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobState {
    Background,
    Foreground,
    Suspended,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JobState::Background => formatter.write_str("Background"),
            JobState::Foreground => formatter.write_str("Foreground"),
            JobState::Suspended => formatter.write_str("Suspended"),
        }
    }
}
