/// Session state definitions for the crawl lifecycle
///
/// A session moves strictly forward: `NotStarted -> Running -> Completed`.
use std::fmt;

/// Represents the lifecycle state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Session has been created but `run` has not been called
    #[default]
    NotStarted,

    /// Workers are fetching pages
    Running,

    /// All workers have exited; results are final
    Completed,
}

impl SessionState {
    /// Returns true if moving from this state to `next` is allowed
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running) | (Self::Running, Self::Completed)
        )
    }

    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns the state's lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
