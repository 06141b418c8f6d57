/// Scrape run states
///
/// The pagination controller moves through these states one step at a time;
/// every step is checked against [`ScrapeState::can_transition_to`].
use std::fmt;

/// Represents the current step of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeState {
    // ===== Active States =====
    /// Run created, login not yet attempted
    Idle,

    /// Navigating to a listing page
    LoadingPage,

    /// Reading thread rows from the loaded listing page
    EnumeratingThreads,

    /// A thread is being visited and extracted
    ProcessingThread,

    /// Navigating back to the listing page after a thread
    ReturningToListing,

    /// No more pages to visit
    Done,

    // ===== Terminal States =====
    /// Run finished normally (possibly stopped early)
    Succeeded,

    /// Run aborted by a fatal error
    Failed,
}

impl ScrapeState {
    /// Returns true if the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    ///
    /// Any active state may fail. Success is only reachable through `Done`.
    pub fn can_transition_to(&self, next: ScrapeState) -> bool {
        use ScrapeState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        matches!(
            (self, next),
            (Idle, LoadingPage)
                | (Idle, Done)
                | (LoadingPage, EnumeratingThreads)
                | (EnumeratingThreads, ProcessingThread)
                | (EnumeratingThreads, LoadingPage)
                | (EnumeratingThreads, Done)
                | (ProcessingThread, ReturningToListing)
                | (ReturningToListing, ProcessingThread)
                | (ReturningToListing, LoadingPage)
                | (ReturningToListing, Done)
                | (Done, Succeeded)
        )
    }

    /// Snake-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingPage => "loading_page",
            Self::EnumeratingThreads => "enumerating_threads",
            Self::ProcessingThread => "processing_thread",
            Self::ReturningToListing => "returning_to_listing",
            Self::Done => "done",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ScrapeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ScrapeState; 8] = [
        ScrapeState::Idle,
        ScrapeState::LoadingPage,
        ScrapeState::EnumeratingThreads,
        ScrapeState::ProcessingThread,
        ScrapeState::ReturningToListing,
        ScrapeState::Done,
        ScrapeState::Succeeded,
        ScrapeState::Failed,
    ];

    #[test]
    fn test_is_terminal() {
        assert!(ScrapeState::Succeeded.is_terminal());
        assert!(ScrapeState::Failed.is_terminal());

        assert!(!ScrapeState::Idle.is_terminal());
        assert!(!ScrapeState::Done.is_terminal());
        assert!(!ScrapeState::ProcessingThread.is_terminal());
    }

    #[test]
    fn test_main_path_is_legal() {
        let path = [
            ScrapeState::Idle,
            ScrapeState::LoadingPage,
            ScrapeState::EnumeratingThreads,
            ScrapeState::ProcessingThread,
            ScrapeState::ReturningToListing,
            ScrapeState::ProcessingThread,
            ScrapeState::ReturningToListing,
            ScrapeState::LoadingPage,
            ScrapeState::EnumeratingThreads,
            ScrapeState::Done,
            ScrapeState::Succeeded,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_illegal_transitions() {
        // Threads are only processed from an enumerated page
        assert!(!ScrapeState::LoadingPage.can_transition_to(ScrapeState::ProcessingThread));
        // The listing page must be restored after every thread
        assert!(!ScrapeState::ProcessingThread.can_transition_to(ScrapeState::ProcessingThread));
        assert!(!ScrapeState::ProcessingThread.can_transition_to(ScrapeState::LoadingPage));
        // Success only through Done
        assert!(!ScrapeState::EnumeratingThreads.can_transition_to(ScrapeState::Succeeded));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for state in ALL {
            assert!(!ScrapeState::Succeeded.can_transition_to(state));
            assert!(!ScrapeState::Failed.can_transition_to(state));
        }
    }

    #[test]
    fn test_any_active_state_can_fail() {
        for state in ALL {
            if !state.is_terminal() {
                assert!(state.can_transition_to(ScrapeState::Failed));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ScrapeState::ReturningToListing.to_string(), "returning_to_listing");
        assert_eq!(ScrapeState::Succeeded.to_string(), "succeeded");
    }
}
