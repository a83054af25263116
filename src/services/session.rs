use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Detected,
    TimedOut,
    Cancelled,
}

/// Lifecycle of a delivery session. The only transition is
/// `Running -> Stopped`, taken once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped(StopReason),
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }
}

/// Shared between a session's worker task and the caller's handle.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Moves to `Stopped(reason)`. Returns false if the session had already
    /// stopped, in which case nothing changes.
    pub fn finish(&self, reason: StopReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_running() {
                *current = SessionState::Stopped(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves once the session has stopped.
    pub async fn stopped(&self) -> StopReason {
        let mut rx = self.watch();
        loop {
            if let SessionState::Stopped(reason) = *rx.borrow_and_update() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return StopReason::Cancelled;
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_transition_wins() {
        let session = Session::new();
        assert!(session.state().is_running());

        assert!(session.finish(StopReason::Detected));
        assert!(!session.finish(StopReason::TimedOut));
        assert!(!session.finish(StopReason::Cancelled));
        assert_eq!(session.state(), SessionState::Stopped(StopReason::Detected));
    }

    #[tokio::test]
    async fn stopped_resolves_after_finish() {
        let session = Session::new();
        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.stopped().await })
        };

        session.finish(StopReason::Cancelled);
        assert_eq!(waiter.await.unwrap(), StopReason::Cancelled);
        assert_eq!(session.stopped().await, StopReason::Cancelled);
    }
}
