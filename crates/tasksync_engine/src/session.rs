//! Session collaborator and lifecycle events.

use parking_lot::RwLock;

/// Tells the engine who is signed in.
pub trait SessionProvider: Send + Sync {
    /// The signed-in user's id, if any.
    fn current_user(&self) -> Option<String>;
}

/// A session whose user is set by hand.
#[derive(Debug, Default)]
pub struct StaticSession {
    user: RwLock<Option<String>>,
}

impl StaticSession {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session signed in as `user`.
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(user.into())),
        }
    }

    /// Signs in as `user`.
    pub fn sign_in(&self, user: impl Into<String>) {
        *self.user.write() = Some(user.into());
    }

    /// Signs out.
    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<String> {
        self.user.read().clone()
    }
}

/// Triggers delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A user became authenticated.
    SessionStarted(String),
    /// The user signed out.
    SessionEnded,
    /// Connectivity came back.
    NetworkRestored,
    /// Connectivity was lost.
    NetworkLost,
    /// A delayed re-drain after retryable failures is due.
    RetryDue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_session_switches_user() {
        let session = StaticSession::new();
        assert_eq!(session.current_user(), None);

        session.sign_in("u1");
        assert_eq!(session.current_user().as_deref(), Some("u1"));

        session.sign_out();
        assert_eq!(session.current_user(), None);
        assert_eq!(
            StaticSession::signed_in("u2").current_user().as_deref(),
            Some("u2")
        );
    }
}
