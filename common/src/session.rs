use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    Enroll,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeState {
    Pending,
    Signed,
    Verified,
    Expired,
    Failed,
}

impl ChallengeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChallengeState::Verified | ChallengeState::Expired | ChallengeState::Failed
        )
    }
}

/// One enrollment-or-login attempt against a server-issued challenge.
///
/// The state field is private so every mutation goes through `transition`,
/// which rejects anything outside the legal matrix. Terminal states are
/// absorbing: once Verified, Expired or Failed, no further transition is
/// applied and late poll results are simply dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSession {
    pub challenge_id: String,
    pub nonce: String,
    pub kind: ChallengeKind,
    state: ChallengeState,
    pub issued_at: DateTime<Utc>,
}

impl ChallengeSession {
    pub fn login(challenge_id: String, nonce: String) -> Self {
        Self::new(challenge_id, nonce, ChallengeKind::Login)
    }

    pub fn enroll(challenge_id: String, nonce: String) -> Self {
        Self::new(challenge_id, nonce, ChallengeKind::Enroll)
    }

    fn new(challenge_id: String, nonce: String, kind: ChallengeKind) -> Self {
        Self {
            challenge_id,
            nonce,
            kind,
            state: ChallengeState::Pending,
            issued_at: Utc::now(),
        }
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    /// Attempts to move the session to `to`. Returns whether the move was
    /// applied; an illegal move leaves the state untouched.
    pub fn transition(&mut self, to: ChallengeState) -> bool {
        if !Self::allowed(self.state, to) {
            return false;
        }
        self.state = to;
        true
    }

    fn allowed(from: ChallengeState, to: ChallengeState) -> bool {
        use ChallengeState::*;
        matches!(
            (from, to),
            (Pending, Signed)
                | (Pending, Verified)
                | (Pending, Expired)
                | (Pending, Failed)
                | (Signed, Verified)
                | (Signed, Expired)
                | (Signed, Failed)
        )
    }
}
