use common::{AuthConfig, ChallengeSession, ChallengeState, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant};

use crate::api::VerifierClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Verified,
    Expired,
}

/// Handle to a running poller. Cancelling (or dropping the handle) stops the
/// interval and the TTL timer together; an in-flight status response is
/// dropped without effect.
pub struct PollerHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Drives a pending `ChallengeSession` by polling the verifier on a fixed
/// interval until the challenge is verified, expires (remotely or via the
/// local session TTL) or the poller is cancelled.
///
/// The observer is notified through a oneshot channel, so notification is
/// at-most-once by construction; after the first terminal observation the
/// task stops and later status responses can never fire again.
pub struct ChallengePoller<V> {
    session: Arc<Mutex<ChallengeSession>>,
    verifier: Arc<V>,
    config: AuthConfig,
}

impl<V> ChallengePoller<V>
where
    V: VerifierClient + 'static,
{
    pub fn new(
        session: Arc<Mutex<ChallengeSession>>,
        verifier: Arc<V>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            session,
            verifier,
            config: config.clone(),
        }
    }

    pub fn start(self) -> (PollerHandle, oneshot::Receiver<PollOutcome>) {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let session = self.session;
        let verifier = self.verifier;
        let poll_interval = self.config.poll_interval;
        let deadline = Instant::now() + self.config.session_ttl;

        let task = tokio::spawn(async move {
            let challenge_id = match session.lock() {
                Ok(session) => session.challenge_id.clone(),
                Err(_) => {
                    log::error!("session lock poisoned before polling started");
                    return;
                }
            };

            log::info!(
                "polling challenge {} every {:?}",
                challenge_id,
                poll_interval
            );

            let mut ticker = interval(poll_interval);
            let outcome = loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = sleep_until(deadline) => {
                        log::warn!("challenge {} hit the local session TTL", challenge_id);
                        break Some(PollOutcome::Expired);
                    }
                    _ = cancel_rx.changed() => break None,
                }

                // the in-flight request races teardown so a cancelled poller
                // can never apply a late response
                let status = tokio::select! {
                    status = verifier.challenge_status(&challenge_id) => status,
                    _ = cancel_rx.changed() => break None,
                };

                match status {
                    Ok(status) => {
                        if status.authenticated || status.is_used {
                            break Some(PollOutcome::Verified);
                        }
                        if status.is_expired {
                            break Some(PollOutcome::Expired);
                        }
                    }
                    Err(e) => {
                        // transient; retry on the next tick
                        log::debug!("status poll for {} failed: {}", challenge_id, e);
                    }
                }
            };

            if let Some(outcome) = outcome {
                let target = match outcome {
                    PollOutcome::Verified => ChallengeState::Verified,
                    PollOutcome::Expired => ChallengeState::Expired,
                };
                match session.lock() {
                    Ok(mut session) => {
                        session.transition(target);
                    }
                    Err(_) => log::error!("session lock poisoned, dropping {:?}", outcome),
                }
                log::info!("challenge {} resolved: {:?}", challenge_id, outcome);
                let _ = outcome_tx.send(outcome);
            }
        });

        (
            PollerHandle {
                cancel: cancel_tx,
                task,
            },
            outcome_rx,
        )
    }
}

/// Asks the verifier for a fresh login challenge and wraps it in a pending
/// session ready for polling. Returns the display payload alongside so the
/// issuing surface can hand it to the authenticator.
pub async fn open_login_session<V: VerifierClient>(
    verifier: &V,
) -> Result<(ChallengeSession, Option<String>)> {
    let issued = verifier.issue_login_challenge().await?;
    log::info!("opened login session {}", issued.challenge_id);
    Ok((
        ChallengeSession::login(issued.challenge_id, issued.nonce),
        issued.auth_url,
    ))
}

/// Enrollment-side counterpart of `open_login_session`.
pub async fn open_enroll_session<V: VerifierClient>(
    verifier: &V,
) -> Result<(ChallengeSession, Option<String>)> {
    let issued = verifier.issue_enroll_challenge().await?;
    log::info!("opened enrollment session {}", issued.challenge_id);
    Ok((
        ChallengeSession::enroll(issued.challenge_id, issued.nonce),
        issued.auth_url,
    ))
}
