use common::{
    AuthError, ChallengeSession, ChallengeState, DeviceIdentity, RegisterDevice, Result,
    SubmitSignature,
};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::VerifierClient;
use crate::crypto::signer;
use crate::vault::KeyVault;

#[derive(Debug, Clone)]
pub enum FlowAction {
    Enroll { device_name: String },
    Login,
}

#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub action: FlowAction,
    pub challenge_id: Option<String>,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Enrolled,
    Authenticated,
    /// No enrollment was requested and no challenge was supplied; nothing
    /// ran and nothing changed.
    Idle,
}

/// The only outward contract of a flow run: an ordered human-readable
/// progress log plus exactly one terminal status.
#[derive(Debug)]
pub struct FlowReport {
    pub log: Vec<String>,
    pub outcome: Result<FlowKind>,
}

/// Decides enrollment vs. login from the entry parameters and runs the
/// chosen sequence exactly once per instance.
///
/// The at-most-once guard is a correctness requirement, not an
/// optimization: a duplicate enrollment would register two identities
/// server-side, and a duplicate signing would consume a single-use
/// challenge twice.
pub struct FlowOrchestrator<V> {
    vault: KeyVault,
    verifier: V,
    has_run: AtomicBool,
}

impl<V: VerifierClient> FlowOrchestrator<V> {
    pub fn new(vault: KeyVault, verifier: V) -> Self {
        Self {
            vault,
            verifier,
            has_run: AtomicBool::new(false),
        }
    }

    /// Runs the flow. Returns `None` on a duplicate trigger: the guard is
    /// set before the sequence starts and never cleared for this instance,
    /// so overlapping trigger events cannot re-enter it.
    pub async fn run(&self, request: FlowRequest) -> Option<FlowReport> {
        if self.has_run.swap(true, Ordering::SeqCst) {
            log::debug!("duplicate flow trigger ignored");
            return None;
        }

        let mut log = Vec::new();
        let nonce = request.nonce.unwrap_or_default();

        let outcome = match request.action {
            FlowAction::Enroll { device_name } => {
                self.enroll(&device_name, request.challenge_id, &nonce, &mut log)
                    .await
            }
            FlowAction::Login => match request.challenge_id {
                Some(challenge_id) => self.login(&challenge_id, &nonce, &mut log).await,
                None => {
                    progress(&mut log, "No challenge supplied; nothing to sign.");
                    Ok(FlowKind::Idle)
                }
            },
        };

        if let Err(e) = &outcome {
            progress(&mut log, format!("Terminal failure: {}", e));
        }
        Some(FlowReport { log, outcome })
    }

    async fn enroll(
        &self,
        device_name: &str,
        challenge_id: Option<String>,
        nonce: &str,
        log: &mut Vec<String>,
    ) -> Result<FlowKind> {
        progress(log, "Generating new key pair...");
        let identity = self.vault.create_identity(device_name)?;
        progress(log, format!("Device ID: {}", identity.device_id));

        progress(log, "Registering with verifier...");
        self.verifier
            .register_device(&RegisterDevice {
                device_id: identity.device_id.clone(),
                public_key: identity.public_key_pem.clone(),
                device_name: identity.device_name.clone(),
            })
            .await?;
        progress(log, "Device registered.");

        match challenge_id {
            Some(challenge_id) => {
                let mut session = ChallengeSession::enroll(challenge_id, nonce.to_string());
                progress(
                    log,
                    format!(
                        "Finalizing enrollment session {}...",
                        short_id(&session.challenge_id)
                    ),
                );
                self.sign_and_submit(&identity, &mut session).await?;
                progress(log, "Session finalized.");
            }
            None => progress(log, "No challenge attached; registration only."),
        }

        progress(log, "Device enrolled.");
        Ok(FlowKind::Enrolled)
    }

    async fn login(
        &self,
        challenge_id: &str,
        nonce: &str,
        log: &mut Vec<String>,
    ) -> Result<FlowKind> {
        let identity = self.vault.load_identity()?.ok_or(AuthError::NotEnrolled)?;

        let mut session = ChallengeSession::login(challenge_id.to_string(), nonce.to_string());
        progress(log, format!("Signing challenge {}...", short_id(challenge_id)));
        self.sign_and_submit(&identity, &mut session).await?;

        progress(log, "Authenticated.");
        Ok(FlowKind::Authenticated)
    }

    /// Signs the session's challenge and submits the signature. The session
    /// moves Pending -> Signed on a successful signature and lands in
    /// Failed on any local or submission error.
    async fn sign_and_submit(
        &self,
        identity: &DeviceIdentity,
        session: &mut ChallengeSession,
    ) -> Result<()> {
        let result = async {
            let signature =
                signer::sign_challenge(identity, &session.challenge_id, &session.nonce)?;
            session.transition(ChallengeState::Signed);

            self.verifier
                .submit_signature(&SubmitSignature {
                    challenge_id: session.challenge_id.clone(),
                    device_id: identity.device_id.clone(),
                    signature,
                })
                .await
        }
        .await;

        if result.is_err() {
            session.transition(ChallengeState::Failed);
        }
        result
    }
}

fn progress(log: &mut Vec<String>, line: impl Into<String>) {
    let line = line.into();
    log::info!("{}", line);
    log.push(line);
}

fn short_id(challenge_id: &str) -> &str {
    challenge_id.get(..8).unwrap_or(challenge_id)
}
