use async_trait::async_trait;
use common::{
    AuthError, ChallengeStatus, IssuedChallenge, RegisterDevice, Result, SubmitSignature,
};
use device::crypto::encoding;
use device::{FlowAction, FlowKind, FlowOrchestrator, FlowRequest, KeyVault, VerifierClient};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Clone, Default)]
struct FakeVerifier {
    registers: Arc<Mutex<Vec<RegisterDevice>>>,
    submissions: Arc<Mutex<Vec<SubmitSignature>>>,
    reject_submit: Arc<AtomicBool>,
}

impl FakeVerifier {
    fn register_count(&self) -> usize {
        self.registers.lock().unwrap().len()
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl VerifierClient for FakeVerifier {
    async fn issue_login_challenge(&self) -> Result<IssuedChallenge> {
        Ok(IssuedChallenge {
            challenge_id: "issued-login".to_string(),
            nonce: "issued-nonce".to_string(),
            auth_url: None,
        })
    }

    async fn issue_enroll_challenge(&self) -> Result<IssuedChallenge> {
        Ok(IssuedChallenge {
            challenge_id: "issued-enroll".to_string(),
            nonce: String::new(),
            auth_url: None,
        })
    }

    async fn challenge_status(&self, _challenge_id: &str) -> Result<ChallengeStatus> {
        Ok(ChallengeStatus::default())
    }

    async fn register_device(&self, request: &RegisterDevice) -> Result<()> {
        self.registers.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn submit_signature(&self, request: &SubmitSignature) -> Result<()> {
        if self.reject_submit.load(Ordering::SeqCst) {
            return Err(AuthError::ChallengeAlreadyUsed);
        }
        self.submissions.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn orchestrator(dir: &TempDir, verifier: FakeVerifier) -> FlowOrchestrator<FakeVerifier> {
    FlowOrchestrator::new(KeyVault::new(dir.path()), verifier)
}

fn enroll_request(challenge_id: Option<&str>, nonce: Option<&str>) -> FlowRequest {
    FlowRequest {
        action: FlowAction::Enroll {
            device_name: "Test Device".to_string(),
        },
        challenge_id: challenge_id.map(str::to_string),
        nonce: nonce.map(str::to_string),
    }
}

fn login_request(challenge_id: Option<&str>, nonce: Option<&str>) -> FlowRequest {
    FlowRequest {
        action: FlowAction::Login,
        challenge_id: challenge_id.map(str::to_string),
        nonce: nonce.map(str::to_string),
    }
}

fn assert_signature_verifies(
    public_key_pem: &str,
    signature_base64: &str,
    message: &[u8],
) {
    let encoded = base64::decode(signature_base64).unwrap();
    let raw = encoding::decode(&encoded).unwrap();
    let signature = Signature::from_slice(&raw).unwrap();
    let key = VerifyingKey::from_public_key_pem(public_key_pem).unwrap();
    assert!(key.verify(message, &signature).is_ok());
}

#[tokio::test]
async fn test_enroll_registers_and_persists_identity() {
    let dir = TempDir::new().unwrap();
    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());

    let report = orchestrator.run(enroll_request(None, None)).await.unwrap();

    assert!(matches!(report.outcome, Ok(FlowKind::Enrolled)));
    assert!(!report.log.is_empty());
    assert_eq!(verifier.register_count(), 1);
    assert_eq!(verifier.submission_count(), 0);

    let vault = KeyVault::new(dir.path());
    let identity = vault.load_identity().unwrap().unwrap();
    let registered = verifier.registers.lock().unwrap()[0].clone();
    assert_eq!(registered.device_id, identity.device_id);
    assert_eq!(registered.public_key, identity.public_key_pem);
}

#[tokio::test]
async fn test_enroll_with_challenge_signs_and_submits() {
    let dir = TempDir::new().unwrap();
    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());

    let report = orchestrator
        .run(enroll_request(Some("c1"), Some("n1")))
        .await
        .unwrap();

    assert!(matches!(report.outcome, Ok(FlowKind::Enrolled)));
    assert_eq!(verifier.submission_count(), 1);

    let submitted = verifier.submissions.lock().unwrap()[0].clone();
    let registered = verifier.registers.lock().unwrap()[0].clone();
    assert_eq!(submitted.challenge_id, "c1");
    assert_eq!(submitted.device_id, registered.device_id);
    assert_signature_verifies(&registered.public_key, &submitted.signature, b"c1n1");
}

#[tokio::test]
async fn test_duplicate_trigger_runs_exactly_once() {
    let dir = TempDir::new().unwrap();
    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());

    let request = enroll_request(Some("c1"), Some("n1"));
    let (first, second) = tokio::join!(
        orchestrator.run(request.clone()),
        orchestrator.run(request.clone())
    );

    // exactly one trigger wins, regardless of interleaving
    assert_eq!(
        usize::from(first.is_some()) + usize::from(second.is_some()),
        1
    );
    assert_eq!(verifier.register_count(), 1);
    assert_eq!(verifier.submission_count(), 1);
    assert!(KeyVault::new(dir.path()).is_enrolled());
}

#[tokio::test]
async fn test_enroll_when_already_enrolled_fails_fast() {
    let dir = TempDir::new().unwrap();
    let vault = KeyVault::new(dir.path());
    let existing = vault.create_identity("Existing").unwrap();

    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());
    let report = orchestrator.run(enroll_request(None, None)).await.unwrap();

    assert!(matches!(report.outcome, Err(AuthError::IdentityExists)));
    assert_eq!(verifier.register_count(), 0);

    // the persisted identity is untouched
    let loaded = KeyVault::new(dir.path()).load_identity().unwrap().unwrap();
    assert_eq!(loaded.device_id, existing.device_id);
}

#[tokio::test]
async fn test_login_without_identity_fails_fast() {
    let dir = TempDir::new().unwrap();
    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());

    let report = orchestrator
        .run(login_request(Some("c1"), Some("n1")))
        .await
        .unwrap();

    assert!(matches!(report.outcome, Err(AuthError::NotEnrolled)));
    assert_eq!(verifier.submission_count(), 0);
}

#[tokio::test]
async fn test_login_signs_with_the_enrolled_identity() {
    let dir = TempDir::new().unwrap();
    let identity = KeyVault::new(dir.path())
        .create_identity("Test Device")
        .unwrap();

    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());
    let report = orchestrator
        .run(login_request(Some("c1"), Some("n1")))
        .await
        .unwrap();

    assert!(matches!(report.outcome, Ok(FlowKind::Authenticated)));
    let submitted = verifier.submissions.lock().unwrap()[0].clone();
    assert_eq!(submitted.device_id, identity.device_id);
    assert_signature_verifies(&identity.public_key_pem, &submitted.signature, b"c1n1");
}

#[tokio::test]
async fn test_login_with_missing_nonce_signs_challenge_alone() {
    let dir = TempDir::new().unwrap();
    let identity = KeyVault::new(dir.path())
        .create_identity("Test Device")
        .unwrap();

    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());
    let report = orchestrator
        .run(login_request(Some("c1"), None))
        .await
        .unwrap();

    assert!(matches!(report.outcome, Ok(FlowKind::Authenticated)));
    let submitted = verifier.submissions.lock().unwrap()[0].clone();
    assert_signature_verifies(&identity.public_key_pem, &submitted.signature, b"c1");
}

#[tokio::test]
async fn test_login_without_challenge_is_idle() {
    let dir = TempDir::new().unwrap();
    let verifier = FakeVerifier::default();
    let orchestrator = orchestrator(&dir, verifier.clone());

    let report = orchestrator.run(login_request(None, None)).await.unwrap();

    assert!(matches!(report.outcome, Ok(FlowKind::Idle)));
    assert_eq!(verifier.register_count(), 0);
    assert_eq!(verifier.submission_count(), 0);
}

#[tokio::test]
async fn test_rejected_submission_is_terminal() {
    let dir = TempDir::new().unwrap();
    KeyVault::new(dir.path())
        .create_identity("Test Device")
        .unwrap();

    let verifier = FakeVerifier::default();
    verifier.reject_submit.store(true, Ordering::SeqCst);

    let orchestrator = orchestrator(&dir, verifier.clone());
    let report = orchestrator
        .run(login_request(Some("c1"), Some("n1")))
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        Err(AuthError::ChallengeAlreadyUsed)
    ));
    // the terminal line names the failure
    assert!(report
        .log
        .last()
        .unwrap()
        .contains("challenge already used"));
}
