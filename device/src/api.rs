use async_trait::async_trait;
use common::{
    AuthConfig, AuthError, ChallengeStatus, IssuedChallenge, RegisterDevice, Result,
    SubmitSignature, VerifierAck,
};
use reqwest::Client;
use serde::Deserialize;

/// The remote verifier contract this core consumes. Implemented over HTTP
/// for production and by in-memory fakes in tests.
#[async_trait]
pub trait VerifierClient: Send + Sync {
    async fn issue_login_challenge(&self) -> Result<IssuedChallenge>;
    async fn issue_enroll_challenge(&self) -> Result<IssuedChallenge>;
    async fn challenge_status(&self, challenge_id: &str) -> Result<ChallengeStatus>;
    async fn register_device(&self, request: &RegisterDevice) -> Result<()>;
    async fn submit_signature(&self, request: &SubmitSignature) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct IssuedChallengeBody {
    success: bool,
    #[serde(default)]
    challenge_id: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    enrollment_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpVerifier {
    client: Client,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn issue_challenge(&self, path: &str) -> Result<IssuedChallenge> {
        let body: IssuedChallengeBody = self
            .client
            .post(self.url(path))
            .send()
            .await?
            .json()
            .await?;

        if !body.success {
            return Err(ack_error(body.error));
        }
        Ok(IssuedChallenge {
            challenge_id: body.challenge_id,
            nonce: body.nonce,
            auth_url: body.auth_url.or(body.enrollment_url),
        })
    }

    async fn post_acknowledged<T: serde::Serialize>(&self, path: &str, payload: &T) -> Result<()> {
        let response = self.client.post(self.url(path)).json(payload).send().await?;

        let status = response.status();
        let ack: VerifierAck = response
            .json()
            .await
            .map_err(|_| AuthError::Network(format!("verifier returned {}", status)))?;

        if !ack.success {
            return Err(ack_error(ack.error));
        }
        Ok(())
    }
}

#[async_trait]
impl VerifierClient for HttpVerifier {
    async fn issue_login_challenge(&self) -> Result<IssuedChallenge> {
        self.issue_challenge("/api/auth/login/request").await
    }

    async fn issue_enroll_challenge(&self) -> Result<IssuedChallenge> {
        self.issue_challenge("/api/auth/enroll/qr").await
    }

    async fn challenge_status(&self, challenge_id: &str) -> Result<ChallengeStatus> {
        let response = self
            .client
            .get(self.url("/api/auth/challenge/status"))
            .query(&[("challenge_id", challenge_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Network(format!(
                "status check failed: {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn register_device(&self, request: &RegisterDevice) -> Result<()> {
        self.post_acknowledged("/api/auth/enroll", request).await
    }

    async fn submit_signature(&self, request: &SubmitSignature) -> Result<()> {
        self.post_acknowledged("/api/auth/verify", request).await
    }
}

/// Maps the verifier's error strings onto the local taxonomy.
fn ack_error(error: Option<String>) -> AuthError {
    match error.as_deref() {
        Some("Challenge already used") => AuthError::ChallengeAlreadyUsed,
        Some("Challenge expired") => AuthError::ChallengeExpired,
        Some("Invalid signature") => AuthError::Signing("verifier rejected signature".to_string()),
        Some(message) => AuthError::Network(message.to_string()),
        None => AuthError::Network("verifier rejected the request".to_string()),
    }
}
