use serde::{Deserialize, Serialize};

/// The device's asymmetric identity. Created once at enrollment, immutable
/// afterwards, destroyed only by an explicit vault reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub public_key_pem: String,
    pub private_key_der: Vec<u8>,
    pub device_name: String,
}

/// A freshly issued challenge as returned by the verifier. The nonce is
/// empty when the verifier issued none; `auth_url` is the display payload
/// the issuing surface renders for the authenticator to pick up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedChallenge {
    pub challenge_id: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub auth_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChallengeStatus {
    pub authenticated: bool,
    pub is_expired: bool,
    pub is_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDevice {
    pub device_id: String,
    pub public_key: String,
    pub device_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSignature {
    pub challenge_id: String,
    pub device_id: String,
    pub signature: String,
}

/// Generic ok/err envelope the verifier wraps around mutating endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierAck {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
