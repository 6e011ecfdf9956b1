use common::{AuthError, DeviceIdentity, Result};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;

use crate::crypto::encoding;

/// Builds the exact byte string the verifier checks: the UTF-8 bytes of
/// `challenge_id` followed by `nonce`. The nonce is the empty string when
/// the verifier issued none, so construction stays deterministic.
pub fn challenge_message(challenge_id: &str, nonce: &str) -> String {
    format!("{}{}", challenge_id, nonce)
}

/// Signs a challenge with the identity's private key and returns the
/// base64 wire form of the re-encoded signature.
pub fn sign_challenge(
    identity: &DeviceIdentity,
    challenge_id: &str,
    nonce: &str,
) -> Result<String> {
    if identity.private_key_der.is_empty() {
        return Err(AuthError::Signing("no private key available".to_string()));
    }

    let key = SigningKey::from_pkcs8_der(&identity.private_key_der)
        .map_err(|e| AuthError::Signing(format!("rejected private key: {}", e)))?;

    let message = challenge_message(challenge_id, nonce);
    let signature: Signature = key.sign(message.as_bytes());

    let encoded = encoding::encode(signature.to_bytes().as_slice())?;
    Ok(base64::encode(encoded))
}
