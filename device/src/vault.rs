use common::{AuthError, DeviceIdentity, Result};
use p256::ecdsa::SigningKey;
use p256::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

const IDENTITY_FILE: &str = "identity.json";

/// The persisted record. All fields live in one document so a reader either
/// sees the complete identity or none of it.
#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    device_id: String,
    public_key_pem: String,
    private_key_b64: String,
    device_name: String,
}

/// File-backed store for the device's single asymmetric identity.
///
/// At most one identity persists at a time; creating a second one requires
/// an explicit `clear_identity` first.
pub struct KeyVault {
    dir: PathBuf,
}

impl KeyVault {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Generates a fresh P-256 key pair, persists the identity record
    /// atomically and returns it. Fails with `IdentityExists` when an
    /// identity is already persisted, leaving the stored record untouched.
    pub fn create_identity(&self, device_name: &str) -> Result<DeviceIdentity> {
        if self.identity_path().exists() {
            return Err(AuthError::IdentityExists);
        }

        let signing_key = SigningKey::random(&mut OsRng);
        let private_key = signing_key
            .to_pkcs8_der()
            .map_err(|e| AuthError::Signing(format!("private key export failed: {}", e)))?;
        let public_key_pem = signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::Signing(format!("public key export failed: {}", e)))?;

        let identity = DeviceIdentity {
            device_id: format!("device_{}", Uuid::new_v4()),
            public_key_pem,
            private_key_der: private_key.as_bytes().to_vec(),
            device_name: device_name.to_string(),
        };

        self.persist(&identity)?;
        log::info!("created identity {}", identity.device_id);
        Ok(identity)
    }

    /// Returns the persisted identity, or `None` when the vault is empty.
    /// A corrupt record is a storage error, never a partial identity.
    pub fn load_identity(&self) -> Result<Option<DeviceIdentity>> {
        let data = match fs::read(self.identity_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: StoredIdentity = serde_json::from_slice(&data)
            .map_err(|e| AuthError::Storage(format!("corrupt identity record: {}", e)))?;
        let private_key_der = base64::decode(&record.private_key_b64)
            .map_err(|e| AuthError::Storage(format!("corrupt private key: {}", e)))?;

        Ok(Some(DeviceIdentity {
            device_id: record.device_id,
            public_key_pem: record.public_key_pem,
            private_key_der,
            device_name: record.device_name,
        }))
    }

    /// Removes the persisted identity. Clearing an empty vault is a silent
    /// no-op, so reset is idempotent.
    pub fn clear_identity(&self) -> Result<()> {
        match fs::remove_file(self.identity_path()) {
            Ok(()) => {
                log::info!("cleared persisted identity");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.identity_path().exists()
    }

    fn identity_path(&self) -> PathBuf {
        self.dir.join(IDENTITY_FILE)
    }

    fn persist(&self, identity: &DeviceIdentity) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let record = StoredIdentity {
            device_id: identity.device_id.clone(),
            public_key_pem: identity.public_key_pem.clone(),
            private_key_b64: base64::encode(&identity.private_key_der),
            device_name: identity.device_name.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)?;

        // write-then-rename: a reader sees the old record or the new one,
        // never a torn write
        let tmp = self.dir.join(format!("{}.tmp", IDENTITY_FILE));
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, self.identity_path())?;
        Ok(())
    }
}
