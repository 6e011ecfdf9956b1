use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("device identity already exists")]
    IdentityExists,
    #[error("device is not enrolled")]
    NotEnrolled,
    #[error("signing error: {0}")]
    Signing(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("challenge expired")]
    ChallengeExpired,
    #[error("challenge already used")]
    ChallengeAlreadyUsed,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}
