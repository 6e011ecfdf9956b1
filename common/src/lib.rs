pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use session::{ChallengeKind, ChallengeSession, ChallengeState};
pub use types::*;
