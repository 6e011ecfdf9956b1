pub mod encoding;
pub mod signer;

pub use signer::sign_challenge;
