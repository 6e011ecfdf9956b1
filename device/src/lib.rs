pub mod api;
pub mod crypto;
pub mod flow;
pub mod poller;
pub mod vault;

pub use api::{HttpVerifier, VerifierClient};
pub use flow::{FlowAction, FlowKind, FlowOrchestrator, FlowReport, FlowRequest};
pub use poller::{open_enroll_session, open_login_session, ChallengePoller, PollOutcome, PollerHandle};
pub use vault::KeyVault;
