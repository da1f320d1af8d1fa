//! Shared types of the session-key deploy client: user operations, session
//! keys, submission tracking, progress reporting and the error taxonomy.
pub mod error;
pub mod logger;
pub mod progress;
pub mod submission;
pub mod types;
pub mod user_operation;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{
    AllowanceError, AllowanceShortfall, ConfigError, KeyError, NonceError, OwnershipError,
    SignError, SubmitCause, SubmitError,
};
pub use progress::{DeployProgress, ProgressSnapshot, ProgressTracker};
pub use submission::{SubmissionAck, SubmissionRecord, SubmissionStatus};
pub use types::{
    AccountRef, Clock, ContractAddressSet, SessionKeyCredential, SigningMaterial, SystemClock,
};
pub use user_operation::{SignedUserOperation, UserOperation};
