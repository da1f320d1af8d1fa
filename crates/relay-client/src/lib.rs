//! HTTP clients of the backend services around the deploy flow.
pub mod bundler;
pub mod http;
pub mod records;
pub mod registry;
pub mod session_keys;

pub use bundler::{BundlerApi, HttpBundler, RelayStatus};
pub use http::{ApiClient, ApiError};
pub use records::{HttpRecordApi, RecordApi, RecordRetry, SessionRecord};
pub use registry::{ContractRegistry, HttpContractRegistry};
pub use session_keys::{HttpSessionKeyService, SessionKeyService};
