//! The authenticated HTTP client: bearer injection plus renew-and-retry.

pub mod error;
pub mod interceptor;

pub use error::{ClientError, HttpFailure};
pub use interceptor::{AuthClient, RequestPhase};
