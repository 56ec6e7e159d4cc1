//! Bearer token ownership and single-flight renewal.

pub mod error;
pub mod renewal;
pub mod state;

pub use error::RenewalError;
pub use renewal::{RenewalCoordinator, RenewalRole};
pub use state::AuthState;
