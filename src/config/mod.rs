// Re-exports so callers can "use crate::config::*".
#[allow(clippy::module_inception)]
pub mod config;
pub mod logging;
pub mod store;

pub use config::*;
pub use logging::*;
pub use store::*;
