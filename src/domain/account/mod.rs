// ============================================================================
// Account Domain - Users and Driver Profiles
// ============================================================================

pub mod errors;
pub mod service;

pub use errors::*;
pub use service::*;
