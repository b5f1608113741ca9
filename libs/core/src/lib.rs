//! Starcall Core - Shared call vocabulary
//!
//! Types that both sides of a call speak: header metadata and completion
//! status. The call layer itself lives in `starcall-rpc`.

pub mod metadata;
pub mod status;

// Re-exports for convenience
pub use metadata::Metadata;
pub use status::{Status, StatusCode};
