//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod hash;
pub mod interning;
pub mod time;

pub use config::ResolveConfig;
pub use diagnostic::Diagnostic;
pub use hash::DescriptorHash;
pub use interning::InternedString;
pub use time::{Clock, ManualClock, SystemClock};
