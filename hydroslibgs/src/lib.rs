//! Hydros Ground/Space Library (hydroslibgs)
//!
//! This library contains definitions shared between ground segment tooling
//! and the flight process (hydrosfsw): flight modes, uplinked command and
//! downlinked acknowledgment records, common types, and the error taxonomy.

pub mod types;
pub mod modes;
pub mod commands;
pub mod downlink;
pub mod error;

pub use types::*;
pub use modes::*;
pub use commands::*;
pub use downlink::*;
pub use error::*;
