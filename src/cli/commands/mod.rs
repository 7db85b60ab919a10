//! CLI command implementations

pub mod roundtrip;
pub mod validate;
