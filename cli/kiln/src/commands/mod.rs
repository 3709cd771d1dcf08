//! CLI command implementations.

pub mod target;
