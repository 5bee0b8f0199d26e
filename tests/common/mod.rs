//! Shared test utilities for logfetch integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file.

pub mod assertions;
pub mod fake_upstream;
pub mod fixtures;

pub use fixtures::*;
