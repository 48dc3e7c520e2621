//! Common test utilities for sheet-classifier integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod gemini;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use gemini::*;
