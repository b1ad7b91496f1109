//! Internal utilities for the chat core.

pub mod validation;

pub use validation::*;
