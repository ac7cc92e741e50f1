//! Transaction Module
//!
//! Builds Safe transaction records and hands signed ones to the verifier.

mod builder;
mod submitter;

pub use builder::*;
pub use submitter::*;
