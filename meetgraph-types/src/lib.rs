//! meetgraph shared library
//!
//! Types, input validation and log locations shared by the build engine
//! and the command-line interface.

pub mod logging;
pub mod path_validation;
pub mod types;
pub mod validation;

pub use types::*;
