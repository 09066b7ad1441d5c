//! siteconf CLI library
//!
//! Exposes the CLI entry point so it can be embedded in other binaries.

mod cli;

pub use cli::run;
