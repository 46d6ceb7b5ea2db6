//! Library side of the `bundler` command-line tool
//!
//! Configuration loading and the subcommands, kept out of `main` so they
//! can be tested without spawning the binary.

#![warn(unreachable_pub)]

pub mod commands;
pub mod config;

pub use config::BundlerConfig;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
