// ABOUTME: Library module for db-copier
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod drivers;
pub mod error;
pub mod migration;
pub mod progress;
pub mod schema;
pub mod utils;
pub mod value;

pub use error::CopyError;
