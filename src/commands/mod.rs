// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports copy and info commands

pub mod copy;
pub mod info;

pub use copy::{copy, CopyOverrides};
pub use info::info;
