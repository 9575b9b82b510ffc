//! Subcommand implementations for the `onecode` reference CLI.

pub mod stat;
pub mod view;
