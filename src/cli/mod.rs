//! CLI module - command-line interface
//!
//! Contains the subcommands and the terminal approval prompt.

pub mod commands;
pub mod prompt;
