//! Subcommand implementations

pub mod about;
pub mod bench;
pub mod config;
pub mod duration;
pub mod hash;
pub mod size;
