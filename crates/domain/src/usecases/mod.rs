//! Application use cases

pub mod about;

pub use about::{AboutConfig, RESERVED_KEYS, RunInfoCollector};
