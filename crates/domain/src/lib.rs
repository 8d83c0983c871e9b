//! labkit domain crate
//!
//! Core logic, free of process and terminal I/O:
//! - `hash`: deterministic cross-type content hashing
//! - `model`: hashable values and run-information records
//! - `array`: strided host arrays
//! - `registry`: flattening rules for foreign types
//! - `duration`, `timing`, `progress`, `size`, `numfmt`: measurement helpers
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Application use cases

pub mod array;
pub mod duration;
pub mod hash;
pub mod model;
pub mod numfmt;
pub mod ports;
pub mod progress;
pub mod registry;
pub mod size;
pub mod timing;
pub mod usecases;

pub use array::{ArrayError, DType, Element, NdArray};
pub use hash::{
    ContainerTagging, ContentHasher, DEFAULT_HEX_LENGTH, DIGEST_LEN, Digest, HashError,
    HashOptions, HashOutput, hash, hashit,
};
pub use model::*;
pub use ports::*;
pub use registry::FlattenRegistry;
