//! Deterministic content hashing
//!
//! [`ContentHasher`] turns any [`Value`] into a 64-byte BLAKE2b digest that
//! depends only on the value's structure and contents:
//!
//! - byte strings and C-contiguous arrays are hashed straight from their
//!   buffer,
//! - scalars are encoded to fixed byte forms (booleans, two's-complement
//!   integers, IEEE-754 floats, UTF-8 text),
//! - containers accumulate the raw digests of their children,
//! - slices, structured objects and the absent marker carry a literal tag,
//! - non-contiguous and device arrays are first copied into row-major host
//!   memory.
//!
//! Unknown objects fall back to hashing their `Debug` output. That mode is
//! reported through a `tracing` warning and through [`Digest::fallbacks`];
//! two distinct values with equal `Debug` output collide.
//!
//! With the default [`ContainerTagging::Untagged`] the digests stay
//! compatible with previously recorded `hashit` digests, ambiguities
//! included: a list and a tuple with equal items collide, and so do a map and
//! the list of its `(key, value)` tuples.

use std::fmt;

use blake2::{Blake2b512, Digest as _};
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Object, Value};
use crate::registry::FlattenRegistry;

/// Digest size in bytes
pub const DIGEST_LEN: usize = 64;

/// Default number of hex characters returned by [`hash`] and [`hashit`]
pub const DEFAULT_HEX_LENGTH: usize = 8;

const NONE_TAG: &[u8] = b"None";
const SLICE_TAG: &[u8] = b"slice";

/// Errors raised by the content hasher
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("unsupported value of type {type_name}")]
    UnsupportedType { type_name: String },
}

/// Whether container digests carry a kind byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerTagging {
    /// Bit-compatible accumulation without a kind byte
    #[default]
    Untagged,
    /// Prefix lists, tuples and maps with `L`, `T` or `M`
    Tagged,
}

impl ContainerTagging {
    fn tag(self, kind: ContainerKind) -> Option<u8> {
        match self {
            ContainerTagging::Untagged => None,
            ContainerTagging::Tagged => Some(match kind {
                ContainerKind::List => b'L',
                ContainerKind::Tuple => b'T',
                ContainerKind::Map => b'M',
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ContainerKind {
    List,
    Tuple,
    Map,
}

/// Options accepted by [`hash`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashOptions {
    /// Hex characters to keep when `raw` is false
    pub hex_length: usize,
    /// Return the full digest bytes instead of hex
    pub raw: bool,
    /// Fail with [`HashError::UnsupportedType`] instead of hashing `Debug` output
    pub raise_on_unknown: bool,
    pub containers: ContainerTagging,
}

impl Default for HashOptions {
    fn default() -> Self {
        Self {
            hex_length: DEFAULT_HEX_LENGTH,
            raw: false,
            raise_on_unknown: false,
            containers: ContainerTagging::Untagged,
        }
    }
}

/// Result of [`hash`], shaped by [`HashOptions::raw`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashOutput {
    Raw(Vec<u8>),
    Hex(String),
}

impl HashOutput {
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            HashOutput::Hex(hex) => Some(hex),
            HashOutput::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            HashOutput::Raw(bytes) => Some(bytes),
            HashOutput::Hex(_) => None,
        }
    }
}

/// A finished digest with its degraded-mode annotations
#[derive(Clone, PartialEq, Eq)]
pub struct Digest {
    bytes: [u8; DIGEST_LEN],
    fallbacks: Vec<String>,
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.bytes
    }

    /// Lowercase hex of the digest, cut to `len` characters
    pub fn to_hex(&self, len: usize) -> String {
        let mut hex = format!("{}", self);
        hex.truncate(len);
        hex
    }

    /// Type names that were hashed from their `Debug` output
    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    pub fn is_degraded(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digest")
            .field("hex", &self.to_hex(16))
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

/// Content hasher with its flattening registry
#[derive(Debug, Default)]
pub struct ContentHasher {
    options: HashOptions,
    registry: FlattenRegistry,
}

impl ContentHasher {
    pub fn new(options: HashOptions) -> Self {
        Self {
            options,
            registry: FlattenRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: FlattenRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &HashOptions {
        &self.options
    }

    pub fn registry_mut(&mut self) -> &mut FlattenRegistry {
        &mut self.registry
    }

    /// Compute the full digest of `value`
    pub fn digest(&self, value: &Value) -> Result<Digest, HashError> {
        let mut fallbacks = Vec::new();
        let bytes = self.digest_raw(value, &mut fallbacks)?;
        Ok(Digest { bytes, fallbacks })
    }

    /// Compute the digest shaped by this hasher's options
    pub fn hash(&self, value: &Value) -> Result<HashOutput, HashError> {
        let digest = self.digest(value)?;
        if self.options.raw {
            Ok(HashOutput::Raw(digest.as_bytes().to_vec()))
        } else {
            Ok(HashOutput::Hex(digest.to_hex(self.options.hex_length)))
        }
    }

    fn digest_raw(
        &self,
        value: &Value,
        fallbacks: &mut Vec<String>,
    ) -> Result<[u8; DIGEST_LEN], HashError> {
        if let Some(buffer) = value.byte_buffer() {
            return Ok(finish(Blake2b512::new_with_prefix(buffer)));
        }

        let mut hasher = Blake2b512::new();
        match value {
            // Zero-filled buffer of length 0 or 1, so `true` never equals `1`.
            Value::Bool(flag) => hasher.update(&[0u8][..usize::from(*flag)]),
            Value::Int(int) => hasher.update(int_bytes(int)),
            Value::Float(float) => hasher.update(float.to_ne_bytes()),
            Value::Text(text) => hasher.update(text.as_bytes()),
            Value::List(items) => {
                self.accumulate(&mut hasher, ContainerKind::List, items, fallbacks)?
            }
            Value::Tuple(items) => {
                self.accumulate(&mut hasher, ContainerKind::Tuple, items, fallbacks)?
            }
            Value::Map(entries) => {
                if let Some(tag) = self.options.containers.tag(ContainerKind::Map) {
                    hasher.update([tag]);
                }
                for (key, value) in entries {
                    let pair = Value::Tuple(vec![key.clone(), value.clone()]);
                    hasher.update(self.digest_raw(&pair, fallbacks)?);
                }
            }
            Value::Slice(slice) => {
                hasher.update(SLICE_TAG);
                hasher.update(self.digest_raw(&slice.to_tuple(), fallbacks)?);
            }
            Value::None => hasher.update(NONE_TAG),
            Value::Array(array) => hasher.update(array.c_order_bytes()),
            Value::DeviceArray(array) => match array.to_host() {
                Ok(host) => {
                    tracing::debug!(
                        type_name = %array.type_name(),
                        device = %array.device(),
                        "Hashing host copy of device array"
                    );
                    hasher.update(host.c_order_bytes());
                }
                Err(error) => {
                    tracing::warn!(
                        type_name = %array.type_name(),
                        error = %error,
                        "Device array could not be copied to host"
                    );
                    self.fallback(&mut hasher, array.type_name(), array, fallbacks)?;
                }
            },
            Value::Object(object) => match self.flatten(object.as_ref()) {
                Some(children) => {
                    hasher.update(object.type_name().as_bytes());
                    hasher.update(self.digest_raw(&children, fallbacks)?);
                }
                None => self.fallback(&mut hasher, object.type_name(), object, fallbacks)?,
            },
            // Covered by the byte-buffer fast path above.
            Value::Bytes(bytes) => hasher.update(bytes),
        }

        Ok(finish(hasher))
    }

    fn accumulate(
        &self,
        hasher: &mut Blake2b512,
        kind: ContainerKind,
        items: &[Value],
        fallbacks: &mut Vec<String>,
    ) -> Result<(), HashError> {
        if let Some(tag) = self.options.containers.tag(kind) {
            hasher.update([tag]);
        }
        for item in items {
            hasher.update(self.digest_raw(item, fallbacks)?);
        }
        Ok(())
    }

    fn flatten(&self, object: &dyn Object) -> Option<Value> {
        object
            .tree_flatten()
            .or_else(|| self.registry.flatten(object))
    }

    fn fallback(
        &self,
        hasher: &mut Blake2b512,
        type_name: &str,
        value: &dyn fmt::Debug,
        fallbacks: &mut Vec<String>,
    ) -> Result<(), HashError> {
        if self.options.raise_on_unknown {
            return Err(HashError::UnsupportedType {
                type_name: type_name.to_string(),
            });
        }

        tracing::warn!(
            type_name = %type_name,
            "Unknown value type; hashing its Debug representation"
        );
        hasher.update(format!("{:?}", value).as_bytes());
        fallbacks.push(type_name.to_string());
        Ok(())
    }
}

fn finish(hasher: Blake2b512) -> [u8; DIGEST_LEN] {
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&hasher.finalize());
    bytes
}

/// Little-endian two's complement in `bit_length / 8 + 1` bytes
fn int_bytes(int: &BigInt) -> Vec<u8> {
    let len = (int.bits() / 8 + 1) as usize;
    let mut bytes = int.to_signed_bytes_le();
    let fill = if int.sign() == Sign::Minus { 0xff } else { 0x00 };
    bytes.resize(len, fill);
    bytes
}

/// Hash `value` with the default registry
pub fn hash(value: &Value, options: &HashOptions) -> Result<HashOutput, HashError> {
    ContentHasher::new(options.clone()).hash(value)
}

/// First eight hex characters of the digest of `value`
///
/// Never fails: unknown objects are hashed from their `Debug` output.
pub fn hashit(value: &Value) -> String {
    ContentHasher::default()
        .digest(value)
        .unwrap_or_else(|_| Digest {
            bytes: finish(Blake2b512::new_with_prefix(format!("{:?}", value))),
            fallbacks: vec![value.kind().to_string()],
        })
        .to_hex(DEFAULT_HEX_LENGTH)
}
