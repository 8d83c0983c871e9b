//! Hashable value model
//!
//! [`Value`] is the closed set of value kinds the content hasher understands.
//! Two seams keep it open for user types: [`Object`] for structured values
//! that can flatten themselves (or be flattened through a registry), and
//! [`DeviceArray`] for arrays living on an accelerator.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::array::NdArray;

/// A value that can be content-hashed
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent-value marker
    None,
    Bool(bool),
    /// Signed integer of arbitrary size
    Int(BigInt),
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw byte string
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Key/value pairs in iteration order
    Map(Vec<(Value, Value)>),
    Slice(Box<Slice>),
    /// Host-resident numeric array
    Array(NdArray),
    /// Accelerator-resident array without a host buffer
    DeviceArray(Arc<dyn DeviceArray>),
    /// User-defined value
    Object(Arc<dyn Object>),
}

/// A start/stop/step triple, each part optional
#[derive(Debug, Clone)]
pub struct Slice {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

impl Slice {
    /// The triple as a plain tuple value
    pub fn to_tuple(&self) -> Value {
        Value::Tuple(vec![
            self.start.clone(),
            self.stop.clone(),
            self.step.clone(),
        ])
    }
}

/// A user-defined value the hasher does not know natively
///
/// Types that can decompose themselves return their children from
/// [`Object::tree_flatten`]. Types that cannot be changed can be flattened
/// through a [`crate::FlattenRegistry`] instead. Anything else is hashed from
/// its `Debug` output, which is a degraded mode without collision guarantees.
pub trait Object: Any + fmt::Debug + Send + Sync {
    /// Name used to tag flattened content
    fn type_name(&self) -> &str;

    /// Decompose into child values
    fn tree_flatten(&self) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Error type for device-to-host transfers
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device {device} unavailable: {message}")]
    Unavailable { device: String, message: String },
    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// An array held in accelerator memory
pub trait DeviceArray: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    /// Device identifier, e.g. `gpu:0`
    fn device(&self) -> &str;

    /// Materialize a host-resident copy
    fn to_host(&self) -> Result<NdArray, DeviceError>;
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn slice(start: impl Into<Value>, stop: impl Into<Value>, step: impl Into<Value>) -> Self {
        Value::Slice(Box::new(Slice {
            start: start.into(),
            stop: stop.into(),
            step: step.into(),
        }))
    }

    pub fn object(object: impl Object) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn device_array(array: impl DeviceArray + 'static) -> Self {
        Value::DeviceArray(Arc::new(array))
    }

    /// Short name of the value kind, used in diagnostics
    pub fn kind(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Slice(_) => "slice",
            Value::Array(_) => "array",
            Value::DeviceArray(array) => array.type_name(),
            Value::Object(object) => object.type_name(),
        }
    }

    /// Raw byte view, available for byte strings and C-contiguous arrays
    pub fn byte_buffer(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            Value::Array(array) => array.contiguous_bytes(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(BigInt::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<NdArray> for Value {
    fn from(value: NdArray) -> Self {
        Value::Array(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::None, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (Value::Text(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Working-tree state needed to reproduce a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitState {
    /// Commit hash of HEAD
    #[serde(rename = "HEAD")]
    pub head: String,
    pub branch: String,
    /// Whether tracked files differ from HEAD
    pub dirty: bool,
    /// Diff of tracked files against HEAD
    pub patch: String,
}

/// Environment and arguments of the current process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessContext {
    pub environment: BTreeMap<String, String>,
    pub argv: Vec<String>,
}

impl ProcessContext {
    /// Capture the running process, replacing invalid UTF-8 lossily
    pub fn current() -> Self {
        Self {
            environment: std::env::vars_os()
                .map(|(k, v)| {
                    (
                        k.to_string_lossy().into_owned(),
                        v.to_string_lossy().into_owned(),
                    )
                })
                .collect(),
            argv: std::env::args_os()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Everything recorded about a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub args: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Caller-supplied fields, merged at the top level
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
    pub environment: BTreeMap<String, String>,
    pub argv: Vec<String>,
    /// `None` outside a git work tree
    pub git: Option<GitState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_maps_to_none() {
        assert!(matches!(Value::from(None::<i32>), Value::None));
        assert!(matches!(Value::from(Some(3)), Value::Int(_)));
    }

    #[test]
    fn test_byte_buffer_only_for_raw_data() {
        assert_eq!(Value::bytes(b"abc".to_vec()).byte_buffer(), Some(&b"abc"[..]));
        assert!(Value::text("abc").byte_buffer().is_none());

        let array = NdArray::from_vec(vec![1u8, 2, 3, 4], &[2, 2]).unwrap();
        assert_eq!(Value::from(array.clone()).byte_buffer(), Some(&[1u8, 2, 3, 4][..]));
        assert!(Value::from(array.transpose()).byte_buffer().is_none());
    }

    #[test]
    fn test_json_conversion() {
        let value = Value::from(json!({"a": [1, 2.5, null, true], "b": "x"}));
        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0].0, Value::Text(k) if k == "a"));
        let Value::List(items) = &entries[0].1 else {
            panic!("expected list");
        };
        assert!(matches!(items[0], Value::Int(_)));
        assert!(matches!(items[1], Value::Float(f) if f == 2.5));
        assert!(matches!(items[2], Value::None));
        assert!(matches!(items[3], Value::Bool(true)));
    }

    #[test]
    fn test_slice_to_tuple() {
        let Value::Slice(slice) = Value::slice(1, 2, ()) else {
            panic!("expected slice");
        };
        let Value::Tuple(parts) = slice.to_tuple() else {
            panic!("expected tuple");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[2], Value::None));
    }
}
