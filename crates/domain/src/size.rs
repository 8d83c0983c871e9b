//! Recursive memory-size estimation for value trees

use std::collections::HashSet;
use std::mem::{size_of, size_of_val};
use std::sync::Arc;

use crate::model::Value;
use crate::numfmt::general_compact;

/// Estimate the bytes held by `value` and everything it owns
///
/// Counts the inline size of every node plus its heap payload. Buffers and
/// objects shared through an `Arc` are counted the first time they are
/// reached only.
pub fn deep_size_of(value: &Value) -> usize {
    let mut seen = HashSet::new();
    size_of_node(value, &mut seen)
}

fn size_of_node(value: &Value, seen: &mut HashSet<usize>) -> usize {
    let heap = match value {
        Value::None | Value::Bool(_) | Value::Float(_) => 0,
        Value::Int(int) => (int.bits() as usize).div_ceil(64) * size_of::<u64>(),
        Value::Text(text) => text.capacity(),
        Value::Bytes(bytes) => bytes.capacity(),
        Value::List(items) | Value::Tuple(items) => {
            spare(items.capacity() - items.len(), size_of::<Value>())
                + items.iter().map(|item| size_of_node(item, seen)).sum::<usize>()
        }
        Value::Map(entries) => {
            spare(entries.capacity() - entries.len(), size_of::<(Value, Value)>())
                + entries
                    .iter()
                    .map(|(k, v)| size_of_node(k, seen) + size_of_node(v, seen))
                    .sum::<usize>()
        }
        Value::Slice(slice) => {
            size_of_node(&slice.start, seen)
                + size_of_node(&slice.stop, seen)
                + size_of_node(&slice.step, seen)
        }
        Value::Array(array) => {
            let layout = array.ndim() * (size_of::<usize>() + size_of::<isize>());
            let buffer = array.buffer();
            let data = if seen.insert(buffer.as_ptr() as usize) {
                buffer.len()
            } else {
                0
            };
            layout + data
        }
        Value::DeviceArray(array) => {
            if seen.insert(Arc::as_ptr(array) as *const u8 as usize) {
                size_of_val(array.as_ref())
            } else {
                0
            }
        }
        Value::Object(object) => {
            if seen.insert(Arc::as_ptr(object) as *const u8 as usize) {
                size_of_val(object.as_ref())
                    + object
                        .tree_flatten()
                        .map(|children| size_of_node(&children, seen))
                        .unwrap_or(0)
            } else {
                0
            }
        }
    };
    size_of::<Value>() + heap
}

fn spare(slots: usize, slot_size: usize) -> usize {
    slots * slot_size
}

/// Render a table of named values and their deep sizes, smallest first
///
/// Each line reads `{name:>30} :: {size:>9} B`.
pub fn memory_report(entries: &[(&str, &Value)]) -> String {
    let mut sizes: Vec<(&str, usize)> = entries
        .iter()
        .map(|(name, value)| (*name, deep_size_of(value)))
        .collect();
    sizes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    sizes
        .iter()
        .map(|(name, size)| {
            format!(
                "{:>30} :: {:>9} B\n",
                name,
                general_compact(*size as f64)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NdArray;

    #[test]
    fn test_scalars_are_inline() {
        assert_eq!(deep_size_of(&Value::None), size_of::<Value>());
        assert_eq!(deep_size_of(&Value::Float(1.0)), size_of::<Value>());
    }

    #[test]
    fn test_text_counts_capacity() {
        let mut text = String::with_capacity(64);
        text.push_str("abc");
        assert_eq!(deep_size_of(&Value::Text(text)), size_of::<Value>() + 64);
    }

    #[test]
    fn test_list_sums_children() {
        let items = vec![Value::bytes(vec![0u8; 10]), Value::None];
        let expected = size_of::<Value>() * 3 + 10;
        assert_eq!(deep_size_of(&Value::List(items)), expected);
    }

    #[test]
    fn test_shared_buffer_counted_once() {
        let array = NdArray::from_vec(vec![0.0f64; 1000], &[10, 100]).unwrap();
        let single = deep_size_of(&Value::from(array.clone()));
        let both = deep_size_of(&Value::List(vec![
            Value::from(array.clone()),
            Value::from(array.transpose()),
        ]));

        assert!(single > 8000);
        assert!(both < 2 * single);
        assert_eq!(both, size_of::<Value>() + single + (single - 8000));
    }

    #[test]
    fn test_memory_report_sorted_ascending() {
        let big = Value::bytes(vec![0u8; 5000]);
        let small = Value::None;
        let report = memory_report(&[("big", &big), ("small", &small)]);

        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].trim_start().starts_with("small ::"));
        assert!(lines[1].trim_start().starts_with("big ::"));
        assert_eq!(lines[0].find("::"), Some(31));
        assert!(lines[1].ends_with(" B"));
    }
}
