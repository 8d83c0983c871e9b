//! Strided n-dimensional numeric arrays held in host memory
//!
//! An [`NdArray`] is a view over a shared byte buffer described by a dtype,
//! a shape, byte strides and a byte offset. Views produced by `transpose`,
//! `slice_axis` or `flip` share the buffer with their parent and are usually
//! not C-contiguous; [`NdArray::c_order_bytes`] gathers their elements into
//! canonical row-major order.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes
    pub fn itemsize(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::U16 => "uint16",
            DType::I16 => "int16",
            DType::U32 => "uint32",
            DType::I32 => "int32",
            DType::U64 => "uint64",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar types that can back an [`NdArray`]
pub trait Element: Copy {
    const DTYPE: DType;

    /// Append the native-endian representation of `self`
    fn extend_ne_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn extend_ne_bytes(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn extend_ne_bytes(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// Errors raised while building or reshaping arrays
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArrayError {
    #[error("shape {shape:?} holds {expected} elements but {actual} were given")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("strides have {strides} dimensions but shape has {shape}")]
    RankMismatch { shape: usize, strides: usize },
    #[error("view reaches outside its {len}-byte buffer")]
    OutOfBounds { len: usize },
    #[error("axis {axis} out of range for a {ndim}-dimensional array")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("invalid axis permutation {0:?}")]
    InvalidPermutation(Vec<usize>),
    #[error("slice step must be positive")]
    ZeroStep,
}

/// A strided view over a shared host buffer
#[derive(Clone)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
    data: Arc<[u8]>,
}

impl NdArray {
    /// Build a C-contiguous array from row-major values
    pub fn from_vec<T: Element>(values: Vec<T>, shape: &[usize]) -> Result<Self, ArrayError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(ArrayError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual: values.len(),
            });
        }

        let mut data = Vec::with_capacity(values.len() * T::DTYPE.itemsize());
        for value in values {
            value.extend_ne_bytes(&mut data);
        }

        Ok(Self {
            dtype: T::DTYPE,
            shape: shape.to_vec(),
            strides: c_strides(shape, T::DTYPE.itemsize()),
            offset: 0,
            data: data.into(),
        })
    }

    /// Build a one-dimensional array
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.itemsize());
        for value in values {
            value.extend_ne_bytes(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            strides: vec![T::DTYPE.itemsize() as isize],
            offset: 0,
            data: data.into(),
        }
    }

    /// Wrap an existing buffer with an explicit layout
    ///
    /// Every element the view can address must lie inside `data`.
    pub fn from_raw_parts(
        dtype: DType,
        shape: Vec<usize>,
        strides: Vec<isize>,
        offset: usize,
        data: Arc<[u8]>,
    ) -> Result<Self, ArrayError> {
        if shape.len() != strides.len() {
            return Err(ArrayError::RankMismatch {
                shape: shape.len(),
                strides: strides.len(),
            });
        }

        let array = Self {
            dtype,
            shape,
            strides,
            offset,
            data,
        };
        array.check_bounds()?;
        Ok(array)
    }

    fn check_bounds(&self) -> Result<(), ArrayError> {
        if self.is_empty() {
            return Ok(());
        }

        let mut low = self.offset as isize;
        let mut high = self.offset as isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides) {
            let span = stride * (dim as isize - 1);
            if span < 0 {
                low += span;
            } else {
                high += span;
            }
        }

        let end = high + self.dtype.itemsize() as isize;
        if low < 0 || end > self.data.len() as isize {
            return Err(ArrayError::OutOfBounds {
                len: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes covered by the logical elements
    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype.itemsize()
    }

    /// The shared backing buffer
    pub fn buffer(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Whether elements are laid out densely in row-major order
    ///
    /// Axes of length one are ignored and an empty array is always
    /// contiguous.
    pub fn is_c_contiguous(&self) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut expected = self.dtype.itemsize() as isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides).rev() {
            if dim == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= dim as isize;
        }
        true
    }

    /// Borrow the raw bytes when the view is C-contiguous
    pub fn contiguous_bytes(&self) -> Option<&[u8]> {
        if !self.is_c_contiguous() {
            return None;
        }
        if self.is_empty() {
            return Some(&[]);
        }
        self.data.get(self.offset..self.offset + self.nbytes())
    }

    /// Element bytes in canonical row-major order
    pub fn c_order_bytes(&self) -> Cow<'_, [u8]> {
        match self.contiguous_bytes() {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(self.gather()),
        }
    }

    /// Copy into a fresh C-contiguous array
    pub fn to_c_contiguous(&self) -> NdArray {
        let data: Arc<[u8]> = match self.contiguous_bytes() {
            Some(bytes) => bytes.into(),
            None => self.gather().into(),
        };
        Self {
            dtype: self.dtype,
            shape: self.shape.clone(),
            strides: c_strides(&self.shape, self.dtype.itemsize()),
            offset: 0,
            data,
        }
    }

    fn gather(&self) -> Vec<u8> {
        let itemsize = self.dtype.itemsize();
        let mut out = Vec::with_capacity(self.nbytes());
        if self.is_empty() {
            return out;
        }

        let ndim = self.ndim();
        let mut index = vec![0usize; ndim];
        let mut position = self.offset as isize;
        loop {
            let start = position as usize;
            out.extend_from_slice(&self.data[start..start + itemsize]);

            // Odometer increment over the multi-index, last axis fastest.
            let mut axis = ndim;
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                position += self.strides[axis];
                if index[axis] < self.shape[axis] {
                    break;
                }
                position -= self.strides[axis] * self.shape[axis] as isize;
                index[axis] = 0;
            }
        }
    }

    /// Reverse the order of all axes
    pub fn transpose(&self) -> NdArray {
        let axes: Vec<usize> = (0..self.ndim()).rev().collect();
        Self {
            dtype: self.dtype,
            shape: axes.iter().map(|&a| self.shape[a]).collect(),
            strides: axes.iter().map(|&a| self.strides[a]).collect(),
            offset: self.offset,
            data: Arc::clone(&self.data),
        }
    }

    /// Reorder axes so that axis `i` of the result is `axes[i]` of `self`
    pub fn permute(&self, axes: &[usize]) -> Result<NdArray, ArrayError> {
        let mut seen = vec![false; self.ndim()];
        if axes.len() != self.ndim() {
            return Err(ArrayError::InvalidPermutation(axes.to_vec()));
        }
        for &axis in axes {
            if axis >= self.ndim() || seen[axis] {
                return Err(ArrayError::InvalidPermutation(axes.to_vec()));
            }
            seen[axis] = true;
        }

        Ok(Self {
            dtype: self.dtype,
            shape: axes.iter().map(|&a| self.shape[a]).collect(),
            strides: axes.iter().map(|&a| self.strides[a]).collect(),
            offset: self.offset,
            data: Arc::clone(&self.data),
        })
    }

    /// Select `start..stop` with the given step along one axis
    ///
    /// Bounds are clamped to the axis length the way sequence slicing does.
    pub fn slice_axis(
        &self,
        axis: usize,
        start: usize,
        stop: usize,
        step: usize,
    ) -> Result<NdArray, ArrayError> {
        self.check_axis(axis)?;
        if step == 0 {
            return Err(ArrayError::ZeroStep);
        }

        let dim = self.shape[axis];
        let start = start.min(dim);
        let stop = stop.clamp(start, dim);
        let len = (stop - start).div_ceil(step);

        let mut view = self.clone();
        if len > 0 {
            view.offset = (self.offset as isize + self.strides[axis] * start as isize) as usize;
        }
        view.shape[axis] = len;
        view.strides[axis] = self.strides[axis] * step as isize;
        Ok(view)
    }

    /// Reverse the element order along one axis
    pub fn flip(&self, axis: usize) -> Result<NdArray, ArrayError> {
        self.check_axis(axis)?;

        let mut view = self.clone();
        let dim = self.shape[axis];
        if dim > 0 {
            view.offset = (self.offset as isize + self.strides[axis] * (dim as isize - 1)) as usize;
        }
        view.strides[axis] = -self.strides[axis];
        Ok(view)
    }

    fn check_axis(&self, axis: usize) -> Result<(), ArrayError> {
        if axis >= self.ndim() {
            return Err(ArrayError::InvalidAxis {
                axis,
                ndim: self.ndim(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

fn c_strides(shape: &[usize], itemsize: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = itemsize as isize;
    for (stride, &dim) in strides.iter_mut().zip(shape).rev() {
        *stride = acc;
        acc *= dim.max(1) as isize;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_bytes(values: &[f64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn matrix() -> NdArray {
        // [[1, 2, 3],
        //  [4, 5, 6]]
        NdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap()
    }

    #[test]
    fn test_from_vec_is_contiguous() {
        let array = matrix();
        assert!(array.is_c_contiguous());
        assert_eq!(array.strides(), &[24, 8]);
        assert_eq!(
            array.contiguous_bytes().unwrap(),
            f64_bytes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).as_slice()
        );
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let result = NdArray::from_vec(vec![1i32, 2, 3], &[2, 2]);
        assert!(matches!(
            result,
            Err(ArrayError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_transpose_gathers_in_row_major_order() {
        let transposed = matrix().transpose();
        assert_eq!(transposed.shape(), &[3, 2]);
        assert!(!transposed.is_c_contiguous());
        assert!(transposed.contiguous_bytes().is_none());
        assert_eq!(
            transposed.c_order_bytes().as_ref(),
            f64_bytes(&[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).as_slice()
        );
    }

    #[test]
    fn test_to_c_contiguous_matches_gathered_bytes() {
        let transposed = matrix().transpose();
        let copy = transposed.to_c_contiguous();
        assert!(copy.is_c_contiguous());
        assert_eq!(copy.shape(), transposed.shape());
        assert_eq!(
            copy.contiguous_bytes().unwrap(),
            transposed.c_order_bytes().as_ref()
        );
    }

    #[test]
    fn test_slice_axis_with_step() {
        let columns = matrix().slice_axis(1, 0, 3, 2).unwrap();
        assert_eq!(columns.shape(), &[2, 2]);
        assert_eq!(
            columns.c_order_bytes().as_ref(),
            f64_bytes(&[1.0, 3.0, 4.0, 6.0]).as_slice()
        );
    }

    #[test]
    fn test_row_slice_stays_contiguous() {
        let row = matrix().slice_axis(0, 1, 2, 1).unwrap();
        assert!(row.is_c_contiguous());
        assert_eq!(
            row.contiguous_bytes().unwrap(),
            f64_bytes(&[4.0, 5.0, 6.0]).as_slice()
        );
    }

    #[test]
    fn test_slice_clamps_out_of_range_bounds() {
        let empty = matrix().slice_axis(0, 5, 9, 1).unwrap();
        assert_eq!(empty.shape(), &[0, 3]);
        assert!(empty.is_c_contiguous());
        assert_eq!(empty.contiguous_bytes().unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_flip_uses_negative_strides() {
        let flipped = matrix().flip(1).unwrap();
        assert_eq!(flipped.strides(), &[24, -8]);
        assert_eq!(
            flipped.c_order_bytes().as_ref(),
            f64_bytes(&[3.0, 2.0, 1.0, 6.0, 5.0, 4.0]).as_slice()
        );
    }

    #[test]
    fn test_permute_validates_axes() {
        let array = matrix();
        assert!(array.permute(&[1, 0]).is_ok());
        assert!(matches!(
            array.permute(&[0, 0]),
            Err(ArrayError::InvalidPermutation(_))
        ));
        assert!(matches!(
            array.permute(&[0]),
            Err(ArrayError::InvalidPermutation(_))
        ));
    }

    #[test]
    fn test_from_raw_parts_checks_bounds() {
        let data: Arc<[u8]> = vec![0u8; 16].into();
        let ok = NdArray::from_raw_parts(DType::F64, vec![2], vec![8], 0, Arc::clone(&data));
        assert!(ok.is_ok());

        let overflow = NdArray::from_raw_parts(DType::F64, vec![3], vec![8], 0, Arc::clone(&data));
        assert_eq!(overflow.unwrap_err(), ArrayError::OutOfBounds { len: 16 });

        let rank = NdArray::from_raw_parts(DType::F64, vec![2, 1], vec![8], 0, data);
        assert!(matches!(rank, Err(ArrayError::RankMismatch { .. })));
    }

    #[test]
    fn test_broadcast_axis_is_not_contiguous() {
        let data: Arc<[u8]> = f64_bytes(&[7.0, 8.0]).into();
        let repeated = NdArray::from_raw_parts(DType::F64, vec![3, 2], vec![0, 8], 0, data).unwrap();
        assert!(!repeated.is_c_contiguous());
        assert_eq!(
            repeated.c_order_bytes().as_ref(),
            f64_bytes(&[7.0, 8.0, 7.0, 8.0, 7.0, 8.0]).as_slice()
        );
    }
}
