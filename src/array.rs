//! Typed N-dimensional arrays as read from a store
//!
//! Datasets keep the element type they were stored with, so label ids of
//! any width survive a read unchanged.

use crate::error::{Result, SourceError};
use crate::types::DataType;
use crate::utils::slice_region;
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use num_traits::Zero;
use std::fmt;

/// A scalar type a dataset can be stored as
pub trait Element: Copy + PartialOrd + Zero + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Borrow the array if `data` holds this element type
    fn array_of(data: &VolumeData) -> Option<&ArrayD<Self>>;

    /// Decode one element from exactly `DATA_TYPE.size_in_bytes()` bytes
    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut Vec<u8>);
}

/// Array of one of the stored element types
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Run `$body` with `$a` bound to the array inside a [`VolumeData`]
macro_rules! with_array {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            VolumeData::U8($a) => $body,
            VolumeData::U16($a) => $body,
            VolumeData::U32($a) => $body,
            VolumeData::U64($a) => $body,
            VolumeData::I8($a) => $body,
            VolumeData::I16($a) => $body,
            VolumeData::I32($a) => $body,
            VolumeData::I64($a) => $body,
            VolumeData::F32($a) => $body,
            VolumeData::F64($a) => $body,
        }
    };
}

/// Run `$body` with the type alias `$t` set to the Rust type of a [`DataType`]
macro_rules! with_element_type {
    ($data_type:expr, $t:ident => $body:expr) => {
        match $data_type {
            DataType::U8 => {
                type $t = u8;
                $body
            }
            DataType::U16 => {
                type $t = u16;
                $body
            }
            DataType::U32 => {
                type $t = u32;
                $body
            }
            DataType::U64 => {
                type $t = u64;
                $body
            }
            DataType::I8 => {
                type $t = i8;
                $body
            }
            DataType::I16 => {
                type $t = i16;
                $body
            }
            DataType::I32 => {
                type $t = i32;
                $body
            }
            DataType::I64 => {
                type $t = i64;
                $body
            }
            DataType::F32 => {
                type $t = f32;
                $body
            }
            DataType::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

pub(crate) use with_array;
pub(crate) use with_element_type;

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn array_of(data: &VolumeData) -> Option<&ArrayD<Self>> {
                match data {
                    VolumeData::$variant(array) => Some(array),
                    _ => None,
                }
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }

        impl From<ArrayD<$t>> for VolumeData {
            fn from(array: ArrayD<$t>) -> Self {
                VolumeData::$variant(array)
            }
        }
    )*};
}

impl_element! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

fn element_type<T: Element>(_: &ArrayD<T>) -> DataType {
    T::DATA_TYPE
}

/// Decode row-major little-endian elements into an array of `shape`
pub fn decode_array<T: Element>(shape: &[usize], bytes: &[u8]) -> Result<ArrayD<T>> {
    let size = T::DATA_TYPE.size_in_bytes();
    let count: usize = shape.iter().product();
    if bytes.len() != count * size {
        return Err(SourceError::StorageRead(format!(
            "expected {} bytes of {} for shape {:?}, found {}",
            count * size,
            T::DATA_TYPE,
            shape,
            bytes.len()
        )));
    }
    let values: Vec<T> = bytes.chunks_exact(size).map(T::read_le).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| SourceError::StorageRead(e.to_string()))
}

/// Encode an array as row-major little-endian elements
pub fn encode_array<T: Element>(array: ArrayViewD<'_, T>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(array.len() * T::DATA_TYPE.size_in_bytes());
    for &value in array.iter() {
        value.write_le(&mut bytes);
    }
    bytes
}

impl VolumeData {
    /// All-zero array of the given type and shape
    pub fn zeros(data_type: DataType, shape: &[usize]) -> Self {
        with_element_type!(data_type, T => VolumeData::from(ArrayD::<T>::zeros(IxDyn(shape))))
    }

    /// Decode a little-endian payload of `data_type`
    pub fn from_le_bytes(data_type: DataType, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        with_element_type!(data_type, T => decode_array::<T>(shape, bytes).map(VolumeData::from))
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        with_array!(self, a => encode_array(a.view()))
    }

    pub fn data_type(&self) -> DataType {
        with_array!(self, a => element_type(a))
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The array if it holds elements of type `T`
    pub fn as_array<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::array_of(self)
    }

    /// Copy the `[lo, hi)` region of every axis
    pub fn slice(&self, bounds: &[(i64, i64)]) -> Result<Self> {
        with_array!(self, a => slice_region(a.view(), bounds).map(VolumeData::from))
    }
}

impl fmt::Display for VolumeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} array of shape {:?}", self.data_type(), self.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_label_ids_keep_their_values() {
        let labels = ArrayD::from_shape_vec(IxDyn(&[2]), vec![16_777_216u32, 16_777_217]).unwrap();
        let data = VolumeData::from(labels.clone());
        assert_eq!(data.data_type(), DataType::U32);

        let decoded = VolumeData::from_le_bytes(DataType::U32, &[2], &data.to_le_bytes()).unwrap();
        let ids = decoded.as_array::<u32>().unwrap();
        assert_eq!(ids, &labels);
        assert_ne!(ids[[0]], ids[[1]]);
        assert!(decoded.as_array::<f32>().is_none());
    }

    #[test]
    fn test_u64_and_float_payloads() {
        let ids = vec![u64::MAX, (1u64 << 53) + 1];
        let array = ArrayD::from_shape_vec(IxDyn(&[1, 2]), ids.clone()).unwrap();
        let bytes = encode_array(array.view());
        assert_eq!(bytes.len(), 16);
        let back = decode_array::<u64>(&[1, 2], &bytes).unwrap();
        assert_eq!(back.iter().copied().collect::<Vec<_>>(), ids);

        let floats = VolumeData::from(ArrayD::from_elem(IxDyn(&[3]), -2.5f64));
        let back = VolumeData::from_le_bytes(DataType::F64, &[3], &floats.to_le_bytes()).unwrap();
        assert_eq!(back, floats);
    }

    #[test]
    fn test_decode_wrong_length() {
        assert!(matches!(
            decode_array::<u16>(&[2], &[0, 1, 2]),
            Err(SourceError::StorageRead(_))
        ));
        assert!(VolumeData::from_le_bytes(DataType::I32, &[2, 2], &[0; 15]).is_err());
    }

    #[test]
    fn test_zeros_and_slice() {
        let zeros = VolumeData::zeros(DataType::I16, &[3, 4]);
        assert_eq!(zeros.data_type(), DataType::I16);
        assert_eq!(zeros.shape(), &[3, 4]);
        assert_eq!(zeros.len(), 12);

        let ramp = ArrayD::from_shape_fn(IxDyn(&[4, 5]), |ix| (ix[0] * 10 + ix[1]) as i64);
        let region = VolumeData::from(ramp).slice(&[(1, 3), (2, 5)]).unwrap();
        let region = region.as_array::<i64>().unwrap();
        assert_eq!(region.shape(), &[2, 3]);
        assert_eq!(region[[1, 2]], 24);
    }

    #[test]
    fn test_display() {
        let data = VolumeData::zeros(DataType::U8, &[2, 3]);
        assert_eq!(data.to_string(), "U8 array of shape [2, 3]");
    }
}
