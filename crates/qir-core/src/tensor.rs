use std::sync::Arc;

use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::ty::TensorType;

// TensorValue: concrete data flowing through the reference interpreter
//
// The interpreter evaluates canonicalized programs to check their numerics,
// so values must represent every IR dtype exactly. Integers of any width are
// widened to i64 and floats to f64; the dtype tag says which range a value
// must stay inside. Kernels check results against that range, which is how
// an intermediate overflow shows up as an error instead of a wrong number.
//
// Data is always contiguous row-major and shared through an Arc, so cloning
// a value (the interpreter memoizes every node) is cheap.

/// Element storage, widened to the largest type of each kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Buffer {
    pub fn len(&self) -> usize {
        match self {
            Buffer::Int(v) => v.len(),
            Buffer::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An n-dimensional array value with a dtype.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    shape: Shape,
    dtype: DType,
    data: Arc<Buffer>,
}

impl TensorValue {
    /// Build an integer tensor. Every value must be representable in `dtype`.
    pub fn from_ints(values: Vec<i64>, shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        check_count(&shape, values.len())?;
        if dtype.is_float() {
            return Err(Error::msg(format!(
                "integer data cannot back a {dtype} tensor"
            )));
        }
        if let Some(bad) = values.iter().find(|v| !dtype.holds(**v)) {
            return Err(Error::msg(format!("value {bad} does not fit in {dtype}")));
        }
        Ok(Self {
            shape,
            dtype,
            data: Arc::new(Buffer::Int(values)),
        })
    }

    /// Build a float tensor. `f32` tensors store values rounded to f32.
    pub fn from_floats(values: Vec<f64>, shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        check_count(&shape, values.len())?;
        if !dtype.is_float() {
            return Err(Error::msg(format!("float data cannot back a {dtype} tensor")));
        }
        let values = if dtype == DType::F32 {
            values.into_iter().map(|v| v as f32 as f64).collect()
        } else {
            values
        };
        Ok(Self {
            shape,
            dtype,
            data: Arc::new(Buffer::Float(values)),
        })
    }

    /// Build a tensor from a typed slice; the dtype follows `T`.
    pub fn from_slice<T: WithDType>(values: &[T], shape: impl Into<Shape>) -> Result<Self> {
        if T::DTYPE.is_float() {
            let floats = values.iter().map(|&v| WithDType::to_f64(v)).collect();
            Self::from_floats(floats, shape, T::DTYPE)
        } else {
            let ints = values.iter().map(|&v| WithDType::to_i64(v)).collect();
            Self::from_ints(ints, shape, T::DTYPE)
        }
    }

    pub fn scalar_int(value: i64, dtype: DType) -> Result<Self> {
        Self::from_ints(vec![value], Shape::scalar(), dtype)
    }

    pub fn scalar_float(value: f64, dtype: DType) -> Result<Self> {
        Self::from_floats(vec![value], Shape::scalar(), dtype)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn buffer(&self) -> &Buffer {
        &self.data
    }

    /// The static type this value inhabits.
    pub fn ty(&self) -> TensorType {
        TensorType::new(self.shape.clone(), self.dtype)
    }

    /// Integer elements, or `None` for a float tensor.
    pub fn ints(&self) -> Option<&[i64]> {
        match &*self.data {
            Buffer::Int(v) => Some(v),
            Buffer::Float(_) => None,
        }
    }

    /// Float elements, or `None` for an integer tensor.
    pub fn floats(&self) -> Option<&[f64]> {
        match &*self.data {
            Buffer::Float(v) => Some(v),
            Buffer::Int(_) => None,
        }
    }

    /// All elements converted to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &*self.data {
            Buffer::Int(v) => v.iter().map(|&x| x as f64).collect(),
            Buffer::Float(v) => v.clone(),
        }
    }

    /// All elements as i64. Fails for float tensors.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>> {
        self.ints().map(<[i64]>::to_vec).ok_or(Error::DTypeMismatch {
            expected: DType::I64,
            got: self.dtype,
        })
    }

    /// The single element of a scalar (or single-element) tensor as f64.
    pub fn scalar_f64(&self) -> Result<f64> {
        self.check_single()?;
        Ok(self.to_f64_vec()[0])
    }

    /// The single element of an integer scalar tensor.
    pub fn scalar_i64(&self) -> Result<i64> {
        self.check_single()?;
        Ok(self.to_i64_vec()?[0])
    }

    fn check_single(&self) -> Result<()> {
        if self.elem_count() == 1 {
            Ok(())
        } else {
            Err(Error::NotAScalar {
                shape: self.shape.clone(),
            })
        }
    }
}

fn check_count(shape: &Shape, got: usize) -> Result<()> {
    let expected = shape.elem_count();
    if expected == got {
        Ok(())
    } else {
        Err(Error::ElementCountMismatch {
            shape: shape.clone(),
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_int8() {
        let t = TensorValue::from_slice(&[127i8, -128, 0, 5], (1, 4)).unwrap();
        assert_eq!(t.dtype(), DType::I8);
        assert_eq!(t.dims(), &[1, 4]);
        assert_eq!(t.ints().unwrap(), &[127, -128, 0, 5]);
        assert!(t.floats().is_none());
    }

    #[test]
    fn test_from_slice_float_and_wide_int() {
        let f = TensorValue::from_slice(&[0.5f64, -2.25], 2usize).unwrap();
        assert_eq!(f.dtype(), DType::F64);
        assert_eq!(f.floats().unwrap(), &[0.5, -2.25]);
        let i = TensorValue::from_slice(&[i64::MIN, 7], 2usize).unwrap();
        assert_eq!(i.ints().unwrap(), &[i64::MIN, 7]);
    }

    #[test]
    fn test_from_ints_rejects_out_of_range() {
        assert!(TensorValue::from_ints(vec![200], Shape::scalar(), DType::I8).is_err());
        assert!(TensorValue::from_ints(vec![200], Shape::scalar(), DType::U8).is_ok());
    }

    #[test]
    fn test_element_count_mismatch() {
        let err = TensorValue::from_ints(vec![1, 2, 3], (2, 2), DType::I32).unwrap_err();
        assert!(matches!(err, Error::ElementCountMismatch { expected: 4, got: 3, .. }));
    }

    #[test]
    fn test_f32_rounding() {
        let t = TensorValue::scalar_float(0.1, DType::F32).unwrap();
        assert_eq!(t.scalar_f64().unwrap(), 0.1f32 as f64);
    }

    #[test]
    fn test_scalar_access() {
        let t = TensorValue::scalar_int(-7, DType::I32).unwrap();
        assert_eq!(t.scalar_i64().unwrap(), -7);
        let v = TensorValue::from_slice(&[1.0f32, 2.0], 2usize).unwrap();
        assert!(matches!(v.scalar_f64(), Err(Error::NotAScalar { .. })));
        assert!(v.to_i64_vec().is_err());
    }
}
