use std::fmt;

// DType: element data types of IR tensors
//
// Every tensor type in the IR carries a DType. Quantized programs mix a
// handful of integer widths with the float types used for scales:
//
//   I8   - quantized activations (the only input accepted by qnn.softmax)
//   I16  - intermediate accumulators on narrow targets
//   I32  - zero points and requantize inputs
//   I64  - fixed-point intermediates of integer-only lowering
//   U8   - unsigned quantized activations
//   U32  - unsigned indices
//   F32  - quantization scales
//   F64  - high-precision reference values

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U32,
    F32,
    F64,
}

impl DType {
    /// Width of one element in bits.
    pub fn bits(&self) -> u32 {
        match self {
            DType::I8 | DType::U8 => 8,
            DType::I16 => 16,
            DType::I32 | DType::U32 | DType::F32 => 32,
            DType::I64 | DType::F64 => 64,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Whether this dtype is an integer type (signed or unsigned).
    pub fn is_int(&self) -> bool {
        !self.is_float()
    }

    /// Whether values of this dtype carry a sign.
    pub fn is_signed(&self) -> bool {
        !matches!(self, DType::U8 | DType::U32)
    }

    /// Smallest representable integer, or `None` for float dtypes.
    pub fn int_min(&self) -> Option<i64> {
        match self {
            DType::I8 => Some(i8::MIN as i64),
            DType::I16 => Some(i16::MIN as i64),
            DType::I32 => Some(i32::MIN as i64),
            DType::I64 => Some(i64::MIN),
            DType::U8 | DType::U32 => Some(0),
            DType::F32 | DType::F64 => None,
        }
    }

    /// Largest representable integer, or `None` for float dtypes.
    pub fn int_max(&self) -> Option<i64> {
        match self {
            DType::I8 => Some(i8::MAX as i64),
            DType::I16 => Some(i16::MAX as i64),
            DType::I32 => Some(i32::MAX as i64),
            DType::I64 => Some(i64::MAX),
            DType::U8 => Some(u8::MAX as i64),
            DType::U32 => Some(u32::MAX as i64),
            DType::F32 | DType::F64 => None,
        }
    }

    /// Whether `v` is representable in this integer dtype.
    /// Always false for float dtypes.
    pub fn holds(&self, v: i64) -> bool {
        match (self.int_min(), self.int_max()) {
            (Some(lo), Some(hi)) => (lo..=hi).contains(&v),
            _ => false,
        }
    }

    /// Reinterpret the low `bits()` of `v` as a value of this integer dtype
    /// (two's complement truncation, as a narrowing cast does in hardware).
    pub fn wrap(&self, v: i64) -> i64 {
        match self {
            DType::I8 => v as i8 as i64,
            DType::I16 => v as i16 as i64,
            DType::I32 => v as i32 as i64,
            DType::U8 => v as u8 as i64,
            DType::U32 => v as u32 as i64,
            DType::I64 | DType::F32 | DType::F64 => v,
        }
    }

    /// Clamp `v` into the representable range of this integer dtype.
    pub fn saturate(&self, v: i64) -> i64 {
        match (self.int_min(), self.int_max()) {
            (Some(lo), Some(hi)) => v.clamp(lo, hi),
            _ => v,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U32 => "uint32",
            DType::F32 => "float32",
            DType::F64 => "float64",
        };
        write!(f, "{}", s)
    }
}

// WithDType: bridge from Rust scalar types to DType
//
// Lets tests and front-ends build tensor values straight from typed slices:
//
//   TensorValue::from_slice(&[1i8, -3, 7], (3,))
//
// with the DType taken from the element type.

/// Trait implemented by Rust scalar types that can populate a tensor value.
pub trait WithDType: Copy + Send + Sync + 'static + num_traits::NumCast + fmt::Debug {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).unwrap_or(f64::NAN)
    }

    /// Convert this value to i64. Floats truncate toward zero.
    fn to_i64(self) -> i64 {
        num_traits::cast(self).unwrap_or(0)
    }
}

impl WithDType for i8 {
    const DTYPE: DType = DType::I8;
}

impl WithDType for i16 {
    const DTYPE: DType = DType::I16;
}

impl WithDType for i32 {
    const DTYPE: DType = DType::I32;
}

impl WithDType for i64 {
    const DTYPE: DType = DType::I64;
}

impl WithDType for u8 {
    const DTYPE: DType = DType::U8;
}

impl WithDType for u32 {
    const DTYPE: DType = DType::U32;
}

impl WithDType for f32 {
    const DTYPE: DType = DType::F32;
}

impl WithDType for f64 {
    const DTYPE: DType = DType::F64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_bits() {
        assert_eq!(DType::I8.bits(), 8);
        assert_eq!(DType::I32.bits(), 32);
        assert_eq!(DType::I64.bits(), 64);
        assert_eq!(DType::F32.bits(), 32);
    }

    #[test]
    fn test_int_ranges() {
        assert_eq!(DType::I8.int_min(), Some(-128));
        assert_eq!(DType::I8.int_max(), Some(127));
        assert_eq!(DType::U8.int_max(), Some(255));
        assert_eq!(DType::F32.int_max(), None);
        assert!(DType::I8.holds(-128));
        assert!(!DType::I8.holds(128));
        assert!(!DType::F32.holds(0));
    }

    #[test]
    fn test_wrap_and_saturate() {
        assert_eq!(DType::I8.wrap(128), -128);
        assert_eq!(DType::I8.wrap(-129), 127);
        assert_eq!(DType::U8.wrap(-1), 255);
        assert_eq!(DType::I8.saturate(300), 127);
        assert_eq!(DType::I8.saturate(-300), -128);
        assert_eq!(DType::I64.saturate(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_with_dtype_conversions() {
        assert_eq!(i8::DTYPE, DType::I8);
        assert_eq!((-5i8).to_i64(), -5);
        assert_eq!(2.75f32.to_i64(), 2);
        assert_eq!((-2.75f64).to_i64(), -2);
        assert_eq!(7i32.to_f64(), 7.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::I8.to_string(), "int8");
        assert_eq!(DType::F32.to_string(), "float32");
    }
}
