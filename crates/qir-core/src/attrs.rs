use std::fmt;

use crate::dtype::DType;
use crate::dynamic_shape::SymbolicShape;
use crate::error::{Error, Result};

// Attrs: static per-call parameters
//
// Operands are expressions; everything an operator needs that is known at
// construction time (axes, target dtypes, rounding mode) lives in the call's
// attribute record instead. Each operator family owns one variant.

/// Attribute record attached to a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Attrs {
    None,
    Softmax(SoftmaxAttrs),
    Reduce(ReduceAttrs),
    Cast(CastAttrs),
    Requantize(RequantizeAttrs),
}

/// Attributes of `qnn.softmax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftmaxAttrs {
    /// Axis the softmax normalizes over. Negative values count from the end.
    pub axis: i64,
}

impl Default for SoftmaxAttrs {
    fn default() -> Self {
        Self { axis: -1 }
    }
}

/// Attributes of reductions (`max`, `sum`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceAttrs {
    /// Axes to reduce. Empty means all axes.
    pub axis: Vec<i64>,
    /// Keep reduced axes as size-1 dimensions.
    pub keep_dims: bool,
    /// Reduce over every axis *except* those listed.
    pub exclude: bool,
}

/// Attributes of `cast`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastAttrs {
    pub dtype: DType,
}

/// Rounding applied when requantize lands between two integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Ties round toward positive infinity.
    #[default]
    Upward,
    /// Ties round away from zero.
    ToNearest,
}

/// Attributes of `qnn.requantize`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequantizeAttrs {
    /// Channel axis for per-channel scales; ignored for per-tensor scales.
    pub axis: i64,
    /// Integer dtype of the result.
    pub out_dtype: DType,
    pub rounding: Rounding,
    /// Shape of the tensor being requantized, kept for layout decisions.
    pub input_shape: SymbolicShape,
}

impl Attrs {
    /// Short name of the attribute kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Attrs::None => "no",
            Attrs::Softmax(_) => "softmax",
            Attrs::Reduce(_) => "reduce",
            Attrs::Cast(_) => "cast",
            Attrs::Requantize(_) => "requantize",
        }
    }

    pub fn as_softmax(&self, op: &str) -> Result<&SoftmaxAttrs> {
        match self {
            Attrs::Softmax(a) => Ok(a),
            _ => Err(mismatch(op, "softmax")),
        }
    }

    pub fn as_reduce(&self, op: &str) -> Result<&ReduceAttrs> {
        match self {
            Attrs::Reduce(a) => Ok(a),
            _ => Err(mismatch(op, "reduce")),
        }
    }

    pub fn as_cast(&self, op: &str) -> Result<&CastAttrs> {
        match self {
            Attrs::Cast(a) => Ok(a),
            _ => Err(mismatch(op, "cast")),
        }
    }

    pub fn as_requantize(&self, op: &str) -> Result<&RequantizeAttrs> {
        match self {
            Attrs::Requantize(a) => Ok(a),
            _ => Err(mismatch(op, "requantize")),
        }
    }
}

fn mismatch(op: &str, expected: &'static str) -> Error {
    Error::AttrsMismatch {
        op: op.to_string(),
        expected,
    }
}

impl fmt::Display for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attrs::None => Ok(()),
            Attrs::Softmax(a) => write!(f, "axis={}", a.axis),
            Attrs::Reduce(a) => write!(
                f,
                "axis={:?}, keep_dims={}, exclude={}",
                a.axis, a.keep_dims, a.exclude
            ),
            Attrs::Cast(a) => write!(f, "dtype={}", a.dtype),
            Attrs::Requantize(a) => write!(
                f,
                "axis={}, out_dtype={}, rounding={:?}, input_shape={}",
                a.axis, a.out_dtype, a.rounding, a.input_shape
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_default_axis() {
        assert_eq!(SoftmaxAttrs::default().axis, -1);
    }

    #[test]
    fn test_accessor_mismatch() {
        let attrs = Attrs::Cast(CastAttrs { dtype: DType::I64 });
        assert!(attrs.as_cast("cast").is_ok());
        let err = attrs.as_softmax("qnn.softmax").unwrap_err();
        assert!(matches!(err, Error::AttrsMismatch { expected: "softmax", .. }));
    }

    #[test]
    fn test_display() {
        let attrs = Attrs::Reduce(ReduceAttrs {
            axis: vec![-1],
            keep_dims: true,
            exclude: false,
        });
        assert_eq!(attrs.to_string(), "axis=[-1], keep_dims=true, exclude=false");
    }
}
