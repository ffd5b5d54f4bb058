use std::fmt;

use crate::dtype::DType;
use crate::dynamic_shape::SymbolicShape;

// Types: what type inference assigns to every expression
//
// A slot's type is either a fully known tensor type or an incomplete type
// variable. Relations read the slots of one call, defer while inputs are
// still variables, and bind variables once they can compute them.

/// An unresolved type slot, numbered by the solver that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?t{}", self.0)
    }
}

/// Shape and element dtype of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub shape: SymbolicShape,
    pub dtype: DType,
}

impl TensorType {
    pub fn new(shape: impl Into<SymbolicShape>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }

    /// A rank-0 tensor type.
    pub fn scalar(dtype: DType) -> Self {
        Self {
            shape: SymbolicShape::scalar(),
            dtype,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.rank() == 0
    }

    /// Same shape, different element type.
    pub fn with_dtype(&self, dtype: DType) -> Self {
        Self {
            shape: self.shape.clone(),
            dtype,
        }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor[{}, {}]", self.shape, self.dtype)
    }
}

/// The type of one slot: known tensor type, or a variable still to solve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Tensor(TensorType),
    Incomplete(TypeVar),
}

impl Type {
    pub fn scalar(dtype: DType) -> Self {
        Type::Tensor(TensorType::scalar(dtype))
    }

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Type::Tensor(t) => Some(t),
            Type::Incomplete(_) => None,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Type::Incomplete(_))
    }
}

impl From<TensorType> for Type {
    fn from(t: TensorType) -> Self {
        Type::Tensor(t)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor(t) => write!(f, "{t}"),
            Type::Incomplete(v) => write!(f, "{v}"),
        }
    }
}

/// Whether `ty` is a resolved rank-0 tensor of exactly `dtype`.
pub fn is_scalar_type(ty: &Type, dtype: DType) -> bool {
    matches!(ty, Type::Tensor(t) if t.is_scalar() && t.dtype == dtype)
}
