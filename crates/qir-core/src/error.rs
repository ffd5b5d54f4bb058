use crate::dtype::DType;
use crate::dynamic_shape::SymbolicShape;
use crate::ty::TensorType;

/// All errors that can occur within qir.
///
/// Type errors (dtype/shape/rank mismatches, malformed quantization
/// parameters) abort type inference for the enclosing expression. Evaluation
/// errors (overflow, division by zero) come from the reference interpreter.
/// A single error type keeps propagation with `?` uniform across crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape mismatch between two tensor types.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        expected: SymbolicShape,
        got: SymbolicShape,
    },

    /// Operation requires a specific rank.
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// DType mismatch between an operand and what the operator requires.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    /// A quantization parameter was not a scalar of the required dtype.
    #[error("{param} must be a scalar {expected} tensor, got {got}")]
    ScalarExpected {
        param: &'static str,
        expected: DType,
        got: TensorType,
    },

    /// Axis index out of range for the tensor's rank.
    #[error("axis {dim} out of range for tensor with {rank} dimensions")]
    DimOutOfRange { dim: i64, rank: usize },

    /// A call carried the wrong number of operands.
    #[error("operator {op} expects {expected} operands, got {got}")]
    ArityMismatch {
        op: String,
        expected: usize,
        got: usize,
    },

    /// A call carried attributes of the wrong kind.
    #[error("operator {op} expects {expected} attributes")]
    AttrsMismatch { op: String, expected: &'static str },

    /// No operator with this name is registered.
    #[error("unknown operator: {0}")]
    UnknownOp(String),

    /// An operator was registered twice.
    #[error("operator already registered: {0}")]
    DuplicateOp(String),

    /// Type inference stopped with a relation still deferred.
    #[error("cannot resolve the type of {op}: operand types are incomplete")]
    Unresolved { op: String },

    /// The interpreter was asked to evaluate an operator that only exists
    /// to be rewritten.
    #[error("operator {0} is non-computational and must be canonicalized before evaluation")]
    NonComputational(String),

    /// A variable had no value bound at evaluation time.
    #[error("no value bound for variable {0}")]
    UnboundVar(String),

    /// Integer arithmetic left the range of its dtype.
    #[error("integer overflow in {op} ({dtype})")]
    Overflow { op: &'static str, dtype: DType },

    /// Integer division by zero.
    #[error("integer division by zero")]
    DivisionByZero,

    /// Tried to read a scalar from a non-scalar tensor value.
    #[error("not a scalar: tensor has shape {shape}")]
    NotAScalar { shape: crate::Shape },

    /// Element count mismatch when building a tensor value.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: crate::Shape,
        expected: usize,
        got: usize,
    },

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout qir.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted error message.
/// Usage: `bail!("unsupported dtype {}", dtype)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
