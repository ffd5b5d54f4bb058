//! # qir
//!
//! Integer-only quantized softmax for a small tensor IR.
//!
//! This is the top-level crate: operators, passes, and the reference
//! interpreter, on top of the data model in `qir-core`.
//!
//! ## Usage
//!
//! ```rust
//! use qir::prelude::*;
//!
//! # fn main() -> qir::Result<()> {
//! let registry = OpRegistry::with_builtins()?;
//! let ctx = PassContext::new(&registry);
//!
//! let data = Expr::var("data", TensorType::new(&[1usize, 4][..], DType::I8));
//! let input = QuantParams::new(0.1, 0);
//! let output = QuantParams::new(1.0 / 256.0, -128);
//! let sm = qnn::softmax(
//!     data,
//!     -1,
//!     input.scale_expr(),
//!     input.zero_point_expr(),
//!     output.scale_expr(),
//!     output.zero_point_expr(),
//! );
//!
//! let lowered = canonicalize(&sm, &ctx)?;
//! assert!(!lowered.contains_op(qnn::SOFTMAX));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `qir-core` | DType, Shape, symbolic shapes, TensorType, Expr, Attrs, TensorValue, Error |
//! | `qir` | Operator registry, type relations, inference, canonicalization, interpreter |
//!
//! ## Modules
//!
//! - [`op`]: operator descriptors, registry, primitive and quantized operators
//! - [`pass`]: type inference and canonicalization
//! - [`interp`]: reference evaluation with checked integer arithmetic
//! - [`quantize`]: quantization parameters, quantize/dequantize

/// Re-export core types.
pub use qir_core::{
    bail, Attrs, Buffer, CastAttrs, DType, Error, Expr, ExprId, ExprKind, Literal, ReduceAttrs,
    RequantizeAttrs, Result, Rounding, Shape, ShapeEnv, SoftmaxAttrs, SymDim, SymbolicShape,
    TensorType, TensorValue, Type, TypeVar, WithDType,
};

/// Operators: descriptors, registry, relations, constructors.
pub mod op;

/// Passes over expressions: type inference and canonicalization.
pub mod pass;

/// Reference interpreter.
pub mod interp;

/// Quantization parameters and tensor conversion.
pub mod quantize;

pub use op::{qnn, tensor};

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::interp::Interpreter;
    pub use crate::op::{qnn, tensor, OpDescriptor, OpRegistry, Resolution};
    pub use crate::pass::{
        canonicalize, canonicalize_all, infer_types, PassConfig, PassContext, TypedExpr,
    };
    pub use crate::quantize::{dequantize_tensor, quantize_tensor, QuantParams};
    pub use crate::{
        Attrs, DType, Error, Expr, Result, Shape, SoftmaxAttrs, SymDim, SymbolicShape, TensorType,
        TensorValue, Type,
    };
}
