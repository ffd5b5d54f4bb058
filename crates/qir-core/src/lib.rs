//! # qir-core
//!
//! Data model of the qir tensor IR.
//!
//! This crate provides:
//! - [`DType`]: element types (int8 ... int64, uint8, uint32, float32, float64)
//! - [`Shape`]: concrete shapes of runtime values, broadcasting, reduction
//! - [`SymbolicShape`] / [`SymDim`]: shapes with named or unknown dimensions
//! - [`TensorType`] / [`Type`]: what type inference assigns to expressions
//! - [`Expr`]: immutable, `Arc`-shared expression DAG nodes
//! - [`Attrs`]: per-call attribute records
//! - [`TensorValue`]: concrete tensors used by the reference interpreter
//! - [`Error`] / [`Result`]: the error type shared by all qir crates

pub mod attrs;
pub mod dtype;
pub mod dynamic_shape;
pub mod error;
pub mod expr;
pub mod shape;
pub mod tensor;
pub mod ty;

pub use attrs::{Attrs, CastAttrs, ReduceAttrs, RequantizeAttrs, Rounding, SoftmaxAttrs};
pub use dtype::{DType, WithDType};
pub use dynamic_shape::{ShapeEnv, SymDim, SymbolicShape};
pub use error::{Error, Result};
pub use expr::{Call, Expr, ExprId, ExprKind, Literal, Var};
pub use shape::Shape;
pub use tensor::{Buffer, TensorValue};
pub use ty::{is_scalar_type, TensorType, Type, TypeVar};
