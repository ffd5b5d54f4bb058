// Primitive tensor operators
//
// Constructors build call nodes; `register` adds the descriptors (type
// relation plus interpreter kernel) to a registry. None of these operators
// has a canonicalizer: they are what canonicalization lowers to.

use qir_core::{Attrs, CastAttrs, DType, Expr, Literal, ReduceAttrs, Result};

use super::relations::{broadcast_rel, cast_rel, identity_rel, int_broadcast_rel, reduce_rel};
use super::{KernelFn, OpDescriptor, OpRegistry, TypeRelFn};
use crate::interp::kernels;

pub const CAST: &str = "cast";
pub const ADD: &str = "add";
pub const SUBTRACT: &str = "subtract";
pub const MULTIPLY: &str = "multiply";
pub const DIVIDE: &str = "divide";
pub const NEGATIVE: &str = "negative";
pub const ROUND: &str = "round";
pub const LEFT_SHIFT: &str = "left_shift";
pub const RIGHT_SHIFT: &str = "right_shift";
pub const MAX: &str = "max";
pub const SUM: &str = "sum";

pub fn cast(data: Expr, dtype: DType) -> Expr {
    Expr::call(CAST, vec![data], Attrs::Cast(CastAttrs { dtype }))
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(ADD, vec![lhs, rhs], Attrs::None)
}

pub fn subtract(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(SUBTRACT, vec![lhs, rhs], Attrs::None)
}

pub fn multiply(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(MULTIPLY, vec![lhs, rhs], Attrs::None)
}

/// Integer division truncates toward zero.
pub fn divide(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(DIVIDE, vec![lhs, rhs], Attrs::None)
}

pub fn negative(data: Expr) -> Expr {
    Expr::call(NEGATIVE, vec![data], Attrs::None)
}

/// Round half away from zero.
pub fn round(data: Expr) -> Expr {
    Expr::call(ROUND, vec![data], Attrs::None)
}

pub fn left_shift(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(LEFT_SHIFT, vec![lhs, rhs], Attrs::None)
}

/// Arithmetic (sign-propagating) right shift.
pub fn right_shift(lhs: Expr, rhs: Expr) -> Expr {
    Expr::call(RIGHT_SHIFT, vec![lhs, rhs], Attrs::None)
}

pub fn max(data: Expr, axis: Vec<i64>, keep_dims: bool, exclude: bool) -> Expr {
    Expr::call(MAX, vec![data], reduce_attrs(axis, keep_dims, exclude))
}

pub fn sum(data: Expr, axis: Vec<i64>, keep_dims: bool, exclude: bool) -> Expr {
    Expr::call(SUM, vec![data], reduce_attrs(axis, keep_dims, exclude))
}

fn reduce_attrs(axis: Vec<i64>, keep_dims: bool, exclude: bool) -> Attrs {
    Attrs::Reduce(ReduceAttrs {
        axis,
        keep_dims,
        exclude,
    })
}

pub fn const_i64(value: i64) -> Expr {
    Expr::constant(Literal::Int {
        value,
        dtype: DType::I64,
    })
}

pub fn const_i32(value: i32) -> Expr {
    Expr::constant(Literal::Int {
        value: value.into(),
        dtype: DType::I32,
    })
}

pub fn const_f32(value: f32) -> Expr {
    Expr::constant(Literal::Float {
        value: value.into(),
        dtype: DType::F32,
    })
}

pub(crate) fn register(registry: &mut OpRegistry) -> Result<()> {
    let binary = |name: &'static str, rel: TypeRelFn, description: &'static str, kernel: KernelFn| {
        OpDescriptor::new(name, "Broadcast", rel)
            .with_description(description)
            .with_num_inputs(2)
            .with_argument("lhs", "Tensor", "The left operand.")
            .with_argument("rhs", "Tensor", "The right operand, broadcast against lhs.")
            .with_kernel(kernel)
    };
    registry.register(binary(ADD, broadcast_rel, "Elementwise addition.", kernels::add))?;
    registry.register(binary(
        SUBTRACT,
        broadcast_rel,
        "Elementwise subtraction.",
        kernels::subtract,
    ))?;
    registry.register(binary(
        MULTIPLY,
        broadcast_rel,
        "Elementwise multiplication.",
        kernels::multiply,
    ))?;
    registry.register(binary(
        DIVIDE,
        broadcast_rel,
        "Elementwise division, truncating for integers.",
        kernels::divide,
    ))?;
    registry.register(binary(
        LEFT_SHIFT,
        int_broadcast_rel,
        "Elementwise left shift of integers.",
        kernels::left_shift,
    ))?;
    registry.register(binary(
        RIGHT_SHIFT,
        int_broadcast_rel,
        "Elementwise arithmetic right shift of integers.",
        kernels::right_shift,
    ))?;

    let unary = |name: &'static str, description: &'static str, kernel: KernelFn| {
        OpDescriptor::new(name, "Identity", identity_rel)
            .with_description(description)
            .with_num_inputs(1)
            .with_argument("data", "Tensor", "The input tensor.")
            .with_kernel(kernel)
    };
    registry.register(unary(NEGATIVE, "Elementwise negation.", kernels::negative))?;
    registry.register(unary(
        ROUND,
        "Round to the nearest integer, halves away from zero.",
        kernels::round,
    ))?;

    registry.register(
        OpDescriptor::new(CAST, "Cast", cast_rel)
            .with_description("Convert the elements of a tensor to another dtype.")
            .with_num_inputs(1)
            .with_argument("data", "Tensor", "The input tensor.")
            .with_kernel(kernels::cast),
    )?;

    let reduce = |name: &'static str, description: &'static str, kernel: KernelFn| {
        OpDescriptor::new(name, "Reduce", reduce_rel)
            .with_description(description)
            .with_num_inputs(1)
            .with_argument("data", "Tensor", "The tensor to reduce.")
            .with_kernel(kernel)
    };
    registry.register(reduce(MAX, "Maximum over the given axes.", kernels::max))?;
    registry.register(reduce(SUM, "Sum over the given axes.", kernels::sum))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qir_core::ExprKind;

    #[test]
    fn test_constants_carry_dtype() {
        match const_i32(-128).kind() {
            ExprKind::Constant(Literal::Int { value, dtype }) => {
                assert_eq!(*value, -128);
                assert_eq!(*dtype, DType::I32);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(const_f32(0.5).to_string(), "0.5f32");
    }

    #[test]
    fn test_reduce_constructor_attrs() {
        let e = sum(const_i64(1), vec![-1], true, false);
        let call = e.as_call().unwrap();
        assert_eq!(call.op, SUM);
        let attrs = call.attrs.as_reduce(SUM).unwrap();
        assert_eq!(attrs.axis, vec![-1]);
        assert!(attrs.keep_dims);
    }

    #[test]
    fn test_descriptors_document_every_operand() {
        let mut reg = OpRegistry::new();
        register(&mut reg).unwrap();
        for name in reg.names() {
            let desc = reg.get(name).unwrap();
            assert_eq!(desc.arguments.len(), desc.num_inputs, "{name}");
            assert!(desc.kernel.is_some(), "{name}");
            assert!(!desc.non_computational);
        }
    }
}
