use qir_core::{
    shape::normalize_axis, Attrs, DType, Error, Expr, RequantizeAttrs, Result, Rounding,
    SymbolicShape, TensorType, Type,
};

use super::REQUANTIZE;
use crate::interp::kernels;
use crate::op::relations::expect_slots;
use crate::op::{OpDescriptor, Resolution};
use crate::pass::TypeReporter;

/// Build a `qnn.requantize` call with the default rounding mode.
#[allow(clippy::too_many_arguments)]
pub fn requantize(
    data: Expr,
    input_shape: SymbolicShape,
    input_scale: Expr,
    input_zero_point: Expr,
    output_scale: Expr,
    output_zero_point: Expr,
    out_dtype: DType,
    axis: i64,
) -> Expr {
    requantize_with(
        data,
        input_scale,
        input_zero_point,
        output_scale,
        output_zero_point,
        RequantizeAttrs {
            axis,
            out_dtype,
            rounding: Rounding::default(),
            input_shape,
        },
    )
}

/// Build a `qnn.requantize` call with explicit attributes.
pub fn requantize_with(
    data: Expr,
    input_scale: Expr,
    input_zero_point: Expr,
    output_scale: Expr,
    output_zero_point: Expr,
    attrs: RequantizeAttrs,
) -> Expr {
    Expr::call(
        REQUANTIZE,
        vec![
            data,
            input_scale,
            input_zero_point,
            output_scale,
            output_zero_point,
        ],
        Attrs::Requantize(attrs),
    )
}

const PARAMS: [(&str, DType); 4] = [
    ("input_scale", DType::F32),
    ("input_zero_point", DType::I32),
    ("output_scale", DType::F32),
    ("output_zero_point", DType::I32),
];

/// Type relation of `qnn.requantize`.
///
/// Each quantization parameter is a scalar, or a vector holding one value
/// per channel along `axis`.
pub fn requantize_rel(
    types: &[Type],
    attrs: &Attrs,
    reporter: &mut TypeReporter,
) -> Result<Resolution> {
    expect_slots(REQUANTIZE, types, 6)?;
    let rq = attrs.as_requantize(REQUANTIZE)?;
    if !rq.out_dtype.is_int() {
        return Err(Error::msg(format!(
            "{REQUANTIZE}: out_dtype must be an integer type, got {}",
            rq.out_dtype
        )));
    }
    let Some(data) = types[0].as_tensor() else {
        return Ok(Resolution::Deferred);
    };
    if !data.dtype.is_int() {
        return Err(Error::DTypeMismatch {
            expected: DType::I32,
            got: data.dtype,
        });
    }
    let params = &types[1..5];
    if params.iter().any(Type::is_incomplete) {
        return Ok(Resolution::Deferred);
    }

    for (slot, &(param, dtype)) in params.iter().zip(PARAMS.iter()) {
        if let Type::Tensor(t) = slot {
            check_param(param, dtype, t, data, rq.axis)?;
        }
    }

    let out = Type::Tensor(data.with_dtype(rq.out_dtype));
    reporter.assign(&types[5], &out)?;
    Ok(Resolution::Solved)
}

fn check_param(
    param: &'static str,
    dtype: DType,
    t: &TensorType,
    data: &TensorType,
    axis: i64,
) -> Result<()> {
    let scalar_expected = || Error::ScalarExpected {
        param,
        expected: dtype,
        got: t.clone(),
    };
    if t.dtype != dtype {
        return Err(scalar_expected());
    }
    match t.rank() {
        0 => Ok(()),
        1 => {
            let axis = normalize_axis(axis, data.rank())?;
            let channels = &data.shape.dims()[axis];
            if t.shape.dims()[0].unify(channels).is_some() {
                Ok(())
            } else {
                Err(Error::ShapeMismatch {
                    expected: SymbolicShape::new(vec![channels.clone()]),
                    got: t.shape.clone(),
                })
            }
        }
        _ => Err(scalar_expected()),
    }
}

pub(super) fn descriptor() -> OpDescriptor {
    OpDescriptor::new(REQUANTIZE, "Requantize", requantize_rel)
        .with_description("Map quantized integers from one scale and zero point to another.")
        .with_num_inputs(5)
        .with_argument("data", "Tensor", "The quantized input.")
        .with_argument("input_scale", "Tensor", "Scale of the input quantization.")
        .with_argument("input_zero_point", "Tensor", "Zero point of the input quantization.")
        .with_argument("output_scale", "Tensor", "Scale of the output quantization.")
        .with_argument(
            "output_zero_point",
            "Tensor",
            "Zero point of the output quantization.",
        )
        .with_support_level(11)
        .with_kernel(kernels::requantize)
}
