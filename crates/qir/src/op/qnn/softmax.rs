// qnn.softmax: softmax over int8 data without floating point
//
// TYPE RULE
//
// Slots are [data, input_scale, input_zero_point, output_scale,
// output_zero_point, result]. The rule defers until the data type and all
// four quantization parameters are known, requires int8 data and scalar
// (f32, i32, f32, i32) parameters, pins the parameter slots to exactly those
// types, and gives the result the data's type.
//
// LOWERING (shift-based integer softmax)
//
// With q = data - zero_point widened to i64 and x0 = round(1 / scale), the
// integer x0 stands for one unit of real input. For each row:
//
//   x     = q - max(q)                        x <= 0
//   xp    = x + x/2 - x/16                    x * log2(e), approximately
//   quot  = xp / -x0,  rem = xp + quot * x0   integer and fractional part
//   xb    = rem/2 + x0                        x0 * 2^(rem/x0), linearized
//   exps  = xb << (N - quot)                  fixed point with N = 30
//   out   = ((2^M / sum(exps)) * exps) >> (M - BITS)
//
// `out` is the probability scaled by 2^BITS, so it is requantized from scale
// 1/2^BITS and zero point 0 to the caller's output parameters.
//
// RANGE
//
// x0 must be at least 1, so input scales above 2.0 make the row division
// fail with DivisionByZero at evaluation. Intermediates fit i64 while
// row_len * x0 * 2^N does: exps <= x0 * 2^N and the normalized product is
// at most 2^M.

use qir_core::{Attrs, DType, Error, Expr, Result, SoftmaxAttrs, TensorType, Type};

use super::{requantize, SOFTMAX};
use crate::op::relations::{expect_slots, identity_rel};
use crate::op::tensor::{
    add, cast, const_f32, const_i32, const_i64, divide, left_shift, max, multiply, negative,
    right_shift, round, subtract, sum,
};
use crate::op::{OpDescriptor, Resolution};
use crate::pass::TypeReporter;

/// Fixed-point fraction bits of the exponentials.
const N: i64 = 30;
/// Fraction bits of the normalizing reciprocal.
const M: i64 = 60;
/// Output bits.
const BITS: i64 = 8;

const PARAMS: [(&str, DType); 4] = [
    ("input_scale", DType::F32),
    ("input_zero_point", DType::I32),
    ("output_scale", DType::F32),
    ("output_zero_point", DType::I32),
];

/// Build a `qnn.softmax` call.
pub fn softmax(
    data: Expr,
    axis: i64,
    input_scale: Expr,
    input_zero_point: Expr,
    output_scale: Expr,
    output_zero_point: Expr,
) -> Expr {
    Expr::call(
        SOFTMAX,
        vec![
            data,
            input_scale,
            input_zero_point,
            output_scale,
            output_zero_point,
        ],
        Attrs::Softmax(SoftmaxAttrs { axis }),
    )
}

/// Type relation of `qnn.softmax`.
pub fn softmax_rel(types: &[Type], attrs: &Attrs, reporter: &mut TypeReporter) -> Result<Resolution> {
    expect_slots(SOFTMAX, types, 6)?;
    let Some(data) = types[0].as_tensor() else {
        return Ok(Resolution::Deferred);
    };
    if data.dtype != DType::I8 {
        return Err(Error::DTypeMismatch {
            expected: DType::I8,
            got: data.dtype,
        });
    }

    let params = &types[1..5];
    if params.iter().any(Type::is_incomplete) {
        return Ok(Resolution::Deferred);
    }
    for (slot, &(param, dtype)) in params.iter().zip(PARAMS.iter()) {
        if let Type::Tensor(t) = slot {
            if !t.is_scalar() || t.dtype != dtype {
                return Err(Error::ScalarExpected {
                    param,
                    expected: dtype,
                    got: t.clone(),
                });
            }
        }
    }
    for (slot, &(_, dtype)) in params.iter().zip(PARAMS.iter()) {
        reporter.assign(slot, &Type::scalar(dtype))?;
    }

    identity_rel(&[types[0].clone(), types[5].clone()], attrs, reporter)
}

/// Lower a `qnn.softmax` call to integer primitives and a requantize.
///
/// `arg_types[0]` must be the checked type of the data operand.
pub fn canonicalize_softmax(attrs: &Attrs, args: &[Expr], arg_types: &[TensorType]) -> Result<Expr> {
    let [data, input_scale, input_zero_point, output_scale, output_zero_point] = args else {
        return Err(Error::ArityMismatch {
            op: SOFTMAX.to_string(),
            expected: 5,
            got: args.len(),
        });
    };
    let axis = attrs.as_softmax(SOFTMAX)?.axis;
    let data_ty = arg_types
        .first()
        .ok_or_else(|| Error::msg(format!("{SOFTMAX}: missing checked type of data")))?;

    let q = subtract(
        cast(data.clone(), DType::I64),
        cast(input_zero_point.clone(), DType::I64),
    );
    let x0 = cast(round(divide(const_f32(1.0), input_scale.clone())), DType::I64);
    let x = subtract(q.clone(), max(q, vec![axis], true, false));

    let xp = subtract(
        add(x.clone(), right_shift(x.clone(), const_i64(1))),
        right_shift(x, const_i64(4)),
    );
    let neg_x0 = negative(x0.clone());
    let quot = divide(xp.clone(), neg_x0.clone());
    let rem = subtract(xp, multiply(quot.clone(), neg_x0));
    let xb = add(right_shift(rem, const_i64(1)), x0);
    let exps = left_shift(xb, subtract(const_i64(N), quot));

    let sums = sum(exps.clone(), vec![axis], true, false);
    let output = right_shift(
        multiply(divide(const_i64(1 << M), sums), exps),
        const_i64(M - BITS),
    );

    Ok(requantize(
        cast(output, DType::I32),
        data_ty.shape.clone(),
        const_f32(1.0 / (1u32 << BITS) as f32),
        const_i32(0),
        output_scale.clone(),
        output_zero_point.clone(),
        DType::I8,
        0,
    ))
}

pub(super) fn descriptor() -> OpDescriptor {
    OpDescriptor::new(SOFTMAX, "QSoftmax", softmax_rel)
        .with_description("Softmax over quantized int8 tensors.")
        .with_num_inputs(5)
        .with_argument("data", "Quantized Tensor", "The int8 input.")
        .with_argument("scale", "Tensor", "Scale of the input quantization.")
        .with_argument("zero_point", "Tensor", "Zero point of the input quantization.")
        .with_argument("output_scale", "Tensor", "Scale of the output quantization.")
        .with_argument(
            "output_zero_point",
            "Tensor",
            "Zero point of the output quantization.",
        )
        .with_support_level(11)
        .non_computational()
        .with_canonicalize(canonicalize_softmax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qir_core::SymDim;

    fn data(dtype: DType) -> Type {
        Type::Tensor(TensorType::new(&[1usize, 4][..], dtype))
    }

    fn params() -> Vec<Type> {
        PARAMS.iter().map(|&(_, d)| Type::scalar(d)).collect()
    }

    #[test]
    fn test_rel_accepts_and_types_result() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        let mut slots = vec![data(DType::I8)];
        slots.extend(params());
        slots.push(out.clone());
        let res = softmax_rel(&slots, &Attrs::Softmax(SoftmaxAttrs::default()), &mut r).unwrap();
        assert_eq!(res, Resolution::Solved);
        assert_eq!(r.resolve(&out), data(DType::I8));
    }

    #[test]
    fn test_rel_defers_on_incomplete_data() {
        let mut r = TypeReporter::new();
        let mut slots = vec![r.fresh()];
        slots.extend(params());
        slots.push(r.fresh());
        let res = softmax_rel(&slots, &Attrs::None, &mut r).unwrap();
        assert_eq!(res, Resolution::Deferred);
    }

    #[test]
    fn test_rel_checks_dtype_before_params() {
        let mut r = TypeReporter::new();
        let mut slots = vec![data(DType::I16)];
        slots.extend((0..4).map(|_| r.fresh()));
        slots.push(r.fresh());
        let err = softmax_rel(&slots, &Attrs::None, &mut r).unwrap_err();
        assert!(matches!(
            err,
            Error::DTypeMismatch {
                expected: DType::I8,
                got: DType::I16
            }
        ));
    }

    #[test]
    fn test_rel_defers_on_incomplete_param() {
        let mut r = TypeReporter::new();
        let mut slots = vec![data(DType::I8)];
        slots.extend(params());
        slots[3] = r.fresh();
        slots.push(r.fresh());
        let res = softmax_rel(&slots, &Attrs::None, &mut r).unwrap();
        assert_eq!(res, Resolution::Deferred);
    }

    #[test]
    fn test_rel_rejects_bad_params() {
        let mut r = TypeReporter::new();
        let mut slots = vec![data(DType::I8)];
        slots.extend(params());
        slots[2] = Type::scalar(DType::I64);
        slots.push(r.fresh());
        let err = softmax_rel(&slots, &Attrs::None, &mut r).unwrap_err();
        assert!(matches!(
            err,
            Error::ScalarExpected {
                param: "input_zero_point",
                ..
            }
        ));

        slots[2] = Type::scalar(DType::I32);
        slots[1] = Type::Tensor(TensorType::new(&[1usize][..], DType::F32));
        let err = softmax_rel(&slots, &Attrs::None, &mut r).unwrap_err();
        assert!(matches!(err, Error::ScalarExpected { param: "input_scale", .. }));
    }

    #[test]
    fn test_rel_slot_count() {
        let mut r = TypeReporter::new();
        let err = softmax_rel(&[data(DType::I8)], &Attrs::None, &mut r).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }

    #[test]
    fn test_canonicalize_structure() {
        let ty = TensorType::new(vec![SymDim::symbolic("Batch"), SymDim::Fixed(4)], DType::I8);
        let args = vec![
            Expr::var("data", ty.clone()),
            const_f32(0.1),
            const_i32(0),
            const_f32(1.0 / 256.0),
            const_i32(-128),
        ];
        let attrs = Attrs::Softmax(SoftmaxAttrs { axis: -1 });
        let out = canonicalize_softmax(&attrs, &args, &[ty.clone()]).unwrap();

        let call = out.as_call().unwrap();
        assert_eq!(call.op, super::super::REQUANTIZE);
        let rq = call.attrs.as_requantize(call.op).unwrap();
        assert_eq!(rq.out_dtype, DType::I8);
        assert_eq!(rq.axis, 0);
        assert_eq!(rq.input_shape, ty.shape);
        assert!(call.args[3].ptr_eq(&args[3]));
        assert!(call.args[4].ptr_eq(&args[4]));

        for op in ["max", "sum", "left_shift", "right_shift", "divide", "round"] {
            assert!(out.contains_op(op), "{op} missing");
        }
        let dump = out.dump();
        assert!(dump.contains("1152921504606846976i64"));
        assert!(dump.contains("52i64"));
        assert!(dump.contains("0.00390625f32"));
    }

    #[test]
    fn test_canonicalize_rejects_malformed_call() {
        let attrs = Attrs::Softmax(SoftmaxAttrs::default());
        let err = canonicalize_softmax(&attrs, &[const_i32(0)], &[]).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { expected: 5, got: 1, .. }));

        let args: Vec<Expr> = (0..5).map(|_| const_i32(0)).collect();
        let ty = TensorType::scalar(DType::I8);
        assert!(canonicalize_softmax(&Attrs::None, &args, &[ty]).is_err());
    }

    #[test]
    fn test_descriptor_metadata() {
        let desc = descriptor();
        assert_eq!(desc.num_inputs, 5);
        assert_eq!(desc.support_level, 11);
        assert_eq!(desc.type_rel_name, "QSoftmax");
        assert!(desc.non_computational);
        assert!(desc.canonicalize.is_some());
        assert!(desc.kernel.is_none());
        let names: Vec<_> = desc.arguments.iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            ["data", "scale", "zero_point", "output_scale", "output_zero_point"]
        );
    }
}
