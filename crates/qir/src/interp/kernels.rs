// Kernels: evaluation of primitive operators on concrete values
//
// ARITHMETIC RULES:
//
//   add, subtract, multiply, negative  checked; leaving the dtype range is
//                                      Error::Overflow
//   divide                             integers truncate toward zero; a zero
//                                      divisor is Error::DivisionByZero
//   right_shift                        arithmetic; amounts >= 64 give the
//                                      sign fill (0 or -1)
//   left_shift                         Error::Overflow if a set bit would be
//                                      shifted out; a negative amount shifts
//                                      right instead
//   round                              half away from zero
//   cast                               int->int wraps, float->int truncates
//                                      and saturates, NaN becomes 0
//
// Floats are computed in f64; f32 results are rounded back to f32 when the
// value is built.

use qir_core::{
    shape::normalize_axis, Attrs, Buffer, DType, Error, Literal, Result, Rounding, Shape,
    TensorValue,
};

use crate::op::qnn::REQUANTIZE;
use crate::op::relations::reduce_axes;
use crate::op::tensor::{
    ADD, CAST, DIVIDE, LEFT_SHIFT, MAX, MULTIPLY, NEGATIVE, RIGHT_SHIFT, ROUND, SUBTRACT, SUM,
};

/// Materialize a literal as a rank-0 value.
pub fn literal(lit: &Literal) -> Result<TensorValue> {
    match *lit {
        Literal::Int { value, dtype } => TensorValue::scalar_int(value, dtype),
        Literal::Float { value, dtype } => TensorValue::scalar_float(value, dtype),
    }
}

pub fn add(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    binary(ADD, args, i64::checked_add, Some(|a: f64, b: f64| a + b))
}

pub fn subtract(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    binary(SUBTRACT, args, i64::checked_sub, Some(|a: f64, b: f64| a - b))
}

pub fn multiply(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    binary(MULTIPLY, args, i64::checked_mul, Some(|a: f64, b: f64| a * b))
}

pub fn divide(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    if let [_, rhs] = args {
        if rhs.ints().is_some_and(|v| v.contains(&0)) {
            return Err(Error::DivisionByZero);
        }
    }
    binary(DIVIDE, args, i64::checked_div, Some(|a: f64, b: f64| a / b))
}

pub fn left_shift(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    binary(LEFT_SHIFT, args, shift_left, None)
}

pub fn right_shift(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    binary(RIGHT_SHIFT, args, shift_right, None)
}

fn shl(a: i64, s: u64) -> Option<i64> {
    if a == 0 {
        return Some(0);
    }
    if s >= 64 {
        return None;
    }
    let r = a << s;
    (r >> s == a).then_some(r)
}

fn sar(a: i64, s: u64) -> i64 {
    a >> s.min(63)
}

fn shift_left(a: i64, s: i64) -> Option<i64> {
    if s >= 0 {
        shl(a, s.unsigned_abs())
    } else {
        Some(sar(a, s.unsigned_abs()))
    }
}

fn shift_right(a: i64, s: i64) -> Option<i64> {
    if s >= 0 {
        Some(sar(a, s.unsigned_abs()))
    } else {
        shl(a, s.unsigned_abs())
    }
}

pub fn negative(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    let x = unary_arg(NEGATIVE, args)?;
    match x.buffer() {
        Buffer::Int(v) => {
            let out = v
                .iter()
                .map(|&a| checked(NEGATIVE, x.dtype(), a.checked_neg()))
                .collect::<Result<Vec<_>>>()?;
            TensorValue::from_ints(out, x.shape().clone(), x.dtype())
        }
        Buffer::Float(v) => {
            TensorValue::from_floats(v.iter().map(|a| -a).collect(), x.shape().clone(), x.dtype())
        }
    }
}

pub fn round(args: &[TensorValue], _attrs: &Attrs) -> Result<TensorValue> {
    let x = unary_arg(ROUND, args)?;
    match x.buffer() {
        Buffer::Int(_) => Ok(x.clone()),
        Buffer::Float(v) => TensorValue::from_floats(
            v.iter().map(|a| a.round()).collect(),
            x.shape().clone(),
            x.dtype(),
        ),
    }
}

pub fn cast(args: &[TensorValue], attrs: &Attrs) -> Result<TensorValue> {
    let x = unary_arg(CAST, args)?;
    let target = attrs.as_cast(CAST)?.dtype;
    let shape = x.shape().clone();
    match (x.buffer(), target.is_float()) {
        (Buffer::Int(v), false) => {
            TensorValue::from_ints(v.iter().map(|&a| target.wrap(a)).collect(), shape, target)
        }
        (Buffer::Int(v), true) => {
            TensorValue::from_floats(v.iter().map(|&a| a as f64).collect(), shape, target)
        }
        (Buffer::Float(v), true) => TensorValue::from_floats(v.clone(), shape, target),
        (Buffer::Float(v), false) => TensorValue::from_ints(
            v.iter().map(|&a| float_to_int(a, target)).collect(),
            shape,
            target,
        ),
    }
}

fn float_to_int(a: f64, dtype: DType) -> i64 {
    if a.is_nan() {
        0
    } else {
        dtype.saturate(a.trunc() as i64)
    }
}

pub fn max(args: &[TensorValue], attrs: &Attrs) -> Result<TensorValue> {
    reduce(
        MAX,
        args,
        attrs,
        |a, b| Some(a.max(b)),
        f64::max,
        None,
    )
}

pub fn sum(args: &[TensorValue], attrs: &Attrs) -> Result<TensorValue> {
    reduce(
        SUM,
        args,
        attrs,
        i64::checked_add,
        |a, b| a + b,
        Some((0, 0.0)),
    )
}

/// Requantize integers from one (scale, zero point) pair to another.
///
/// Each element becomes `round((q - zp_in) * s_in / s_out) + zp_out`,
/// clamped to the output dtype. Parameters are scalars or per-channel
/// vectors along the `axis` attribute.
pub fn requantize(args: &[TensorValue], attrs: &Attrs) -> Result<TensorValue> {
    let [data, input_scale, input_zero_point, output_scale, output_zero_point] = args else {
        return Err(arity(REQUANTIZE, 5, args.len()));
    };
    let rq = attrs.as_requantize(REQUANTIZE)?;
    let q = data.ints().ok_or(Error::DTypeMismatch {
        expected: DType::I32,
        got: data.dtype(),
    })?;

    let params: Vec<Vec<f64>> = [input_scale, input_zero_point, output_scale, output_zero_point]
        .iter()
        .map(|p| p.to_f64_vec())
        .collect();

    let (channels, stride) = if params.iter().any(|p| p.len() != 1) {
        let axis = normalize_axis(rq.axis, data.rank())?;
        (data.dims()[axis], data.shape().stride_contiguous()[axis])
    } else {
        (1, 1)
    };
    if let Some(bad) = params.iter().find(|p| p.len() != 1 && p.len() != channels) {
        return Err(Error::msg(format!(
            "{REQUANTIZE}: per-channel parameter has {} values for {channels} channels",
            bad.len()
        )));
    }
    let pick = |p: &[f64], c: usize| if p.len() == 1 { p[0] } else { p[c] };

    let out = q
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = (i / stride) % channels;
            let real = (v as f64 - pick(&params[1], c)) * pick(&params[0], c) / pick(&params[2], c);
            let rounded = match rq.rounding {
                Rounding::Upward => (real + 0.5).floor(),
                Rounding::ToNearest => real.round(),
            };
            rq.out_dtype.saturate((rounded + pick(&params[3], c)) as i64)
        })
        .collect();
    TensorValue::from_ints(out, data.shape().clone(), rq.out_dtype)
}

// Helpers

fn arity(op: &str, expected: usize, got: usize) -> Error {
    Error::ArityMismatch {
        op: op.to_string(),
        expected,
        got,
    }
}

fn unary_arg<'a>(op: &str, args: &'a [TensorValue]) -> Result<&'a TensorValue> {
    match args {
        [x] => Ok(x),
        _ => Err(arity(op, 1, args.len())),
    }
}

fn checked(op: &'static str, dtype: DType, v: Option<i64>) -> Result<i64> {
    match v {
        Some(v) if dtype.holds(v) => Ok(v),
        _ => Err(Error::Overflow { op, dtype }),
    }
}

fn binary(
    op: &'static str,
    args: &[TensorValue],
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: Option<fn(f64, f64) -> f64>,
) -> Result<TensorValue> {
    let [lhs, rhs] = args else {
        return Err(arity(op, 2, args.len()));
    };
    if lhs.dtype() != rhs.dtype() {
        return Err(Error::DTypeMismatch {
            expected: lhs.dtype(),
            got: rhs.dtype(),
        });
    }
    let dtype = lhs.dtype();
    let (shape, pairs) = broadcast_pairs(lhs.shape(), rhs.shape())?;
    match (lhs.buffer(), rhs.buffer()) {
        (Buffer::Int(a), Buffer::Int(b)) => {
            let out = pairs
                .iter()
                .map(|&(i, j)| checked(op, dtype, int_op(a[i], b[j])))
                .collect::<Result<Vec<_>>>()?;
            TensorValue::from_ints(out, shape, dtype)
        }
        (Buffer::Float(a), Buffer::Float(b)) => match float_op {
            Some(f) => {
                let out = pairs.iter().map(|&(i, j)| f(a[i], b[j])).collect();
                TensorValue::from_floats(out, shape, dtype)
            }
            None => Err(Error::msg(format!("{op} is not defined for {dtype}"))),
        },
        _ => Err(Error::msg(format!("{op}: mixed integer and float operands"))),
    }
}

/// Output shape of a broadcast plus, for every output element, the linear
/// indices it reads from each operand.
fn broadcast_pairs(lhs: &Shape, rhs: &Shape) -> Result<(Shape, Vec<(usize, usize)>)> {
    let out = Shape::broadcast_shape(lhs, rhs)?;
    let ls = lhs.broadcast_strides(&out);
    let rs = rhs.broadcast_strides(&out);
    let dims = out.dims();
    let pairs = (0..out.elem_count())
        .map(|linear| {
            let mut rem = linear;
            let (mut i, mut j) = (0, 0);
            for d in (0..dims.len()).rev() {
                let idx = rem % dims[d];
                rem /= dims[d];
                i += idx * ls[d];
                j += idx * rs[d];
            }
            (i, j)
        })
        .collect();
    Ok((out, pairs))
}

/// Fold every element into its output group. `empty` is the value of a group
/// that received no elements; `None` makes an empty group an error.
fn reduce(
    op: &'static str,
    args: &[TensorValue],
    attrs: &Attrs,
    int_fold: impl Fn(i64, i64) -> Option<i64>,
    float_fold: impl Fn(f64, f64) -> f64,
    empty: Option<(i64, f64)>,
) -> Result<TensorValue> {
    let x = unary_arg(op, args)?;
    let r = attrs.as_reduce(op)?;
    let axes = reduce_axes(x.rank(), &r.axis, r.exclude)?;
    let kept = x.shape().reduced(&axes, true);
    let out_shape = x.shape().reduced(&axes, r.keep_dims);
    let groups = group_of_each(x.shape(), &kept, &axes);
    let n = kept.elem_count();
    let empty_group = || Error::msg(format!("{op} over an empty axis"));

    match x.buffer() {
        Buffer::Int(v) => {
            let mut acc: Vec<Option<i64>> = vec![None; n];
            for (&g, &a) in groups.iter().zip(v) {
                acc[g] = Some(match acc[g] {
                    None => a,
                    Some(prev) => checked(op, x.dtype(), int_fold(prev, a))?,
                });
            }
            let out = acc
                .into_iter()
                .map(|a| a.or(empty.map(|e| e.0)).ok_or_else(empty_group))
                .collect::<Result<Vec<_>>>()?;
            TensorValue::from_ints(out, out_shape, x.dtype())
        }
        Buffer::Float(v) => {
            let mut acc: Vec<Option<f64>> = vec![None; n];
            for (&g, &a) in groups.iter().zip(v) {
                acc[g] = Some(match acc[g] {
                    None => a,
                    Some(prev) => float_fold(prev, a),
                });
            }
            let out = acc
                .into_iter()
                .map(|a| a.or(empty.map(|e| e.1)).ok_or_else(empty_group))
                .collect::<Result<Vec<_>>>()?;
            TensorValue::from_floats(out, out_shape, x.dtype())
        }
    }
}

/// Linear index in `kept` (the keep-dims reduced shape) for each element.
fn group_of_each(shape: &Shape, kept: &Shape, axes: &[usize]) -> Vec<usize> {
    let dims = shape.dims();
    let kept_strides = kept.stride_contiguous();
    (0..shape.elem_count())
        .map(|linear| {
            let mut rem = linear;
            let mut group = 0;
            for d in (0..dims.len()).rev() {
                let idx = rem % dims[d];
                rem /= dims[d];
                if !axes.contains(&d) {
                    group += idx * kept_strides[d];
                }
            }
            group
        })
        .collect()
}
