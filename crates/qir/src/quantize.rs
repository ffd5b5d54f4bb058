// Quantization parameters and tensor conversion
//
// A quantized tensor stores integers q together with a scale and a zero
// point; the real value it represents is
//
//   real = (q - zero_point) * scale
//
// QnnSoftmax and requantize take these parameters as scalar operands, so
// `QuantParams` can also emit them as constant expressions of the dtypes the
// type rules require (float32 scale, int32 zero point).
//
// MODES:
//
//   - Symmetric: zero_point = 0, scale = max(|x|) / qmax
//   - Asymmetric: the real range [min, max] (widened to contain 0) maps onto
//     the full integer range of the dtype

use qir_core::{DType, Error, Expr, Result, Shape, TensorValue};

use crate::op::tensor::{const_f32, const_i32};

/// Per-tensor quantization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }

    /// Asymmetric parameters covering the real range `[min, max]`.
    pub fn from_min_max(min: f64, max: f64, dtype: DType) -> Result<Self> {
        let (qmin, qmax) = int_range(dtype)?;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(Error::msg(format!("invalid quantization range [{min}, {max}]")));
        }
        let lo = min.min(0.0);
        let hi = max.max(0.0);
        let mut scale = (hi - lo) / (qmax as f64 - qmin as f64);
        if scale == 0.0 {
            scale = 1.0;
        }
        let zero_point = dtype.saturate((qmin as f64 - lo / scale).round() as i64);
        let zero_point = i32::try_from(zero_point).map_err(|_| {
            Error::msg(format!("zero point {zero_point} for {dtype} does not fit int32"))
        })?;
        Ok(Self {
            scale: scale as f32,
            zero_point,
        })
    }

    /// Symmetric parameters for values in `[-absmax, absmax]`.
    pub fn symmetric(absmax: f64, dtype: DType) -> Result<Self> {
        let (_, qmax) = int_range(dtype)?;
        let scale = if absmax > 0.0 { absmax / qmax as f64 } else { 1.0 };
        Ok(Self::new(scale as f32, 0))
    }

    /// The scale as a rank-0 float32 constant.
    pub fn scale_expr(&self) -> Expr {
        const_f32(self.scale)
    }

    /// The zero point as a rank-0 int32 constant.
    pub fn zero_point_expr(&self) -> Expr {
        const_i32(self.zero_point)
    }

    /// Real value represented by one quantized integer.
    pub fn dequantize(&self, q: i64) -> f64 {
        (q - i64::from(self.zero_point)) as f64 * f64::from(self.scale)
    }
}

fn int_range(dtype: DType) -> Result<(i64, i64)> {
    match (dtype.int_min(), dtype.int_max()) {
        (Some(lo), Some(hi)) => Ok((lo, hi)),
        _ => Err(Error::msg(format!("{dtype} is not an integer dtype"))),
    }
}

/// Quantize real values into an integer tensor of `dtype`.
///
/// Values are rounded half away from zero and clamped to the dtype range.
pub fn quantize_tensor(
    values: &[f64],
    shape: impl Into<Shape>,
    params: &QuantParams,
    dtype: DType,
) -> Result<TensorValue> {
    int_range(dtype)?;
    let scale = f64::from(params.scale);
    let inv_scale = if scale.abs() < 1e-30 { 0.0 } else { 1.0 / scale };
    let zp = f64::from(params.zero_point);
    let q = values
        .iter()
        .map(|&v| dtype.saturate((v * inv_scale + zp).round() as i64))
        .collect();
    TensorValue::from_ints(q, shape, dtype)
}

/// Recover approximate real values from an integer tensor, as float32.
pub fn dequantize_tensor(tensor: &TensorValue, params: &QuantParams) -> Result<TensorValue> {
    let q = tensor.to_i64_vec()?;
    let real = q.into_iter().map(|v| params.dequantize(v)).collect();
    TensorValue::from_floats(real, tensor.shape().clone(), DType::F32)
}
