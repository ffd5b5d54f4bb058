// Quantized (QNN) operators
//
// Quantized tensors carry int8 data plus a real-valued affine mapping
// `real = scale * (q - zero_point)`. The mapping travels as explicit scalar
// operands: scales are rank-0 float32 tensors, zero points rank-0 int32
// tensors.
//
//   qnn.softmax     - non-computational; type-checked, then lowered by
//                     canonicalization to integer-only primitives
//   qnn.requantize  - primitive; maps integers between two quantization
//                     parameter sets

mod requantize;
mod softmax;

pub use requantize::{requantize, requantize_rel, requantize_with};
pub use softmax::{canonicalize_softmax, softmax, softmax_rel};

use qir_core::Result;

use super::OpRegistry;

pub const SOFTMAX: &str = "qnn.softmax";
pub const REQUANTIZE: &str = "qnn.requantize";

pub(crate) fn register(registry: &mut OpRegistry) -> Result<()> {
    registry.register(softmax::descriptor())?;
    registry.register(requantize::descriptor())?;
    Ok(())
}
