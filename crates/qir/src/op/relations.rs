// Generic type relations
//
// A relation receives the currently resolved slots `[inputs..., output]`.
// It returns `Deferred` while an input it needs is still a type variable,
// reports its conclusions through `TypeReporter::assign`, and fails with a
// typed error when the inputs are inconsistent.

use qir_core::{
    shape::normalize_axis, Attrs, DType, Error, Result, SymDim, SymbolicShape, TensorType, Type,
};

use super::Resolution;
use crate::pass::TypeReporter;

/// Fail unless the relation received exactly `expected` slots.
pub fn expect_slots(op: &str, types: &[Type], expected: usize) -> Result<()> {
    if types.len() == expected {
        Ok(())
    } else {
        Err(Error::ArityMismatch {
            op: op.to_string(),
            expected: expected.saturating_sub(1),
            got: types.len().saturating_sub(1),
        })
    }
}

/// `[a, out]`: the output has the input's type.
pub fn identity_rel(types: &[Type], _attrs: &Attrs, reporter: &mut TypeReporter) -> Result<Resolution> {
    expect_slots("Identity", types, 2)?;
    if types[0].is_incomplete() {
        return Ok(Resolution::Deferred);
    }
    reporter.assign(&types[1], &types[0])?;
    Ok(Resolution::Solved)
}

/// `[lhs, rhs, out]`: elementwise op over broadcast shapes, equal dtypes.
pub fn broadcast_rel(types: &[Type], _attrs: &Attrs, reporter: &mut TypeReporter) -> Result<Resolution> {
    expect_slots("Broadcast", types, 3)?;
    let (Some(lhs), Some(rhs)) = (types[0].as_tensor(), types[1].as_tensor()) else {
        return Ok(Resolution::Deferred);
    };
    let out = broadcast_type(lhs, rhs)?;
    reporter.assign(&types[2], &Type::Tensor(out))?;
    Ok(Resolution::Solved)
}

/// Like `broadcast_rel`, but both operands must be integer tensors.
pub fn int_broadcast_rel(
    types: &[Type],
    attrs: &Attrs,
    reporter: &mut TypeReporter,
) -> Result<Resolution> {
    expect_slots("IntBroadcast", types, 3)?;
    if let Some(t) = types[0].as_tensor() {
        if !t.dtype.is_int() {
            return Err(Error::DTypeMismatch {
                expected: DType::I64,
                got: t.dtype,
            });
        }
    }
    broadcast_rel(types, attrs, reporter)
}

fn broadcast_type(lhs: &TensorType, rhs: &TensorType) -> Result<TensorType> {
    if lhs.dtype != rhs.dtype {
        return Err(Error::DTypeMismatch {
            expected: lhs.dtype,
            got: rhs.dtype,
        });
    }
    let shape = lhs
        .shape
        .broadcast(&rhs.shape)
        .ok_or_else(|| Error::ShapeMismatch {
            expected: lhs.shape.clone(),
            got: rhs.shape.clone(),
        })?;
    Ok(TensorType::new(shape, lhs.dtype))
}

/// `[a, out]`: same shape, dtype taken from `CastAttrs`.
pub fn cast_rel(types: &[Type], attrs: &Attrs, reporter: &mut TypeReporter) -> Result<Resolution> {
    expect_slots("Cast", types, 2)?;
    let cast = attrs.as_cast("cast")?;
    let Some(a) = types[0].as_tensor() else {
        return Ok(Resolution::Deferred);
    };
    reporter.assign(&types[1], &Type::Tensor(a.with_dtype(cast.dtype)))?;
    Ok(Resolution::Solved)
}

/// `[a, out]`: reduction over `ReduceAttrs::axis`.
pub fn reduce_rel(types: &[Type], attrs: &Attrs, reporter: &mut TypeReporter) -> Result<Resolution> {
    expect_slots("Reduce", types, 2)?;
    let reduce = attrs.as_reduce("reduce")?;
    let Some(a) = types[0].as_tensor() else {
        return Ok(Resolution::Deferred);
    };
    let axes = reduce_axes(a.rank(), &reduce.axis, reduce.exclude)?;
    let dims = a
        .shape
        .dims()
        .iter()
        .enumerate()
        .filter_map(|(i, d)| match (axes.contains(&i), reduce.keep_dims) {
            (true, true) => Some(SymDim::Fixed(1)),
            (true, false) => None,
            (false, _) => Some(d.clone()),
        })
        .collect();
    let out = TensorType::new(SymbolicShape::new(dims), a.dtype);
    reporter.assign(&types[1], &Type::Tensor(out))?;
    Ok(Resolution::Solved)
}

/// Normalized, sorted, deduplicated axes a reduction runs over.
///
/// An empty `axis` list reduces everything (or, with `exclude`, nothing).
pub fn reduce_axes(rank: usize, axis: &[i64], exclude: bool) -> Result<Vec<usize>> {
    let mut listed = axis
        .iter()
        .map(|&a| normalize_axis(a, rank))
        .collect::<Result<Vec<_>>>()?;
    listed.sort_unstable();
    listed.dedup();
    Ok(match (listed.is_empty(), exclude) {
        (true, false) => (0..rank).collect(),
        (true, true) => Vec::new(),
        (false, false) => listed,
        (false, true) => (0..rank).filter(|i| !listed.contains(i)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qir_core::{CastAttrs, ReduceAttrs};

    fn t(dims: &[usize], dtype: DType) -> Type {
        Type::Tensor(TensorType::new(dims, dtype))
    }

    #[test]
    fn test_identity_defers_then_solves() {
        let mut r = TypeReporter::new();
        let a = r.fresh();
        let out = r.fresh();
        let rel = identity_rel(&[a.clone(), out.clone()], &Attrs::None, &mut r).unwrap();
        assert_eq!(rel, Resolution::Deferred);
        let rel = identity_rel(&[t(&[2], DType::I8), out.clone()], &Attrs::None, &mut r).unwrap();
        assert_eq!(rel, Resolution::Solved);
        assert_eq!(r.resolve(&out), t(&[2], DType::I8));
    }

    #[test]
    fn test_broadcast_shapes() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        broadcast_rel(
            &[t(&[2, 1, 4], DType::I64), t(&[3, 1], DType::I64), out.clone()],
            &Attrs::None,
            &mut r,
        )
        .unwrap();
        assert_eq!(r.resolve(&out), t(&[2, 3, 4], DType::I64));
    }

    #[test]
    fn test_broadcast_rejects_incompatible() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        let err = broadcast_rel(
            &[t(&[3], DType::I64), t(&[4], DType::I64), out],
            &Attrs::None,
            &mut r,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_int_broadcast_rejects_float() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        assert!(int_broadcast_rel(
            &[t(&[], DType::F32), t(&[], DType::F32), out],
            &Attrs::None,
            &mut r
        )
        .is_err());
    }

    #[test]
    fn test_cast_keeps_shape() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        let attrs = Attrs::Cast(CastAttrs { dtype: DType::I64 });
        cast_rel(&[t(&[1, 4], DType::I8), out.clone()], &attrs, &mut r).unwrap();
        assert_eq!(r.resolve(&out), t(&[1, 4], DType::I64));
    }

    #[test]
    fn test_reduce_keep_dims_and_exclude() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        let attrs = Attrs::Reduce(ReduceAttrs {
            axis: vec![-1],
            keep_dims: true,
            exclude: false,
        });
        reduce_rel(&[t(&[2, 3, 4], DType::I64), out.clone()], &attrs, &mut r).unwrap();
        assert_eq!(r.resolve(&out), t(&[2, 3, 1], DType::I64));

        let out = r.fresh();
        let attrs = Attrs::Reduce(ReduceAttrs {
            axis: vec![0],
            keep_dims: false,
            exclude: true,
        });
        reduce_rel(&[t(&[2, 3, 4], DType::I64), out.clone()], &attrs, &mut r).unwrap();
        assert_eq!(r.resolve(&out), t(&[2], DType::I64));
    }

    #[test]
    fn test_reduce_axis_out_of_range() {
        let mut r = TypeReporter::new();
        let out = r.fresh();
        let attrs = Attrs::Reduce(ReduceAttrs {
            axis: vec![2],
            keep_dims: true,
            exclude: false,
        });
        let err = reduce_rel(&[t(&[1, 4], DType::I64), out], &attrs, &mut r).unwrap_err();
        assert!(matches!(err, Error::DimOutOfRange { dim: 2, rank: 2 }));
    }

    #[test]
    fn test_slot_count_checked() {
        let mut r = TypeReporter::new();
        let err = identity_rel(&[t(&[1], DType::I8)], &Attrs::None, &mut r).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }
}
