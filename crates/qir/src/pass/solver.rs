use qir_core::{Error, Result, TensorType, Type, TypeVar};

/// Type-variable store that relations report their conclusions to.
///
/// Each variable is bound at most once to another type; `resolve` follows
/// bindings until it reaches a tensor type or an unbound variable.
/// `assign` is the only way relations change the solution.
#[derive(Debug, Default)]
pub struct TypeReporter {
    bindings: Vec<Option<Type>>,
}

impl TypeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new unbound variable.
    pub fn fresh(&mut self) -> Type {
        let id = self.bindings.len() as u32;
        self.bindings.push(None);
        Type::Incomplete(TypeVar(id))
    }

    /// Follow variable bindings as far as they go.
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Incomplete(v) = current {
            match self.bindings.get(v.0 as usize).and_then(Option::as_ref) {
                Some(bound) => current = bound.clone(),
                None => break,
            }
        }
        current
    }

    /// Record that slot `dst` has type `src`.
    ///
    /// An unbound side is bound to the other side; two tensor types must
    /// agree on dtype and rank and have unifiable dimensions. On a conflict
    /// `dst` is reported as the expected type.
    pub fn assign(&mut self, dst: &Type, src: &Type) -> Result<Type> {
        let dst = self.resolve(dst);
        let src = self.resolve(src);
        match (&dst, &src) {
            (Type::Incomplete(a), Type::Incomplete(b)) if a == b => Ok(dst),
            (Type::Incomplete(a), _) => {
                self.bind(*a, src.clone());
                Ok(src)
            }
            (_, Type::Incomplete(b)) => {
                self.bind(*b, dst.clone());
                Ok(dst)
            }
            (Type::Tensor(expected), Type::Tensor(got)) => {
                unify_tensor(expected, got).map(Type::Tensor)
            }
        }
    }

    fn bind(&mut self, var: TypeVar, ty: Type) {
        if let Some(slot) = self.bindings.get_mut(var.0 as usize) {
            *slot = Some(ty);
        }
    }
}

fn unify_tensor(expected: &TensorType, got: &TensorType) -> Result<TensorType> {
    if expected.dtype != got.dtype {
        return Err(Error::DTypeMismatch {
            expected: expected.dtype,
            got: got.dtype,
        });
    }
    if expected.rank() != got.rank() {
        return Err(Error::RankMismatch {
            expected: expected.rank(),
            got: got.rank(),
        });
    }
    let shape = expected
        .shape
        .unify(&got.shape)
        .ok_or_else(|| Error::ShapeMismatch {
            expected: expected.shape.clone(),
            got: got.shape.clone(),
        })?;
    Ok(TensorType::new(shape, expected.dtype))
}
