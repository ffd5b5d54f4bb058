// Dynamic Shapes: symbolic dimensions in IR tensor types
//
// A tensor type seen by the compiler does not always know every dimension:
// a batch axis is usually a named symbol, and an imported model may leave a
// dimension completely open. Type relations therefore work on symbolic
// shapes, while runtime tensor values always carry a concrete `Shape`.
//
// COMPONENTS:
//
//   SymDim         - one dimension: fixed, named symbol, or dynamic
//   SymbolicShape  - ordered list of SymDim; the shape part of a TensorType
//   ShapeEnv       - symbol -> value bindings, filled while checking
//                    concrete values against declared types
//
// Two symbolic shapes are reconciled with `unify` (used when a relation
// assigns one type to another slot) and with `broadcast` (elementwise
// binary relations).

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::shape::Shape;

/// A dimension that can be concrete, symbolic, or fully dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymDim {
    /// Known at compile time.
    Fixed(usize),
    /// Named symbolic dimension such as "Batch". Two symbols are the same
    /// dimension iff their names are equal.
    Symbolic(String),
    /// Unknown; compatible with any dimension.
    Dynamic,
}

impl SymDim {
    /// Create a named symbolic dimension.
    pub fn symbolic(name: impl Into<String>) -> Self {
        SymDim::Symbolic(name.into())
    }

    /// Is this a concrete (fixed) dimension?
    pub fn is_fixed(&self) -> bool {
        matches!(self, SymDim::Fixed(_))
    }

    /// The fixed size, if known.
    pub fn as_fixed(&self) -> Option<usize> {
        match self {
            SymDim::Fixed(n) => Some(*n),
            _ => None,
        }
    }

    /// Reconcile two dimensions describing the same axis.
    ///
    /// Returns the more precise of the two, or `None` if they contradict
    /// each other (different fixed sizes, or different symbol names).
    /// A fixed size against a symbol keeps the fixed size.
    pub fn unify(&self, other: &SymDim) -> Option<SymDim> {
        match (self, other) {
            (SymDim::Dynamic, d) | (d, SymDim::Dynamic) => Some(d.clone()),
            (SymDim::Fixed(a), SymDim::Fixed(b)) => (a == b).then(|| self.clone()),
            (SymDim::Symbolic(a), SymDim::Symbolic(b)) => (a == b).then(|| self.clone()),
            (SymDim::Fixed(_), SymDim::Symbolic(_)) => Some(self.clone()),
            (SymDim::Symbolic(_), SymDim::Fixed(_)) => Some(other.clone()),
        }
    }

    /// Check a concrete value against this dimension, binding an unbound
    /// symbol in `env`.
    pub fn bind_value(&self, value: usize, env: &mut ShapeEnv) -> bool {
        match self {
            SymDim::Fixed(n) => value == *n,
            SymDim::Symbolic(name) => match env.get(name) {
                Some(bound) => value == bound,
                None => {
                    env.bind(name, value);
                    true
                }
            },
            SymDim::Dynamic => true,
        }
    }
}

impl fmt::Display for SymDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymDim::Fixed(n) => write!(f, "{n}"),
            SymDim::Symbolic(s) => write!(f, "{s}"),
            SymDim::Dynamic => write!(f, "?"),
        }
    }
}

impl From<usize> for SymDim {
    fn from(n: usize) -> Self {
        SymDim::Fixed(n)
    }
}

impl From<&str> for SymDim {
    fn from(s: &str) -> Self {
        SymDim::Symbolic(s.to_string())
    }
}

/// A shape whose dimensions may be fixed, symbolic, or dynamic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolicShape {
    dims: Vec<SymDim>,
}

impl SymbolicShape {
    pub fn new(dims: Vec<SymDim>) -> Self {
        Self { dims }
    }

    /// The rank-0 shape of a scalar.
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    /// A fully fixed symbolic shape from a concrete shape.
    pub fn from_shape(shape: &Shape) -> Self {
        Self {
            dims: shape.dims().iter().map(|&d| SymDim::Fixed(d)).collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[SymDim] {
        &self.dims
    }

    /// Check if all dimensions are fixed.
    pub fn is_concrete(&self) -> bool {
        self.dims.iter().all(|d| d.is_fixed())
    }

    /// The concrete shape, if every dimension is fixed.
    pub fn to_shape(&self) -> Option<Shape> {
        self.dims
            .iter()
            .map(SymDim::as_fixed)
            .collect::<Option<Vec<_>>>()
            .map(Shape::new)
    }

    /// Reconcile two shapes describing the same tensor, dimension by
    /// dimension. `None` if ranks differ or any dimension contradicts.
    pub fn unify(&self, other: &SymbolicShape) -> Option<SymbolicShape> {
        if self.rank() != other.rank() {
            return None;
        }
        self.dims
            .iter()
            .zip(other.dims.iter())
            .map(|(a, b)| a.unify(b))
            .collect::<Option<Vec<_>>>()
            .map(SymbolicShape::new)
    }

    /// Output shape of an elementwise op under NumPy broadcasting.
    /// `None` if the shapes are incompatible.
    pub fn broadcast(&self, other: &SymbolicShape) -> Option<SymbolicShape> {
        let rank = self.rank().max(other.rank());
        let one = SymDim::Fixed(1);
        let mut result = Vec::with_capacity(rank);

        for i in 0..rank {
            let a = if i < rank - self.rank() {
                &one
            } else {
                &self.dims[i - (rank - self.rank())]
            };
            let b = if i < rank - other.rank() {
                &one
            } else {
                &other.dims[i - (rank - other.rank())]
            };

            let d = match (a, b) {
                (SymDim::Fixed(1), _) => b.clone(),
                (_, SymDim::Fixed(1)) => a.clone(),
                (SymDim::Fixed(x), SymDim::Fixed(y)) if x != y => return None,
                (SymDim::Symbolic(s), SymDim::Symbolic(t)) if s != t => SymDim::Dynamic,
                _ => a.unify(b)?,
            };
            result.push(d);
        }
        Some(SymbolicShape::new(result))
    }

    /// Check a concrete shape against this pattern, binding symbols in `env`.
    pub fn bind_shape(&self, shape: &Shape, env: &mut ShapeEnv) -> Result<()> {
        let matches = self.rank() == shape.rank()
            && self
                .dims
                .iter()
                .zip(shape.dims().iter())
                .all(|(pattern, &value)| pattern.bind_value(value, env));
        if matches {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                expected: self.clone(),
                got: SymbolicShape::from_shape(shape),
            })
        }
    }
}

impl fmt::Display for SymbolicShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<SymDim>> for SymbolicShape {
    fn from(dims: Vec<SymDim>) -> Self {
        Self::new(dims)
    }
}

impl From<Shape> for SymbolicShape {
    fn from(shape: Shape) -> Self {
        Self::from_shape(&shape)
    }
}

impl From<&[usize]> for SymbolicShape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.iter().map(|&d| SymDim::Fixed(d)).collect())
    }
}

/// Symbol name -> concrete value bindings.
#[derive(Debug, Clone, Default)]
pub struct ShapeEnv {
    bindings: HashMap<String, usize>,
}

impl ShapeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: usize) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.bindings.get(name).copied()
    }
}
