// Expr: immutable expression nodes of the IR
//
// An expression is a DAG of three node kinds:
//
//   Var       - a named program input, optionally annotated with its type
//   Constant  - a scalar literal with an explicit dtype
//   Call      - an operator applied to operand expressions plus attributes
//
// Nodes are wrapped in `Arc`, so cloning an `Expr` is a refcount bump and a
// subexpression can be shared by many consumers. Nodes are never mutated:
// passes build new nodes and leave their input untouched. Equality is
// structural (deep), which is what "the same program" means to a pass.
//
// `ExprId` is the node's address. It identifies a node (not its structure)
// and is what passes memoize on while they walk a DAG.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::attrs::Attrs;
use crate::dtype::DType;
use crate::ty::TensorType;

/// A scalar literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: i64, dtype: DType },
    Float { value: f64, dtype: DType },
}

impl Literal {
    pub fn dtype(&self) -> DType {
        match self {
            Literal::Int { dtype, .. } | Literal::Float { dtype, .. } => *dtype,
        }
    }

    /// Literals are rank-0 tensors of their dtype.
    pub fn ty(&self) -> TensorType {
        TensorType::scalar(self.dtype())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int { value, dtype } => write!(f, "{value}{}", suffix(*dtype)),
            Literal::Float { value, dtype } => write!(f, "{value:?}{}", suffix(*dtype)),
        }
    }
}

fn suffix(dtype: DType) -> &'static str {
    match dtype {
        DType::I8 => "i8",
        DType::I16 => "i16",
        DType::I32 => "i32",
        DType::I64 => "i64",
        DType::U8 => "u8",
        DType::U32 => "u32",
        DType::F32 => "f32",
        DType::F64 => "f64",
    }
}

/// A named input of the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    /// Declared type. `None` leaves it to type inference.
    pub ty: Option<TensorType>,
}

/// An operator applied to operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Registered operator name, e.g. `"qnn.softmax"`.
    pub op: &'static str,
    pub args: Vec<Expr>,
    pub attrs: Attrs,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Var(Var),
    Constant(Literal),
    Call(Call),
}

/// Identity of one expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

/// Reference-counted handle to an immutable expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    /// A typed program input.
    pub fn var(name: impl Into<String>, ty: TensorType) -> Self {
        Expr(Arc::new(ExprKind::Var(Var {
            name: name.into(),
            ty: Some(ty),
        })))
    }

    /// A program input whose type is left to inference.
    pub fn untyped_var(name: impl Into<String>) -> Self {
        Expr(Arc::new(ExprKind::Var(Var {
            name: name.into(),
            ty: None,
        })))
    }

    pub fn constant(literal: Literal) -> Self {
        Expr(Arc::new(ExprKind::Constant(literal)))
    }

    pub fn call(op: &'static str, args: Vec<Expr>, attrs: Attrs) -> Self {
        Expr(Arc::new(ExprKind::Call(Call { op, args, attrs })))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &*self.0 {
            ExprKind::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn id(&self) -> ExprId {
        ExprId(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether two handles point at the same node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of distinct nodes reachable from this expression.
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if !seen.insert(e.id()) {
                continue;
            }
            if let ExprKind::Call(c) = e.kind() {
                stack.extend(c.args.iter());
            }
        }
        seen.len()
    }

    /// Whether any reachable call applies `op`.
    pub fn contains_op(&self, op: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if !seen.insert(e.id()) {
                continue;
            }
            if let ExprKind::Call(c) = e.kind() {
                if c.op == op {
                    return true;
                }
                stack.extend(c.args.iter());
            }
        }
        false
    }

    /// Render the DAG in SSA form, one line per call, shared nodes once:
    ///
    /// ```text
    /// %0 = cast(%data, dtype=int64)
    /// %1 = subtract(%0, 3i64)
    /// %1
    /// ```
    pub fn dump(&self) -> String {
        let mut dumper = Dumper::default();
        let root = dumper.node(self);
        dumper.out.push_str(&root);
        dumper.out
    }
}

#[derive(Default)]
struct Dumper {
    names: HashMap<ExprId, String>,
    next: usize,
    out: String,
}

impl Dumper {
    fn node(&mut self, e: &Expr) -> String {
        if let Some(name) = self.names.get(&e.id()) {
            return name.clone();
        }
        let name = match e.kind() {
            ExprKind::Var(v) => format!("%{}", v.name),
            ExprKind::Constant(lit) => lit.to_string(),
            ExprKind::Call(c) => {
                let args: Vec<String> = c.args.iter().map(|a| self.node(a)).collect();
                let name = format!("%{}", self.next);
                self.next += 1;
                let _ = write!(self.out, "{name} = {}({}", c.op, args.join(", "));
                if !matches!(c.attrs, Attrs::None) {
                    let _ = write!(self.out, ", {}", c.attrs);
                }
                self.out.push_str(")\n");
                name
            }
        };
        self.names.insert(e.id(), name.clone());
        name
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::CastAttrs;

    fn int(value: i64) -> Expr {
        Expr::constant(Literal::Int {
            value,
            dtype: DType::I64,
        })
    }

    #[test]
    fn test_structural_equality() {
        let a = Expr::call("add", vec![int(1), int(2)], Attrs::None);
        let b = Expr::call("add", vec![int(1), int(2)], Attrs::None);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_shared_nodes_counted_once() {
        let x = Expr::untyped_var("x");
        let sq = Expr::call("multiply", vec![x.clone(), x.clone()], Attrs::None);
        let sum = Expr::call("add", vec![sq.clone(), sq], Attrs::None);
        assert_eq!(sum.node_count(), 3);
        assert!(sum.contains_op("multiply"));
        assert!(!sum.contains_op("divide"));
    }

    #[test]
    fn test_dump() {
        let x = Expr::untyped_var("x");
        let c = Expr::call(
            "cast",
            vec![x],
            Attrs::Cast(CastAttrs { dtype: DType::I64 }),
        );
        let s = Expr::call("subtract", vec![c.clone(), int(3)], Attrs::None);
        let out = Expr::call("add", vec![s, c], Attrs::None);
        assert_eq!(
            out.dump(),
            "%0 = cast(%x, dtype=int64)\n%1 = subtract(%0, 3i64)\n%2 = add(%1, %0)\n%2"
        );
    }

    #[test]
    fn test_literal_display() {
        let f = Literal::Float {
            value: 1.0,
            dtype: DType::F32,
        };
        assert_eq!(f.to_string(), "1.0f32");
        assert_eq!(f.ty(), TensorType::scalar(DType::F32));
    }
}
