// Type inference: resolve a TensorType for every node of an expression
//
// ALGORITHM:
//
//   1. Walk the DAG once (memoized by node identity). Constants get their
//      literal type, annotated variables their declared type, unannotated
//      variables one fresh type variable per name. Every call gets a fresh
//      variable for its result and queues one constraint: the operator's
//      type relation over [operand slots..., result slot].
//   2. Solve in rounds. Each round runs every pending relation on the
//      currently resolved slots; a relation either solves (and assigns
//      types through the reporter) or defers. A round that solves nothing
//      ends the loop, as does the configured round limit.
//   3. Anything still deferred, or any node whose type is still a variable,
//      is an `Unresolved` error. Inference never succeeds on partial
//      information.

use std::collections::HashMap;

use qir_core::{Attrs, Error, Expr, ExprId, ExprKind, Result, TensorType, Type};
use tracing::{debug, trace, warn};

use super::solver::TypeReporter;
use super::PassContext;
use crate::op::{Resolution, TypeRelFn};

/// An expression together with the checked type of each of its nodes.
#[derive(Debug, Clone)]
pub struct TypedExpr {
    expr: Expr,
    root: TensorType,
    types: HashMap<ExprId, TensorType>,
}

impl TypedExpr {
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Type of the root expression.
    pub fn checked_type(&self) -> &TensorType {
        &self.root
    }

    /// Type of any node reachable from the root.
    pub fn ty(&self, node: &Expr) -> Option<&TensorType> {
        self.types.get(&node.id())
    }
}

/// Infer and check the types of every node in `expr`.
pub fn infer_types(expr: &Expr, ctx: &PassContext<'_>) -> Result<TypedExpr> {
    let mut inference = Inference {
        ctx,
        reporter: TypeReporter::new(),
        slots: HashMap::new(),
        vars: HashMap::new(),
        order: Vec::new(),
        constraints: Vec::new(),
    };
    inference.visit(expr)?;
    inference.solve()?;
    inference.finish(expr)
}

struct Constraint {
    op: &'static str,
    rel: TypeRelFn,
    attrs: Attrs,
    slots: Vec<Type>,
}

struct Inference<'c, 'r> {
    ctx: &'c PassContext<'r>,
    reporter: TypeReporter,
    slots: HashMap<ExprId, Type>,
    vars: HashMap<String, Type>,
    order: Vec<Expr>,
    constraints: Vec<Constraint>,
}

impl Inference<'_, '_> {
    fn visit(&mut self, e: &Expr) -> Result<Type> {
        if let Some(ty) = self.slots.get(&e.id()) {
            return Ok(ty.clone());
        }
        let ty = match e.kind() {
            ExprKind::Constant(lit) => Type::Tensor(lit.ty()),
            ExprKind::Var(v) => {
                let declared = v.ty.clone().map(Type::Tensor);
                match (self.vars.get(&v.name).cloned(), declared) {
                    (Some(existing), Some(declared)) => {
                        self.reporter.assign(&existing, &declared)?;
                        existing
                    }
                    (Some(existing), None) => existing,
                    (None, declared) => {
                        let ty = declared.unwrap_or_else(|| self.reporter.fresh());
                        self.vars.insert(v.name.clone(), ty.clone());
                        ty
                    }
                }
            }
            ExprKind::Call(call) => {
                let desc = self.ctx.registry().lookup(call.op)?;
                if call.args.len() != desc.num_inputs {
                    return Err(Error::ArityMismatch {
                        op: call.op.to_string(),
                        expected: desc.num_inputs,
                        got: call.args.len(),
                    });
                }
                let mut slots = Vec::with_capacity(call.args.len() + 1);
                for arg in &call.args {
                    slots.push(self.visit(arg)?);
                }
                let result = self.reporter.fresh();
                slots.push(result.clone());
                self.constraints.push(Constraint {
                    op: call.op,
                    rel: desc.type_rel,
                    attrs: call.attrs.clone(),
                    slots,
                });
                result
            }
        };
        self.slots.insert(e.id(), ty.clone());
        self.order.push(e.clone());
        Ok(ty)
    }

    fn solve(&mut self) -> Result<()> {
        let mut pending: Vec<usize> = (0..self.constraints.len()).collect();
        let max_rounds = self.ctx.config().max_relation_rounds;

        for round in 0..max_rounds {
            if pending.is_empty() {
                break;
            }
            let before = pending.len();
            let mut deferred = Vec::new();
            for idx in pending {
                let c = &self.constraints[idx];
                let resolved: Vec<Type> = c.slots.iter().map(|t| self.reporter.resolve(t)).collect();
                match (c.rel)(&resolved, &c.attrs, &mut self.reporter)? {
                    Resolution::Solved => {}
                    Resolution::Deferred => deferred.push(idx),
                }
            }
            trace!(
                round,
                solved = before - deferred.len(),
                pending = deferred.len(),
                "type relation round"
            );
            let stalled = deferred.len() == before;
            pending = deferred;
            if stalled {
                break;
            }
        }

        if let Some(&idx) = pending.first() {
            let op = self.constraints[idx].op;
            warn!(op, pending = pending.len(), "type inference stopped with deferred relations");
            return Err(Error::Unresolved { op: op.to_string() });
        }
        Ok(())
    }

    fn finish(self, root: &Expr) -> Result<TypedExpr> {
        let mut types = HashMap::with_capacity(self.order.len());
        for node in &self.order {
            match self.reporter.resolve(&self.slots[&node.id()]) {
                Type::Tensor(t) => {
                    types.insert(node.id(), t);
                }
                Type::Incomplete(_) => {
                    return Err(Error::Unresolved {
                        op: describe(node),
                    })
                }
            }
        }
        let root_ty = types
            .get(&root.id())
            .cloned()
            .ok_or_else(|| Error::Unresolved { op: describe(root) })?;
        debug!(nodes = types.len(), ty = %root_ty, "type inference finished");
        Ok(TypedExpr {
            expr: root.clone(),
            root: root_ty,
            types,
        })
    }
}

fn describe(node: &Expr) -> String {
    match node.kind() {
        ExprKind::Var(v) => format!("variable %{}", v.name),
        ExprKind::Constant(lit) => format!("constant {lit}"),
        ExprKind::Call(c) => c.op.to_string(),
    }
}
