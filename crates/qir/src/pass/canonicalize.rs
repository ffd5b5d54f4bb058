// Canonicalization: replace non-primitive calls by primitive subgraphs
//
// The input is type-checked first; a canonicalizer needs the checked types
// of its operands (the softmax lowering reads the data shape from them).
// The rewrite is bottom-up and memoized on node identity, so a subexpression
// shared by several consumers is rewritten once and stays shared. Calls
// whose operator has no canonicalizer are rebuilt only if an operand
// changed; untouched subtrees are returned as the same nodes.

use std::collections::HashMap;

use qir_core::{Error, Expr, ExprId, ExprKind, Result, TensorType};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::infer::{infer_types, TypedExpr};
use super::PassContext;

/// Canonicalize one expression.
pub fn canonicalize(expr: &Expr, ctx: &PassContext<'_>) -> Result<Expr> {
    let typed = infer_types(expr, ctx)?;
    let mut rewriter = Rewriter {
        ctx,
        typed: &typed,
        memo: HashMap::new(),
    };
    let out = rewriter.rewrite(expr)?;

    if ctx.config().verify_after_rewrite {
        verify(&out, typed.checked_type(), ctx)?;
    }
    Ok(out)
}

/// Canonicalize independent expressions in parallel.
pub fn canonicalize_all(exprs: &[Expr], ctx: &PassContext<'_>) -> Result<Vec<Expr>> {
    exprs.par_iter().map(|e| canonicalize(e, ctx)).collect()
}

struct Rewriter<'a, 'c, 'r> {
    ctx: &'c PassContext<'r>,
    typed: &'a TypedExpr,
    memo: HashMap<ExprId, Expr>,
}

impl Rewriter<'_, '_, '_> {
    fn rewrite(&mut self, e: &Expr) -> Result<Expr> {
        if let Some(done) = self.memo.get(&e.id()) {
            return Ok(done.clone());
        }
        let out = match e.kind() {
            ExprKind::Var(_) | ExprKind::Constant(_) => e.clone(),
            ExprKind::Call(call) => {
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.rewrite(arg)?);
                }
                let desc = self.ctx.registry().lookup(call.op)?;
                match desc.canonicalize {
                    Some(lower) => {
                        let arg_types = call
                            .args
                            .iter()
                            .map(|a| self.checked(a))
                            .collect::<Result<Vec<_>>>()?;
                        let lowered = lower(&call.attrs, &args, &arg_types)?;
                        debug!(
                            op = call.op,
                            nodes = lowered.node_count(),
                            "canonicalized call"
                        );
                        trace!(op = call.op, "lowered form:\n{}", lowered.dump());
                        lowered
                    }
                    None if args.iter().zip(&call.args).all(|(a, b)| a.ptr_eq(b)) => e.clone(),
                    None => Expr::call(call.op, args, call.attrs.clone()),
                }
            }
        };
        self.memo.insert(e.id(), out.clone());
        Ok(out)
    }

    fn checked(&self, e: &Expr) -> Result<TensorType> {
        self.typed
            .ty(e)
            .cloned()
            .ok_or_else(|| Error::msg(format!("no checked type for operand:\n{}", e.dump())))
    }
}

fn verify(out: &Expr, expected: &TensorType, ctx: &PassContext<'_>) -> Result<()> {
    let retyped = infer_types(out, ctx)?;
    if retyped.checked_type() != expected {
        return Err(Error::msg(format!(
            "canonicalization changed the expression type from {expected} to {}",
            retyped.checked_type()
        )));
    }
    let registry = ctx.registry();
    if let Some(op) = registry
        .names()
        .into_iter()
        .filter(|name| registry.get(name).is_some_and(|d| d.non_computational))
        .find(|name| out.contains_op(name))
    {
        return Err(Error::NonComputational(op.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{qnn, tensor, OpRegistry};
    use crate::pass::PassConfig;
    use qir_core::DType;

    fn softmax_expr() -> Expr {
        let data = Expr::var("data", TensorType::new(&[1usize, 4][..], DType::I8));
        qnn::softmax(
            data,
            -1,
            tensor::const_f32(0.1),
            tensor::const_i32(0),
            tensor::const_f32(1.0 / 256.0),
            tensor::const_i32(-128),
        )
    }

    #[test]
    fn test_primitive_expression_is_unchanged() {
        let reg = OpRegistry::with_builtins().unwrap();
        let ctx = PassContext::new(&reg);
        let x = Expr::var("x", TensorType::new(&[3usize][..], DType::I64));
        let y = tensor::add(x.clone(), x);
        let out = canonicalize(&y, &ctx).unwrap();
        assert!(out.ptr_eq(&y));
    }

    #[test]
    fn test_softmax_is_replaced() {
        let reg = OpRegistry::with_builtins().unwrap();
        let ctx = PassContext::new(&reg);
        let out = canonicalize(&softmax_expr(), &ctx).unwrap();
        assert!(!out.contains_op(qnn::SOFTMAX));
        assert_eq!(out.as_call().map(|c| c.op), Some(qnn::REQUANTIZE));
    }

    #[test]
    fn test_shared_softmax_rewritten_once() {
        let reg = OpRegistry::with_builtins().unwrap();
        let ctx = PassContext::new(&reg).with_config(PassConfig::default().with_verify_after_rewrite(false));
        let s = softmax_expr();
        let both = tensor::add(tensor::cast(s.clone(), DType::I32), tensor::cast(s, DType::I32));
        let out = canonicalize(&both, &ctx).unwrap();
        let call = out.as_call().unwrap();
        let lhs = call.args[0].as_call().unwrap();
        let rhs = call.args[1].as_call().unwrap();
        assert!(lhs.args[0].ptr_eq(&rhs.args[0]));
    }

    #[test]
    fn test_type_errors_abort_the_pass() {
        let reg = OpRegistry::with_builtins().unwrap();
        let ctx = PassContext::new(&reg);
        let data = Expr::var("data", TensorType::new(&[1usize, 4][..], DType::U8));
        let bad = qnn::softmax(
            data,
            -1,
            tensor::const_f32(0.1),
            tensor::const_i32(0),
            tensor::const_f32(1.0 / 256.0),
            tensor::const_i32(-128),
        );
        assert!(matches!(
            canonicalize(&bad, &ctx),
            Err(Error::DTypeMismatch { .. })
        ));
    }
}
