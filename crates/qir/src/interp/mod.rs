// Interpreter: reference evaluation of canonicalized expressions
//
// Walks the expression DAG bottom-up, dispatching each call to the kernel
// registered with its operator. Values are memoized by node identity, so a
// shared subexpression is evaluated once. Variables are looked up by name in
// the caller's bindings and checked against their declared type; symbolic
// dimensions are bound on first use and must agree everywhere after that.
//
// The interpreter stands in for code generation. It is deliberately strict:
// integer kernels fail on overflow instead of wrapping, and operators marked
// non-computational are refused outright.

pub mod kernels;

use std::collections::HashMap;

use qir_core::{Error, Expr, ExprId, ExprKind, Result, ShapeEnv, TensorValue};
use tracing::trace;

use crate::op::OpRegistry;

/// Evaluates expressions against an operator registry.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'r> {
    registry: &'r OpRegistry,
}

impl<'r> Interpreter<'r> {
    pub fn new(registry: &'r OpRegistry) -> Self {
        Self { registry }
    }

    /// Evaluate `expr` with `bindings` supplying every variable.
    pub fn eval(&self, expr: &Expr, bindings: &HashMap<String, TensorValue>) -> Result<TensorValue> {
        let mut run = Run {
            registry: self.registry,
            bindings,
            env: ShapeEnv::new(),
            values: HashMap::new(),
        };
        run.eval(expr)
    }
}

struct Run<'a> {
    registry: &'a OpRegistry,
    bindings: &'a HashMap<String, TensorValue>,
    env: ShapeEnv,
    values: HashMap<ExprId, TensorValue>,
}

impl Run<'_> {
    fn eval(&mut self, e: &Expr) -> Result<TensorValue> {
        if let Some(v) = self.values.get(&e.id()) {
            return Ok(v.clone());
        }
        let value = match e.kind() {
            ExprKind::Var(var) => {
                let value = self
                    .bindings
                    .get(&var.name)
                    .cloned()
                    .ok_or_else(|| Error::UnboundVar(var.name.clone()))?;
                if let Some(ty) = &var.ty {
                    if ty.dtype != value.dtype() {
                        return Err(Error::DTypeMismatch {
                            expected: ty.dtype,
                            got: value.dtype(),
                        });
                    }
                    ty.shape.bind_shape(value.shape(), &mut self.env)?;
                }
                value
            }
            ExprKind::Constant(lit) => kernels::literal(lit)?,
            ExprKind::Call(call) => {
                let desc = self.registry.lookup(call.op)?;
                if desc.non_computational {
                    return Err(Error::NonComputational(call.op.to_string()));
                }
                let kernel = desc.kernel.ok_or_else(|| {
                    Error::msg(format!("operator {} has no evaluation kernel", call.op))
                })?;
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.eval(arg)?);
                }
                let out = kernel(&args, &call.attrs)?;
                trace!(op = call.op, shape = %out.shape(), dtype = %out.dtype(), "evaluated");
                out
            }
        };
        self.values.insert(e.id(), value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::tensor;
    use qir_core::{DType, SymDim, TensorType};

    fn bind(name: &str, value: TensorValue) -> HashMap<String, TensorValue> {
        HashMap::from([(name.to_string(), value)])
    }

    #[test]
    fn test_eval_arithmetic() {
        let reg = OpRegistry::with_builtins().unwrap();
        let interp = Interpreter::new(&reg);
        let x = Expr::var("x", TensorType::new(&[3usize][..], DType::I64));
        let y = tensor::multiply(tensor::add(x, tensor::const_i64(1)), tensor::const_i64(2));
        let xs = TensorValue::from_slice(&[1i64, 2, 3], 3usize).unwrap();
        let out = interp.eval(&y, &bind("x", xs)).unwrap();
        assert_eq!(out.ints().unwrap(), &[4, 6, 8]);
    }

    #[test]
    fn test_unbound_variable() {
        let reg = OpRegistry::with_builtins().unwrap();
        let interp = Interpreter::new(&reg);
        let y = tensor::negative(Expr::untyped_var("x"));
        assert!(matches!(
            interp.eval(&y, &HashMap::new()),
            Err(Error::UnboundVar(name)) if name == "x"
        ));
    }

    #[test]
    fn test_declared_type_checked() {
        let reg = OpRegistry::with_builtins().unwrap();
        let interp = Interpreter::new(&reg);
        let ty = TensorType::new(vec![SymDim::symbolic("N")], DType::I64);
        let y = tensor::add(Expr::var("a", ty.clone()), Expr::var("b", ty));
        let mut env = bind("a", TensorValue::from_slice(&[1i64, 2], 2usize).unwrap());
        env.insert(
            "b".to_string(),
            TensorValue::from_slice(&[1i64, 2, 3], 3usize).unwrap(),
        );
        assert!(matches!(
            interp.eval(&y, &env),
            Err(Error::ShapeMismatch { .. })
        ));

        let wrong_dtype = bind("a", TensorValue::from_slice(&[1i32], 1usize).unwrap());
        let z = tensor::negative(Expr::var(
            "a",
            TensorType::new(&[1usize][..], DType::I64),
        ));
        assert!(matches!(
            interp.eval(&z, &wrong_dtype),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_shared_node_evaluated_once() {
        let reg = OpRegistry::with_builtins().unwrap();
        let interp = Interpreter::new(&reg);
        let x = Expr::untyped_var("x");
        let sq = tensor::multiply(x.clone(), x);
        let y = tensor::add(sq.clone(), sq);
        let xs = TensorValue::scalar_int(3, DType::I64).unwrap();
        assert_eq!(interp.eval(&y, &bind("x", xs)).unwrap().scalar_i64().unwrap(), 18);
    }
}
