// Operators: descriptors, registry, and the operator families
//
// Every operator the passes can see is described by one `OpDescriptor`:
// documentation metadata, arity, the type relation consulted by inference,
// and optionally a canonicalizer (rewrite into primitives) and a kernel
// (evaluation by the reference interpreter). Descriptors live in an
// `OpRegistry` that the caller builds and hands to passes by reference
// through `PassContext`.
//
// FAMILIES:
//
//   tensor     - primitive elementwise ops, casts, reductions, constants
//   qnn        - quantized ops: softmax (non-computational, lowered) and
//                requantize (primitive)
//   relations  - generic type relations shared by the families

pub mod qnn;
pub mod relations;
pub mod tensor;

use std::collections::HashMap;
use std::fmt;

use qir_core::{Attrs, Error, Expr, Result, TensorType, TensorValue, Type};

use crate::pass::TypeReporter;

/// Outcome of running a type relation once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// All slots the relation constrains are now typed.
    Solved,
    /// Some operand type is still unknown; run again in a later round.
    Deferred,
}

/// Type relation over `[operand slots..., result slot]`.
pub type TypeRelFn = fn(&[Type], &Attrs, &mut TypeReporter) -> Result<Resolution>;

/// Rewrite of a call, given its attributes, its (already rewritten)
/// operands, and the checked types of the original operands.
pub type CanonicalizeFn = fn(&Attrs, &[Expr], &[TensorType]) -> Result<Expr>;

/// Evaluation of a call on concrete operand values.
pub type KernelFn = fn(&[TensorValue], &Attrs) -> Result<TensorValue>;

/// Documentation of one positional operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentInfo {
    pub name: &'static str,
    pub type_info: &'static str,
    pub description: &'static str,
}

/// Everything the passes know about one operator.
#[derive(Clone)]
pub struct OpDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub num_inputs: usize,
    pub arguments: Vec<ArgumentInfo>,
    pub support_level: u32,
    pub type_rel_name: &'static str,
    pub type_rel: TypeRelFn,
    /// Only exists to be rewritten; the interpreter refuses to run it and
    /// canonicalization must remove it.
    pub non_computational: bool,
    pub canonicalize: Option<CanonicalizeFn>,
    pub kernel: Option<KernelFn>,
}

impl OpDescriptor {
    pub fn new(name: &'static str, type_rel_name: &'static str, type_rel: TypeRelFn) -> Self {
        Self {
            name,
            description: "",
            num_inputs: 0,
            arguments: Vec::new(),
            support_level: 10,
            type_rel_name,
            type_rel,
            non_computational: false,
            canonicalize: None,
            kernel: None,
        }
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn with_num_inputs(mut self, n: usize) -> Self {
        self.num_inputs = n;
        self
    }

    pub fn with_argument(
        mut self,
        name: &'static str,
        type_info: &'static str,
        description: &'static str,
    ) -> Self {
        self.arguments.push(ArgumentInfo {
            name,
            type_info,
            description,
        });
        self
    }

    pub fn with_support_level(mut self, level: u32) -> Self {
        self.support_level = level;
        self
    }

    pub fn non_computational(mut self) -> Self {
        self.non_computational = true;
        self
    }

    pub fn with_canonicalize(mut self, f: CanonicalizeFn) -> Self {
        self.canonicalize = Some(f);
        self
    }

    pub fn with_kernel(mut self, f: KernelFn) -> Self {
        self.kernel = Some(f);
        self
    }
}

impl fmt::Debug for OpDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDescriptor")
            .field("name", &self.name)
            .field("num_inputs", &self.num_inputs)
            .field("arguments", &self.arguments)
            .field("support_level", &self.support_level)
            .field("type_rel_name", &self.type_rel_name)
            .field("non_computational", &self.non_computational)
            .field("canonicalize", &self.canonicalize.is_some())
            .field("kernel", &self.kernel.is_some())
            .finish()
    }
}

/// Operator table, keyed by operator name.
#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    ops: HashMap<&'static str, OpDescriptor>,
}

impl OpRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every operator defined in this crate.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        tensor::register(&mut registry)?;
        qnn::register(&mut registry)?;
        Ok(registry)
    }

    /// Add an operator. Names must be unique, and documented arguments
    /// must match the declared arity.
    pub fn register(&mut self, desc: OpDescriptor) -> Result<()> {
        if self.ops.contains_key(desc.name) {
            return Err(Error::DuplicateOp(desc.name.to_string()));
        }
        if !desc.arguments.is_empty() && desc.arguments.len() != desc.num_inputs {
            return Err(Error::ArityMismatch {
                op: desc.name.to_string(),
                expected: desc.num_inputs,
                got: desc.arguments.len(),
            });
        }
        self.ops.insert(desc.name, desc);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OpDescriptor> {
        self.ops.get(name)
    }

    /// Like `get`, but an unknown name is an error.
    pub fn lookup(&self, name: &str) -> Result<&OpDescriptor> {
        self.get(name)
            .ok_or_else(|| Error::UnknownOp(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.ops.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
