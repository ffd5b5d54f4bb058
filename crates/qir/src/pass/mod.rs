// Passes: type inference and canonicalization over expression DAGs
//
// Every pass receives a `PassContext`: the operator registry plus pass
// configuration, threaded explicitly instead of living in a global. The
// context is `Sync`, so one context can drive passes over independent
// expressions on several threads at once.
//
//   let registry = OpRegistry::with_builtins()?;
//   let ctx = PassContext::new(&registry);
//   let typed = infer_types(&expr, &ctx)?;       // TypedExpr
//   let lowered = canonicalize(&expr, &ctx)?;    // primitive-only Expr

mod canonicalize;
mod infer;
mod solver;

pub use canonicalize::{canonicalize, canonicalize_all};
pub use infer::{infer_types, TypedExpr};
pub use solver::TypeReporter;

use crate::op::OpRegistry;

/// Pass configuration.
#[derive(Debug, Clone)]
pub struct PassConfig {
    /// Upper bound on relation-solving rounds during type inference.
    pub max_relation_rounds: usize,
    /// Re-run type inference on canonicalized output and require the
    /// result type to be unchanged.
    pub verify_after_rewrite: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            max_relation_rounds: 64,
            verify_after_rewrite: true,
        }
    }
}

impl PassConfig {
    /// Set the relation round limit.
    pub fn with_max_relation_rounds(mut self, rounds: usize) -> Self {
        self.max_relation_rounds = rounds;
        self
    }

    /// Enable or disable post-rewrite verification.
    pub fn with_verify_after_rewrite(mut self, verify: bool) -> Self {
        self.verify_after_rewrite = verify;
        self
    }
}

/// Registry and configuration shared by every pass invocation.
#[derive(Debug, Clone)]
pub struct PassContext<'r> {
    registry: &'r OpRegistry,
    config: PassConfig,
}

impl<'r> PassContext<'r> {
    pub fn new(registry: &'r OpRegistry) -> Self {
        Self {
            registry,
            config: PassConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PassConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &'r OpRegistry {
        self.registry
    }

    pub fn config(&self) -> &PassConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PassConfig::default()
            .with_max_relation_rounds(3)
            .with_verify_after_rewrite(false);
        assert_eq!(config.max_relation_rounds, 3);
        assert!(!config.verify_after_rewrite);
    }

    #[test]
    fn test_context_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<PassContext<'static>>();
    }
}
