//! Registry for analyst checks.

use analyst_core::BusinessContext;

use super::{AnalystCheck, StockOutRiskCheck};

/// Owns the set of available checks in registration order.
///
/// Constructed by the caller at startup and handed to the engine; there is
/// no module-level singleton.
pub struct CheckRegistry {
    checks: Vec<Box<dyn AnalystCheck>>,
}

impl CheckRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Registry with the built-in checks registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(StockOutRiskCheck));
        registry
    }

    /// Register a check. Re-registering a name replaces the earlier check.
    pub fn register(&mut self, check: Box<dyn AnalystCheck>) {
        if let Some(existing) = self
            .checks
            .iter_mut()
            .find(|c| c.name() == check.name())
        {
            *existing = check;
        } else {
            self.checks.push(check);
        }
    }

    /// Look up a check by name.
    pub fn get(&self, name: &str) -> Option<&dyn AnalystCheck> {
        self.checks
            .iter()
            .find(|c| c.name() == name)
            .map(Box::as_ref)
    }

    /// All registered checks, in registration order.
    pub fn list_all(&self) -> Vec<&dyn AnalystCheck> {
        self.checks.iter().map(Box::as_ref).collect()
    }

    /// Checks applicable to the given context, in registration order.
    pub fn get_applicable(&self, context: &BusinessContext) -> Vec<&dyn AnalystCheck> {
        self.checks
            .iter()
            .filter(|c| c.is_applicable(context))
            .map(Box::as_ref)
            .collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
