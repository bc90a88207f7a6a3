use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::{PythonRunner, Runner};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no such runner: {name} (available: {})", available.join(", "))]
    UnknownRunner { name: String, available: Vec<String> },
    #[error("no default runner registered")]
    NoDefault,
}

/// Runners by name, plus the one used by fences without `runner:`.
///
/// Filled before collection and only read afterwards.
#[derive(Default, Clone)]
pub struct RunnerRegistry {
    runners: BTreeMap<String, Arc<dyn Runner>>,
    default: Option<String>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose default is the given Python runner.
    pub fn with_default_runner(python: PythonRunner) -> Self {
        let mut registry = Self::new();
        registry.register(python, true);
        registry
    }

    /// Register `runner` under its own name, replacing any runner of the
    /// same name.
    pub fn register(&mut self, runner: impl Runner + 'static, default: bool) {
        let name = runner.name().to_string();
        log::debug!("Registering runner {name}{}", if default { " (default)" } else { "" });
        if default {
            self.default = Some(name.clone());
        }
        self.runners.insert(name, Arc::new(runner));
    }

    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn Runner>, RegistryError> {
        let key = match name {
            Some(name) => name,
            None => self.default.as_deref().ok_or(RegistryError::NoDefault)?,
        };
        self.runners
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRunner {
                name: key.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.runners.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::FenceTestDefinition;
    use crate::namespace::Namespace;
    use crate::runner::RunError;

    struct Named(&'static str);

    impl Runner for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn runtest(&self, _: &FenceTestDefinition, _: &Namespace) -> Result<(), RunError> {
            Ok(())
        }
    }

    #[test]
    fn test_get_by_name_and_default() {
        let mut registry = RunnerRegistry::new();
        registry.register(Named("Base"), true);
        registry.register(Named("Custom"), false);

        assert_eq!(registry.get(None).unwrap().name(), "Base");
        assert_eq!(registry.get(Some("Custom")).unwrap().name(), "Custom");
    }

    #[test]
    fn test_unknown_runner_lists_available() {
        let mut registry = RunnerRegistry::with_default_runner(PythonRunner::default());
        registry.register(Named("Custom"), false);
        let err = registry.get(Some("Missing")).err().unwrap();
        assert_eq!(
            err,
            RegistryError::UnknownRunner {
                name: "Missing".to_string(),
                available: vec!["Custom".to_string(), "PythonRunner".to_string()],
            }
        );
        assert_eq!(
            err.to_string(),
            "no such runner: Missing (available: Custom, PythonRunner)"
        );
    }

    #[test]
    fn test_no_default() {
        let mut registry = RunnerRegistry::new();
        registry.register(Named("Custom"), false);
        assert_eq!(registry.get(None).err(), Some(RegistryError::NoDefault));
    }

    #[test]
    fn test_later_default_replaces_earlier() {
        let mut registry = RunnerRegistry::with_default_runner(PythonRunner::default());
        registry.register(Named("Replacement"), true);
        assert_eq!(registry.get(None).unwrap().name(), "Replacement");
        assert!(registry.get(Some("PythonRunner")).is_ok());
    }
}
