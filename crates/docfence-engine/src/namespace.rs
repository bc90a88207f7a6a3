use std::collections::BTreeMap;

use serde_json::Value;

/// Names bound into the global scope of one fence execution.
pub type Namespace = BTreeMap<String, Value>;

/// A contributor of global names for every fence.
pub trait GlobalsProvider {
    fn globals(&self) -> Namespace;
}

impl GlobalsProvider for Namespace {
    fn globals(&self) -> Namespace {
        self.clone()
    }
}

/// Build a fresh namespace: every global set in order, later sets winning,
/// then the resolved fixture values on top.
pub fn build_namespace(providers: &[&dyn GlobalsProvider], fixtures: Namespace) -> Namespace {
    let mut namespace = Namespace::new();
    for provider in providers {
        namespace.extend(provider.globals());
    }
    namespace.extend(fixtures);
    namespace
}
