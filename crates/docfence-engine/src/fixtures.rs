//! Named values injected into fence namespaces.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("fixture '{name}' not found\navailable fixtures: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },
    #[error("fixture '{name}' failed during setup: {source:#}")]
    SetupFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Host capability that provides fixture values to test items.
///
/// Values are resolved per item; [`FixtureResolver::teardown`] is called once
/// the item has run, whatever its outcome.
pub trait FixtureResolver {
    fn resolve(&mut self, name: &str) -> Result<Value, FixtureError>;

    /// Names resolved for every item without being requested.
    fn autouse(&self) -> Vec<String> {
        Vec::new()
    }

    fn teardown(&mut self) {}
}

type SetupFn = Box<dyn Fn() -> anyhow::Result<Value>>;
type TeardownFn = Box<dyn Fn() -> anyhow::Result<()>>;

enum FixtureKind {
    Static(Value),
    Setup {
        setup: SetupFn,
        teardown: Option<TeardownFn>,
    },
}

struct Fixture {
    kind: FixtureKind,
    autouse: bool,
}

/// In-memory [`FixtureResolver`] with static values and setup/teardown
/// closures.
#[derive(Default)]
pub struct FixtureRegistry {
    fixtures: BTreeMap<String, Fixture>,
    /// Values set up for the current item, in setup order.
    active: Vec<(String, Value)>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, name: impl Into<String>, value: Value, autouse: bool) {
        self.fixtures.insert(
            name.into(),
            Fixture {
                kind: FixtureKind::Static(value),
                autouse,
            },
        );
    }

    pub fn add_setup<S>(&mut self, name: impl Into<String>, setup: S, autouse: bool)
    where
        S: Fn() -> anyhow::Result<Value> + 'static,
    {
        self.insert_setup(name.into(), Box::new(setup), None, autouse);
    }

    pub fn add_setup_with_teardown<S, T>(
        &mut self,
        name: impl Into<String>,
        setup: S,
        teardown: T,
        autouse: bool,
    ) where
        S: Fn() -> anyhow::Result<Value> + 'static,
        T: Fn() -> anyhow::Result<()> + 'static,
    {
        self.insert_setup(name.into(), Box::new(setup), Some(Box::new(teardown)), autouse);
    }

    fn insert_setup(
        &mut self,
        name: String,
        setup: SetupFn,
        teardown: Option<TeardownFn>,
        autouse: bool,
    ) {
        self.fixtures.insert(
            name,
            Fixture {
                kind: FixtureKind::Setup { setup, teardown },
                autouse,
            },
        );
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fixtures.keys().map(String::as_str)
    }
}

impl FixtureResolver for FixtureRegistry {
    fn resolve(&mut self, name: &str) -> Result<Value, FixtureError> {
        if let Some((_, value)) = self.active.iter().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }

        let Some(fixture) = self.fixtures.get(name) else {
            return Err(FixtureError::NotFound {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            });
        };

        let value = match &fixture.kind {
            FixtureKind::Static(value) => value.clone(),
            FixtureKind::Setup { setup, .. } => {
                log::debug!("Setting up fixture {name}");
                setup().map_err(|source| FixtureError::SetupFailed {
                    name: name.to_string(),
                    source,
                })?
            }
        };
        self.active.push((name.to_string(), value.clone()));
        Ok(value)
    }

    fn autouse(&self) -> Vec<String> {
        self.fixtures
            .iter()
            .filter(|(_, f)| f.autouse)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn teardown(&mut self) {
        while let Some((name, _)) = self.active.pop() {
            let Some(Fixture {
                kind:
                    FixtureKind::Setup {
                        teardown: Some(teardown),
                        ..
                    },
                ..
            }) = self.fixtures.get(&name)
            else {
                continue;
            };
            log::debug!("Tearing down fixture {name}");
            if let Err(e) = teardown() {
                log::warn!("Teardown of fixture '{name}' failed: {e:#}");
            }
        }
    }
}
