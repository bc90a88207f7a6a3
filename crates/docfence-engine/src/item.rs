//! Running one collected item: fixture setup, execution, teardown.

use std::time::{Duration, Instant};

use crate::collect::TestItem;
use crate::fixtures::FixtureResolver;
use crate::namespace::{GlobalsProvider, Namespace, build_namespace};
use crate::runner::{RunnerRegistry, TracebackStyle};

/// Host output capturing, suspended while a fence runs so its output
/// reaches the terminal.
pub trait OutputCapture {
    fn suspend(&mut self);
    fn resume(&mut self);
}

/// An [`OutputCapture`] that captures nothing.
#[derive(Debug, Default)]
pub struct NoCapture;

impl OutputCapture for NoCapture {
    fn suspend(&mut self) {}
    fn resume(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { report: String },
    /// Setup failed; the fence never ran.
    Error { report: String },
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub outcome: TestOutcome,
    pub duration: Duration,
}

/// Everything an item needs from the session to run.
pub struct RunContext<'a> {
    pub registry: &'a RunnerRegistry,
    pub globals: &'a [&'a dyn GlobalsProvider],
    pub fixtures: &'a mut dyn FixtureResolver,
    pub capture: &'a mut dyn OutputCapture,
    pub style: TracebackStyle,
}

fn setup_error(item: &TestItem, message: impl std::fmt::Display) -> TestOutcome {
    TestOutcome::Error {
        report: format!(
            "file {}, line {}\n  {}",
            item.definition.source_path.display(),
            item.definition.start_line,
            message.to_string().replace('\n', "\n  ")
        ),
    }
}

/// Names to resolve for `item`: autouse fixtures first, then the fence's
/// own, without repeats.
fn requested_fixtures(item: &TestItem, fixtures: &dyn FixtureResolver) -> Vec<String> {
    let mut names = fixtures.autouse();
    for name in &item.definition.fixture_names {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

fn setup(item: &TestItem, fixtures: &mut dyn FixtureResolver) -> Result<Namespace, TestOutcome> {
    let mut values = Namespace::new();
    for name in requested_fixtures(item, fixtures) {
        let value = fixtures.resolve(&name).map_err(|e| setup_error(item, e))?;
        values.insert(name, value);
    }
    Ok(values)
}

/// Run `item` and report its outcome. Fixture teardown always happens.
pub fn run_item(item: &TestItem, ctx: &mut RunContext<'_>) -> TestResult {
    let started = Instant::now();
    let outcome = execute(item, ctx);
    ctx.fixtures.teardown();
    log::debug!("{} finished: {:?}", item.nodeid, outcome);
    TestResult {
        outcome,
        duration: started.elapsed(),
    }
}

fn execute(item: &TestItem, ctx: &mut RunContext<'_>) -> TestOutcome {
    let fixture_values = match setup(item, ctx.fixtures) {
        Ok(values) => values,
        Err(outcome) => return outcome,
    };
    let runner = match ctx.registry.get(item.definition.runner_name.as_deref()) {
        Ok(runner) => runner,
        Err(e) => return setup_error(item, e),
    };

    let namespace = build_namespace(ctx.globals, fixture_values);
    ctx.capture.suspend();
    let result = runner.runtest(&item.definition, &namespace);
    ctx.capture.resume();

    match result {
        Ok(()) => TestOutcome::Passed,
        Err(e) => TestOutcome::Failed {
            report: runner.repr_failure(&item.definition, &e, ctx.style),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{FenceTestDefinition, StartLine};
    use crate::fixtures::FixtureRegistry;
    use crate::runner::{RunError, Runner};
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Records the namespace it was given and fails on `fail` in the source.
    struct Recording {
        seen: Rc<RefCell<Vec<Namespace>>>,
    }

    impl Runner for Recording {
        fn name(&self) -> &str {
            "Recording"
        }

        fn runtest(&self, test: &FenceTestDefinition, namespace: &Namespace) -> Result<(), RunError> {
            self.seen.borrow_mut().push(namespace.clone());
            if test.source.contains("fail") {
                return Err(RunError::Failed("asked to fail".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingCapture {
        suspended: usize,
        resumed: usize,
    }

    impl OutputCapture for CountingCapture {
        fn suspend(&mut self) {
            self.suspended += 1;
        }
        fn resume(&mut self) {
            self.resumed += 1;
        }
    }

    fn item(source: &str, fixtures: &[&str]) -> TestItem {
        TestItem {
            name: "[CodeFence#1][line:1]".to_string(),
            nodeid: "doc.md::[CodeFence#1][line:1]".to_string(),
            markers: vec!["markdown-docs".to_string()],
            definition: FenceTestDefinition {
                source: source.to_string(),
                fixture_names: fixtures.iter().map(|f| f.to_string()).collect(),
                start_line: StartLine::Exact(1),
                source_path: PathBuf::from("doc.md"),
                runner_name: None,
            },
        }
    }

    fn run(
        item: &TestItem,
        globals: &[&dyn GlobalsProvider],
        fixtures: &mut FixtureRegistry,
    ) -> (TestOutcome, Vec<Namespace>, CountingCapture) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = RunnerRegistry::new();
        registry.register(
            Recording {
                seen: Rc::clone(&seen),
            },
            true,
        );
        let mut capture = CountingCapture::default();
        let mut ctx = RunContext {
            registry: &registry,
            globals,
            fixtures,
            capture: &mut capture,
            style: TracebackStyle::Long,
        };
        let result = run_item(item, &mut ctx);
        let seen = seen.borrow().clone();
        (result.outcome, seen, capture)
    }

    #[test]
    fn test_fixture_overrides_global() {
        let globals = Namespace::from([("some_global".to_string(), json!("foo"))]);
        let mut fixtures = FixtureRegistry::new();
        fixtures.add_value("some_global", json!("bar"), false);

        let (outcome, seen, _) = run(&item("x", &[]), &[&globals], &mut fixtures);
        assert_eq!(outcome, TestOutcome::Passed);
        assert_eq!(seen[0]["some_global"], json!("foo"));

        let (_, seen, _) = run(&item("x", &["some_global"]), &[&globals], &mut fixtures);
        assert_eq!(seen[0]["some_global"], json!("bar"));
    }

    #[test]
    fn test_missing_fixture_is_setup_error() {
        let mut fixtures = FixtureRegistry::new();
        fixtures.add_value("foo", json!(null), false);

        let (outcome, seen, capture) = run(&item("x", &["bar"]), &[], &mut fixtures);
        let TestOutcome::Error { report } = outcome else {
            panic!("expected a setup error");
        };
        assert!(report.contains("fixture 'bar' not found"));
        assert!(seen.is_empty());
        assert_eq!(capture.suspended, 0);
    }

    #[test]
    fn test_autouse_fixture_is_bound() {
        let mut fixtures = FixtureRegistry::new();
        fixtures.add_value("initialize", json!(1), true);

        let (_, seen, _) = run(&item("x", &[]), &[], &mut fixtures);
        assert_eq!(seen[0]["initialize"], json!(1));
    }

    #[test]
    fn test_failure_report_and_capture_restored() {
        let mut fixtures = FixtureRegistry::new();
        let (outcome, _, capture) = run(&item("fail", &[]), &[], &mut fixtures);
        let TestOutcome::Failed { report } = outcome else {
            panic!("expected a failure");
        };
        assert!(report.contains("AssertionError: asked to fail"));
        assert_eq!((capture.suspended, capture.resumed), (1, 1));
    }

    #[test]
    fn test_teardown_runs_after_failure() {
        let torn_down = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&torn_down);
        let mut fixtures = FixtureRegistry::new();
        fixtures.add_setup_with_teardown(
            "resource",
            || Ok(json!("ready")),
            move || {
                *flag.borrow_mut() = true;
                Ok(())
            },
            false,
        );

        let (outcome, _, _) = run(&item("fail", &["resource"]), &[], &mut fixtures);
        assert!(matches!(outcome, TestOutcome::Failed { .. }));
        assert!(*torn_down.borrow());
    }
}
