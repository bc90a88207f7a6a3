pub mod collect;
pub mod continuation;
pub mod definitions;
pub mod extract;
pub mod fixtures;
pub mod io;
pub mod item;
pub mod namespace;
pub mod options;
pub mod runner;
pub mod tokens;
pub mod walker;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use collect::{
    CollectError, CollectSettings, MARKER_NAME, TestItem, collect_file, collect_markdown_file,
    collect_python_module,
};
pub use definitions::{FenceTestDefinition, ObjectTestDefinition, StartLine};
pub use extract::{ExtractError, FenceExtractor, extract_fence_tests};
pub use fixtures::{FixtureError, FixtureRegistry, FixtureResolver};
pub use io::*;
pub use item::{NoCapture, OutputCapture, RunContext, TestOutcome, TestResult, run_item};
pub use namespace::{GlobalsProvider, Namespace, build_namespace};
pub use options::{DocumentFlavor, FenceOptions, FenceSyntax};
pub use runner::{
    ExceptionInfo, FrameSummary, PythonRunner, RegistryError, RunError, Runner, RunnerRegistry,
    TracebackStyle,
};
