//! A test session: configuration, collection, selection and the run loop.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use docfence_config::{Config, MarkdownExtension};
use docfence_engine::{
    CollectSettings, FenceExtractor, FenceSyntax, GlobalsProvider, NoCapture, PythonRunner,
    RunContext, RunnerRegistry, TestItem, TracebackStyle, collect_file, run_item,
    scan_candidate_files, validate_root,
};
use pulldown_cmark::Options;
use relative_path::RelativePath;

use crate::fixtures::fixture_registry;
use crate::reporter::{ConsoleReporter, TestSummary};

/// How a session ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Everything passed, or nothing was collected.
    Passed,
    TestsFailed,
}

impl SessionStatus {
    pub fn code(self) -> u8 {
        match self {
            SessionStatus::Passed => 0,
            SessionStatus::TestsFailed => 1,
        }
    }
}

const REPORT_WRITE_FAILED: &str = "Failed to write the test report";

/// Exit code for configuration and collection errors.
pub const USAGE_ERROR: u8 = 2;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Node ids and relative paths are computed against this directory.
    pub root: PathBuf,
    pub paths: Vec<PathBuf>,
    pub enable: bool,
    pub syntax: Option<FenceSyntax>,
    pub keyword: Option<String>,
    pub marker: Option<String>,
    pub style: TracebackStyle,
    pub exitfirst: bool,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub python: Option<String>,
    pub color: bool,
}

impl SessionOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: vec![PathBuf::from(".")],
            enable: false,
            syntax: None,
            keyword: None,
            marker: None,
            style: TracebackStyle::default(),
            exitfirst: false,
            verbose: false,
            config: None,
            python: None,
            color: false,
        }
    }
}

/// The config in effect: the file (explicit or `docfence.toml` in the root)
/// with command-line overrides applied, plus the directory its relative
/// paths resolve against.
fn effective_config(options: &SessionOptions) -> Result<(Config, PathBuf)> {
    let (mut config, base_dir) = match &options.config {
        Some(path) => {
            let path = options.root.join(path);
            let config = Config::load_from_path(&path)?
                .with_context(|| format!("Config file not found: {}", path.display()))?;
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (config, base_dir)
        }
        None => (Config::load(&options.root)?, options.root.clone()),
    };

    if options.enable {
        config.enabled = true;
    }
    if let Some(syntax) = options.syntax {
        config.syntax = syntax;
    }
    if let Some(python) = &options.python {
        config.python = python.clone();
    }
    Ok((config, base_dir))
}

pub fn markdown_options(extensions: &[MarkdownExtension]) -> Options {
    extensions
        .iter()
        .fold(Options::empty(), |options, extension| {
            options
                | match extension {
                    MarkdownExtension::Tables => Options::ENABLE_TABLES,
                    MarkdownExtension::Footnotes => Options::ENABLE_FOOTNOTES,
                    MarkdownExtension::Strikethrough => Options::ENABLE_STRIKETHROUGH,
                    MarkdownExtension::Tasklists => Options::ENABLE_TASKLISTS,
                    MarkdownExtension::SmartPunctuation => Options::ENABLE_SMART_PUNCTUATION,
                }
        })
}

/// `-k` expressions: a substring of the node id, or `not <substring>`.
fn matches_keyword(item: &TestItem, expression: &str) -> bool {
    match expression.trim().strip_prefix("not ") {
        Some(negated) => !item.nodeid.contains(negated.trim()),
        None => item.nodeid.contains(expression.trim()),
    }
}

/// `-m` expressions: a marker name, or `not <marker>`.
fn matches_marker(item: &TestItem, expression: &str) -> bool {
    match expression.trim().strip_prefix("not ") {
        Some(negated) => !item.has_marker(negated.trim()),
        None => item.has_marker(expression.trim()),
    }
}

fn is_selected(item: &TestItem, options: &SessionOptions) -> bool {
    options
        .keyword
        .as_deref()
        .is_none_or(|k| matches_keyword(item, k))
        && options
            .marker
            .as_deref()
            .is_none_or(|m| matches_marker(item, m))
}

fn collect(options: &SessionOptions, config: &Config) -> Result<Vec<TestItem>> {
    let settings = CollectSettings {
        enabled: config.enabled,
        extractor: FenceExtractor::new(config.syntax)
            .with_markdown_options(markdown_options(&config.markdown_extensions)),
        root: options.root.clone(),
    };
    let patterns = config.exclude_patterns()?;
    let is_excluded = |path: &RelativePath| patterns.iter().any(|p| p.matches(path.as_str()));

    let mut items = Vec::new();
    for target in &options.paths {
        let target = if target == Path::new(".") {
            options.root.clone()
        } else {
            options.root.join(target)
        };
        let files = scan_candidate_files(&target, &options.root, &is_excluded)
            .with_context(|| format!("Failed to scan {}", target.display()))?;
        for file in files {
            if let Some(collected) = collect_file(&file, &settings)? {
                items.extend(collected);
            }
        }
    }
    Ok(items)
}

/// Run a whole session, writing the report to `out`.
///
/// Configuration and collection problems are returned as errors before any
/// test runs.
pub fn run_session<W: Write>(options: &SessionOptions, out: W) -> Result<SessionStatus> {
    let started = Instant::now();
    validate_root(&options.root)?;
    let (config, base_dir) = effective_config(options)?;
    if !config.enabled {
        log::warn!(
            "Fence collection is disabled; pass --markdown-docs or set `enabled = true` in {}",
            docfence_config::CONFIG_FILE_NAME
        );
    }

    let collected = collect(options, &config)?;
    let total = collected.len();
    let items: Vec<TestItem> = collected
        .into_iter()
        .filter(|item| is_selected(item, options))
        .collect();

    let registry = RunnerRegistry::with_default_runner(PythonRunner::new(&config.python));
    for item in &items {
        registry
            .get(item.definition.runner_name.as_deref())
            .with_context(|| format!("Cannot run {}", item.nodeid))?;
    }

    let global_sets = config.global_sets(&base_dir)?;
    let globals: Vec<&dyn GlobalsProvider> = global_sets
        .iter()
        .map(|set| set as &dyn GlobalsProvider)
        .collect();
    let mut fixtures = fixture_registry(&config, &options.root);
    let mut capture = NoCapture;

    let mut reporter = ConsoleReporter::new(out, options.verbose, options.color);
    let mut summary = TestSummary {
        deselected: total - items.len(),
        ..TestSummary::default()
    };
    reporter.on_collection_complete(total, summary.deselected).context(REPORT_WRITE_FAILED)?;

    for item in &items {
        reporter.on_test_start(item).context(REPORT_WRITE_FAILED)?;
        let mut ctx = RunContext {
            registry: &registry,
            globals: &globals,
            fixtures: &mut fixtures,
            capture: &mut capture,
            style: options.style,
        };
        let result = run_item(item, &mut ctx);
        summary.record(&result.outcome);
        reporter.on_test_complete(item, &result).context(REPORT_WRITE_FAILED)?;

        if options.exitfirst && !result.outcome.is_passed() {
            log::info!("Stopping after first failure");
            break;
        }
    }

    summary.duration = started.elapsed();
    reporter.on_run_complete(&summary).context(REPORT_WRITE_FAILED)?;

    Ok(if summary.is_success() {
        SessionStatus::Passed
    } else {
        SessionStatus::TestsFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfence_engine::{FenceTestDefinition, StartLine};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn item(nodeid: &str) -> TestItem {
        TestItem {
            name: nodeid.to_string(),
            nodeid: nodeid.to_string(),
            markers: vec!["markdown-docs".to_string()],
            definition: FenceTestDefinition {
                source: String::new(),
                fixture_names: vec![],
                start_line: StartLine::Exact(1),
                source_path: PathBuf::from("doc.md"),
                runner_name: None,
            },
        }
    }

    #[rstest]
    #[case("guide", true)]
    #[case("CodeFence#2", false)]
    #[case("not guide", false)]
    #[case("not readme", true)]
    fn test_keyword(#[case] expression: &str, #[case] expected: bool) {
        let item = item("docs/guide.md::[CodeFence#1][line:3]");
        assert_eq!(matches_keyword(&item, expression), expected);
    }

    #[rstest]
    #[case("markdown-docs", true)]
    #[case("slow", false)]
    #[case("not markdown-docs", false)]
    fn test_marker(#[case] expression: &str, #[case] expected: bool) {
        assert_eq!(matches_marker(&item("doc.md::x"), expression), expected);
    }

    #[test]
    fn test_markdown_options() {
        let options = markdown_options(&[MarkdownExtension::Tables, MarkdownExtension::Tasklists]);
        assert!(options.contains(Options::ENABLE_TABLES));
        assert!(options.contains(Options::ENABLE_TASKLISTS));
        assert!(!options.contains(Options::ENABLE_FOOTNOTES));
        assert_eq!(markdown_options(&[]), Options::empty());
    }

    #[test]
    fn test_flags_override_config() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("docfence.toml"),
            "syntax = \"superfences\"\npython = \"python3.11\"\n",
        )
        .unwrap();

        let options = SessionOptions {
            enable: true,
            syntax: Some(FenceSyntax::Default),
            ..SessionOptions::new(root.path())
        };
        let (config, base_dir) = effective_config(&options).unwrap();

        assert!(config.enabled);
        assert_eq!(config.syntax, FenceSyntax::Default);
        assert_eq!(config.python, "python3.11");
        assert_eq!(base_dir, root.path());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let root = TempDir::new().unwrap();
        let options = SessionOptions {
            config: Some(PathBuf::from("missing.toml")),
            ..SessionOptions::new(root.path())
        };
        let err = effective_config(&options).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_exclude_patterns_apply_to_relative_paths() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("drafts")).unwrap();
        fs::write(root.path().join("drafts/wip.md"), "```python\nx = 1\n```\n").unwrap();
        fs::write(root.path().join("guide.md"), "```python\nx = 1\n```\n").unwrap();

        let config = Config {
            enabled: true,
            exclude: vec!["drafts".to_string()],
            ..Config::default()
        };
        let items = collect(&SessionOptions::new(root.path()), &config).unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.nodeid.as_str()).collect();
        assert_eq!(ids, vec!["guide.md::[CodeFence#1][line:1]"]);
    }

    #[test]
    fn test_unknown_runner_fails_before_running() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("doc.md"),
            "```python\nx = 1\n```\n\n```python runner:Nope\nx = 2\n```\n",
        )
        .unwrap();
        let options = SessionOptions {
            enable: true,
            ..SessionOptions::new(root.path())
        };

        let mut out = Vec::new();
        let err = run_session(&options, &mut out).unwrap_err();

        assert!(format!("{err:#}").contains("no such runner: Nope"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_disabled_session_passes_with_nothing_collected() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("doc.md"), "```python\nassert False\n```\n").unwrap();

        let mut out = Vec::new();
        let status = run_session(&SessionOptions::new(root.path()), &mut out).unwrap();

        assert_eq!(status, SessionStatus::Passed);
        let output = String::from_utf8(out).unwrap();
        assert!(output.starts_with("collected 0 items\n"));
        assert!(output.contains("no tests ran"));
    }
}
