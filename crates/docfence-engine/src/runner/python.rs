//! The default runner: one Python interpreter process per fence.
//!
//! The interpreter runs an embedded driver with `-c`. The driver reads a
//! JSON request from stdin, compiles the source under the document's path
//! so traceback frames point into the document, executes it in a fresh
//! module namespace and writes the outcome as JSON to the file named on its
//! command line. Standard output and error are inherited so anything the
//! fence prints stays visible.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{ExceptionInfo, RunError, Runner};
use crate::definitions::{FenceTestDefinition, StartLine};
use crate::namespace::Namespace;

pub const DEFAULT_INTERPRETER: &str = "python3";

const DRIVER: &str = include_str!("driver.py");

#[derive(Serialize)]
struct DriverRequest<'a> {
    source: &'a str,
    filename: &'a str,
    namespace: &'a Namespace,
    /// Lines of an unmapped source do not match the file on disk.
    register_source: bool,
}

#[derive(Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
enum DriverResult {
    Passed,
    Raised(ExceptionInfo),
    Syntax(ExceptionInfo),
}

#[derive(Debug, Clone)]
pub struct PythonRunner {
    interpreter: String,
}

impl Default for PythonRunner {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

impl PythonRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    fn interpreter_error(&self, what: &str, e: impl std::fmt::Display) -> RunError {
        RunError::Interpreter(format!("{what} ({}): {e}", self.interpreter))
    }
}

impl Runner for PythonRunner {
    fn name(&self) -> &str {
        "PythonRunner"
    }

    fn runtest(&self, test: &FenceTestDefinition, namespace: &Namespace) -> Result<(), RunError> {
        let filename = test.source_path.to_string_lossy();
        let request = serde_json::to_vec(&DriverRequest {
            source: &test.source,
            filename: &filename,
            namespace,
            register_source: test.start_line == StartLine::Unmapped,
        })
        .map_err(|e| self.interpreter_error("failed to encode request", e))?;

        let result_file = NamedTempFile::new()
            .map_err(|e| self.interpreter_error("failed to create result file", e))?;

        log::debug!("Running {} with {}", filename, self.interpreter);
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(DRIVER)
            .arg(result_file.path())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| self.interpreter_error("failed to start interpreter", e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .map_err(|e| self.interpreter_error("failed to send source", e))?;
        }
        let status = child
            .wait()
            .map_err(|e| self.interpreter_error("failed to wait for interpreter", e))?;

        let output = fs::read_to_string(result_file.path())
            .map_err(|e| self.interpreter_error("failed to read result", e))?;
        if output.trim().is_empty() {
            return Err(self.interpreter_error(
                "interpreter exited without a result",
                status,
            ));
        }

        let result: DriverResult = serde_json::from_str(&output)
            .map_err(|e| self.interpreter_error("malformed result", e))?;
        match result {
            DriverResult::Passed => Ok(()),
            DriverResult::Raised(info) => Err(RunError::Raised(info)),
            DriverResult::Syntax(info) => Err(RunError::Syntax(info)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    /// Whether the interpreter can run. A missing interpreter skips the test
    /// with a note, or fails it when `DOCFENCE_REQUIRE_PYTHON` is set.
    fn python_available() -> bool {
        let found = Command::new(DEFAULT_INTERPRETER)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        if !found {
            assert!(
                std::env::var_os("DOCFENCE_REQUIRE_PYTHON").is_none(),
                "{} is required but was not found on PATH",
                DEFAULT_INTERPRETER
            );
            eprintln!("skipping: {} not found on PATH", DEFAULT_INTERPRETER);
        }
        found
    }

    fn fence(source: &str) -> FenceTestDefinition {
        FenceTestDefinition {
            source: source.to_string(),
            fixture_names: vec![],
            start_line: StartLine::Exact(0),
            source_path: PathBuf::from("/docs/guide.md"),
            runner_name: None,
        }
    }

    #[test]
    fn test_passing_fence_with_namespace() {
        if !python_available() {
            return;
        }
        let namespace = Namespace::from([("a".to_string(), json!("hello"))]);
        let result = PythonRunner::default().runtest(
            &fence("assert a + ' world' == 'hello world'\n"),
            &namespace,
        );
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn test_raised_frames_point_into_document() {
        if !python_available() {
            return;
        }
        let err = PythonRunner::default()
            .runtest(&fence("\n\nraise ValueError('bad')\n"), &Namespace::new())
            .unwrap_err();
        let RunError::Raised(info) = &err else {
            panic!("expected a raised error, got {err:?}");
        };
        assert_eq!(info.exconly, "ValueError: bad");
        let last = info.frames.last().unwrap();
        assert_eq!(last.filename, "/docs/guide.md");
        assert_eq!(last.lineno, 3);
        assert_eq!(last.line.as_deref(), Some("raise ValueError('bad')"));
    }

    #[rstest::rstest]
    #[case::mapped_reads_file(StartLine::Exact(0), "x = 'from disk'")]
    #[case::unmapped_reads_fence(StartLine::Unmapped, "raise ValueError('bad')")]
    fn test_frame_lines_come_from_file_unless_unmapped(
        #[case] start_line: StartLine,
        #[case] expected: &str,
    ) {
        if !python_available() {
            return;
        }
        let mut document = NamedTempFile::new().unwrap();
        writeln!(document, "x = 'from disk'").unwrap();

        let test = FenceTestDefinition {
            start_line,
            source_path: document.path().to_path_buf(),
            ..fence("raise ValueError('bad')\n")
        };
        let err = PythonRunner::default()
            .runtest(&test, &Namespace::new())
            .unwrap_err();

        let frame = err.exception().unwrap().frames.last().unwrap();
        assert_eq!(frame.lineno, 1);
        assert_eq!(frame.line.as_deref(), Some(expected));
    }

    #[test]
    fn test_syntax_error() {
        if !python_available() {
            return;
        }
        let err = PythonRunner::default()
            .runtest(&fence("**@ # this is a syntax error\n"), &Namespace::new())
            .unwrap_err();
        assert!(matches!(err, RunError::Syntax(_)), "{err:?}");
        assert!(err.exconly().contains("SyntaxError"));
    }

    #[test]
    fn test_missing_interpreter() {
        let runner = PythonRunner::new("docfence-no-such-python");
        let err = runner.runtest(&fence("pass\n"), &Namespace::new()).unwrap_err();
        assert!(matches!(err, RunError::Interpreter(_)));
    }
}
