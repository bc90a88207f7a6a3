//! Runners execute a fence and describe its failures.
//!
//! The [`Runner`] trait is the seam for custom execution strategies. The
//! default is [`PythonRunner`], which runs each fence in a fresh Python
//! interpreter process.

pub mod python;
pub mod registry;
pub mod report;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definitions::FenceTestDefinition;
use crate::namespace::Namespace;

pub use python::{DEFAULT_INTERPRETER, PythonRunner};
pub use registry::{RegistryError, RunnerRegistry};
pub use report::render_failure;

/// One entry of a Python stack summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub filename: String,
    pub lineno: usize,
    pub name: String,
    #[serde(default)]
    pub line: Option<String>,
}

/// What the executed code raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Whole stack, outermost first.
    pub frames: Vec<FrameSummary>,
    /// One-line summary such as `Exception: doh`.
    pub exconly: String,
}

#[derive(Error, Debug)]
pub enum RunError {
    /// The fence source does not parse.
    #[error("{}", .0.exconly)]
    Syntax(ExceptionInfo),
    /// The fence raised while executing.
    #[error("{}", .0.exconly)]
    Raised(ExceptionInfo),
    /// A check performed by a custom runner failed.
    #[error("{0}")]
    Failed(String),
    #[error("interpreter error: {0}")]
    Interpreter(String),
}

impl RunError {
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        match self {
            RunError::Syntax(info) | RunError::Raised(info) => Some(info),
            RunError::Failed(_) | RunError::Interpreter(_) => None,
        }
    }

    /// One-line summary of the failure.
    pub fn exconly(&self) -> String {
        match self {
            RunError::Syntax(info) | RunError::Raised(info) => info.exconly.clone(),
            RunError::Failed(message) => format!("AssertionError: {message}"),
            other => other.to_string(),
        }
    }
}

/// How much of a failure to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracebackStyle {
    /// Numbered code excerpt and traceback.
    #[default]
    Long,
    /// Traceback only.
    Short,
    /// A single summary line.
    Line,
}

impl FromStr for TracebackStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(TracebackStyle::Long),
            "short" => Ok(TracebackStyle::Short),
            "line" => Ok(TracebackStyle::Line),
            other => Err(format!("unknown traceback style '{other}'")),
        }
    }
}

impl fmt::Display for TracebackStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TracebackStyle::Long => "long",
            TracebackStyle::Short => "short",
            TracebackStyle::Line => "line",
        };
        f.write_str(s)
    }
}

/// Strategy for executing fence source.
pub trait Runner {
    /// Registry key, referenced from fences as `runner:<name>`.
    fn name(&self) -> &str;

    fn runtest(&self, test: &FenceTestDefinition, namespace: &Namespace) -> Result<(), RunError>;

    /// Render a failure of [`Runner::runtest`]. Never fails.
    fn repr_failure(
        &self,
        test: &FenceTestDefinition,
        error: &RunError,
        style: TracebackStyle,
    ) -> String {
        render_failure(test, error, style)
    }
}
