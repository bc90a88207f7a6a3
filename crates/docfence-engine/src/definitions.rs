use std::fmt;
use std::path::PathBuf;

/// Where a fence's code sits in its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartLine {
    /// Number of document lines before the first line of fence content,
    /// which is also the 1-based line of the opening delimiter.
    Exact(usize),
    /// The continuation chain could not be aligned with the document.
    Unmapped,
}

impl StartLine {
    pub fn exact(self) -> Option<usize> {
        match self {
            StartLine::Exact(n) => Some(n),
            StartLine::Unmapped => None,
        }
    }

    pub fn is_mapped(self) -> bool {
        matches!(self, StartLine::Exact(_))
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Exact(n) => write!(f, "{n}"),
            StartLine::Unmapped => f.write_str("?"),
        }
    }
}

/// One executable unit extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceTestDefinition {
    /// Code to execute, padded so its line numbers match the document.
    pub source: String,
    pub fixture_names: Vec<String>,
    pub start_line: StartLine,
    pub source_path: PathBuf,
    /// `None` selects the default runner.
    pub runner_name: Option<String>,
}

/// A fence found in the docstring of a Python object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTestDefinition {
    pub intra_object_index: usize,
    pub object_name: String,
    pub fence_test: FenceTestDefinition,
}

impl ObjectTestDefinition {
    /// `Parent.method[CodeFence#1][line:12]`
    pub fn test_name(&self) -> String {
        format!(
            "{}{}",
            self.object_name,
            fence_test_name(self.intra_object_index, self.fence_test.start_line)
        )
    }
}

/// `[CodeFence#<ordinal+1>][line:<start line>]`
pub fn fence_test_name(index: usize, start_line: StartLine) -> String {
    format!("[CodeFence#{}][line:{}]", index + 1, start_line)
}
