//! Discovery: turns candidate files into test items.

use std::fs;
use std::path::{Path, PathBuf};

use docfence_syntax::{ScanError, parse_module};
use relative_path::RelativePath;
use thiserror::Error;

use crate::definitions::{FenceTestDefinition, fence_test_name};
use crate::extract::{ExtractError, FenceExtractor};
use crate::io::{IoError, relative_to};
use crate::options::DocumentFlavor;
use crate::walker::{ObjectWalker, module_name_for};

/// Marker carried by every collected item.
pub const MARKER_NAME: &str = "markdown-docs";

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error("{}: {source}", path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("{}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: ScanError,
    },
}

/// One collected test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestItem {
    pub name: String,
    /// `<path relative to the root>::<name>`
    pub nodeid: String,
    pub markers: Vec<String>,
    pub definition: FenceTestDefinition,
}

impl TestItem {
    fn new(name: String, relative: &RelativePath, definition: FenceTestDefinition) -> Self {
        Self {
            nodeid: format!("{relative}::{name}"),
            name,
            markers: vec![MARKER_NAME.to_string()],
            definition,
        }
    }

    /// The source executed by this item.
    pub fn code(&self) -> &str {
        &self.definition.source
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| m == marker)
    }
}

#[derive(Debug, Clone)]
pub struct CollectSettings {
    /// Nothing is collected unless enabled.
    pub enabled: bool,
    pub extractor: FenceExtractor,
    /// Node ids are relative to this directory.
    pub root: PathBuf,
}

impl CollectSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            extractor: FenceExtractor::default(),
            root: root.into(),
        }
    }
}

fn read(path: &Path) -> Result<String, CollectError> {
    fs::read_to_string(path).map_err(|e| CollectError::Io {
        path: path.to_path_buf(),
        source: IoError::Io(e),
    })
}

/// Collect `path` according to its suffix.
///
/// Returns `Ok(None)` when collection is disabled or the file is not a
/// candidate.
pub fn collect_file(
    path: &Path,
    settings: &CollectSettings,
) -> Result<Option<Vec<TestItem>>, CollectError> {
    if !settings.enabled {
        return Ok(None);
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => collect_python_module(path, settings).map(Some),
        Some(_) if DocumentFlavor::from_path(path).is_some() => {
            collect_markdown_file(path, settings).map(Some)
        }
        _ => Ok(None),
    }
}

/// Collect the fences of a Markdown or MDX document.
pub fn collect_markdown_file(
    path: &Path,
    settings: &CollectSettings,
) -> Result<Vec<TestItem>, CollectError> {
    let text = read(path)?;
    let flavor = DocumentFlavor::from_path(path).unwrap_or_default();
    let relative = relative_to(path, &settings.root);

    let mut items = Vec::new();
    for (index, fence) in settings
        .extractor
        .extract(&text, 0, flavor, path)
        .enumerate()
    {
        let fence = fence.map_err(|source| CollectError::Extract {
            path: path.to_path_buf(),
            source,
        })?;
        items.push(TestItem::new(
            fence_test_name(index, fence.start_line),
            &relative,
            fence,
        ));
    }
    log::debug!("Collected {} item(s) from {}", items.len(), relative);
    Ok(items)
}

/// Collect the fences in docstrings of a Python module.
pub fn collect_python_module(
    path: &Path,
    settings: &CollectSettings,
) -> Result<Vec<TestItem>, CollectError> {
    let text = read(path)?;
    let relative = relative_to(path, &settings.root);
    let module_name = module_name_for(&relative.to_path(""));

    let tree = parse_module(&text, &module_name).map_err(|source| CollectError::Scan {
        path: path.to_path_buf(),
        source,
    })?;
    let tests = ObjectWalker::new(&tree, &module_name, path, settings.extractor)
        .walk()
        .map_err(|source| CollectError::Extract {
            path: path.to_path_buf(),
            source,
        })?;

    let items: Vec<TestItem> = tests
        .into_iter()
        .map(|test| TestItem::new(test.test_name(), &relative, test.fence_test))
        .collect();
    log::debug!("Collected {} item(s) from module {}", items.len(), module_name);
    Ok(items)
}
