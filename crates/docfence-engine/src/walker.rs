//! Docstring walker over a scanned Python module.
//!
//! Visits every documented class, function and method reachable from the
//! module through public member names (inherited ones included), and extracts the fences of each
//! docstring with line numbers relative to the `.py` file.

use std::collections::HashSet;
use std::path::Path;

use docfence_syntax::{Entity, EntityId, ModuleTree};

use crate::definitions::ObjectTestDefinition;
use crate::extract::{ExtractError, FenceExtractor};
use crate::options::DocumentFlavor;

pub struct ObjectWalker<'a> {
    tree: &'a ModuleTree,
    module_name: &'a str,
    source_path: &'a Path,
    extractor: FenceExtractor,
}

#[derive(Default)]
struct WalkState {
    visited: HashSet<EntityId>,
    seen_lines: HashSet<(String, usize)>,
    found: Vec<ObjectTestDefinition>,
}

impl<'a> ObjectWalker<'a> {
    pub fn new(
        tree: &'a ModuleTree,
        module_name: &'a str,
        source_path: &'a Path,
        extractor: FenceExtractor,
    ) -> Self {
        Self {
            tree,
            module_name,
            source_path,
            extractor,
        }
    }

    /// Collect the fence tests of every reachable documented entity.
    ///
    /// Children come before their parent. A fence reachable through several
    /// member paths is reported once.
    pub fn walk(&self) -> Result<Vec<ObjectTestDefinition>, ExtractError> {
        let mut state = WalkState::default();
        self.visit(self.tree.root(), &mut state)?;
        Ok(state.found)
    }

    fn visit(&self, id: EntityId, state: &mut WalkState) -> Result<(), ExtractError> {
        if !state.visited.insert(id) {
            return Ok(());
        }
        let entity = self.tree.get(id);

        for member in self.tree.members_with_inherited(id) {
            if member.name.starts_with('_') {
                continue;
            }
            self.visit(member.target, state)?;
        }

        self.docstring_tests(entity, state)
    }

    fn docstring_tests(&self, entity: &Entity, state: &mut WalkState) -> Result<(), ExtractError> {
        let Some(docstring) = &entity.docstring else {
            return Ok(());
        };
        let resolved = match docstring.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!(
                    "Skipping docstring of {} in {}: {}",
                    entity.qualname,
                    self.source_path.display(),
                    e
                );
                return Ok(());
            }
        };

        let fences = self.extractor.extract(
            &resolved.text,
            resolved.line.saturating_sub(1),
            DocumentFlavor::Markdown,
            self.source_path,
        );
        for (index, fence) in fences.enumerate() {
            let fence = fence?;
            if let Some(line) = fence.start_line.exact()
                && !state.seen_lines.insert((self.module_name.to_string(), line))
            {
                log::debug!("Duplicate fence at {}:{}", self.module_name, line);
                continue;
            }
            state.found.push(ObjectTestDefinition {
                intra_object_index: index,
                object_name: entity.qualname.clone(),
                fence_test: fence,
            });
        }
        Ok(())
    }
}

/// Dotted module name for a `.py` file relative to the collection root.
///
/// `pkg/sub/mod.py` becomes `pkg.sub.mod`; `pkg/__init__.py` becomes `pkg`.
pub fn module_name_for(relative: &Path) -> String {
    let stem = relative.with_extension("");
    let mut parts: Vec<String> = stem
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| p == "__init__") {
        parts.pop();
    }
    parts.join(".")
}
