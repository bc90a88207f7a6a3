//! Fence extraction: turns a Markdown document into fence test definitions.

use std::path::{Path, PathBuf};

use pulldown_cmark::Options;
use thiserror::Error;

use crate::continuation::ContinuationChain;
use crate::definitions::FenceTestDefinition;
use crate::options::{
    DocumentFlavor, FenceSyntax, is_metadata_comment, metadata_comment_options,
    parse_fence_info,
};
use crate::tokens::{BlockToken, TokenKind, tokenize};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("multiple runners are not supported, got: {}", runners.join(", "))]
    MultipleRunners { runners: Vec<String> },
}

/// Parser settings shared by every document of a session.
#[derive(Debug, Clone, Copy)]
pub struct FenceExtractor {
    pub syntax: FenceSyntax,
    /// Extensions enabled on the Markdown parser.
    pub markdown: Options,
}

impl Default for FenceExtractor {
    fn default() -> Self {
        Self::new(FenceSyntax::Default)
    }
}

impl FenceExtractor {
    pub fn new(syntax: FenceSyntax) -> Self {
        Self {
            syntax,
            markdown: Options::empty(),
        }
    }

    pub fn with_markdown_options(mut self, markdown: Options) -> Self {
        self.markdown = markdown;
        self
    }

    /// Extract the executable fences of `text` in document order.
    ///
    /// `start_line_offset` is the number of file lines preceding `text`,
    /// 0 for a whole document.
    pub fn extract(
        &self,
        text: &str,
        start_line_offset: usize,
        flavor: DocumentFlavor,
        source_path: &Path,
    ) -> FenceTests {
        FenceTests {
            tokens: tokenize(text, self.markdown),
            position: 0,
            chain: ContinuationChain::new(),
            offset: start_line_offset,
            flavor,
            syntax: self.syntax,
            source_path: source_path.to_path_buf(),
            failed: false,
        }
    }
}

/// Extract fences with the default Markdown parser settings.
pub fn extract_fence_tests(
    text: &str,
    start_line_offset: usize,
    flavor: DocumentFlavor,
    syntax: FenceSyntax,
    source_path: &Path,
) -> FenceTests {
    FenceExtractor::new(syntax).extract(text, start_line_offset, flavor, source_path)
}

/// Lazy iterator over the fences of one document.
///
/// Stops after the first error.
pub struct FenceTests {
    tokens: Vec<BlockToken>,
    position: usize,
    chain: ContinuationChain,
    offset: usize,
    flavor: DocumentFlavor,
    syntax: FenceSyntax,
    source_path: PathBuf,
    failed: bool,
}

impl FenceTests {
    fn metadata_comment_before(&self, index: usize) -> Option<&BlockToken> {
        if !self.flavor.reads_metadata_comments() {
            return None;
        }
        let token = self.tokens.get(index.checked_sub(2)?)?;
        (token.kind == TokenKind::Inline && is_metadata_comment(&token.content)).then_some(token)
    }

    fn definition_at(
        &mut self,
        index: usize,
    ) -> Option<Result<FenceTestDefinition, ExtractError>> {
        let token = &self.tokens[index];
        if token.kind != TokenKind::Fence {
            return None;
        }
        let map = token.map?;

        let mut info = parse_fence_info(&token.info, self.syntax);
        if let Some(comment) = self.metadata_comment_before(index) {
            info.options.merge(metadata_comment_options(&comment.content));
        }
        if !info.is_python() || info.options.is_notest() {
            return None;
        }

        let runner_name = match info.options.runner_name() {
            Ok(name) => name,
            Err(e) => return Some(Err(e)),
        };

        let start_line = self.offset + map.start + 1;
        if !info.options.is_continuation() {
            self.chain.reset();
        }
        let content = self.tokens[index].content.clone();
        let (source, start_line) = self.chain.extend(&content, start_line);

        log::debug!(
            "Found fence at {}:{} with options {:?}",
            self.source_path.display(),
            start_line,
            info.options.tokens()
        );

        Some(Ok(FenceTestDefinition {
            source,
            fixture_names: info.options.fixture_names(),
            start_line,
            source_path: self.source_path.clone(),
            runner_name,
        }))
    }
}

impl Iterator for FenceTests {
    type Item = Result<FenceTestDefinition, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.position < self.tokens.len() {
            let index = self.position;
            self.position += 1;
            if let Some(result) = self.definition_at(index) {
                self.failed = result.is_err();
                return Some(result);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for FenceTests {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::StartLine;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn extract(text: &str, flavor: DocumentFlavor, syntax: FenceSyntax) -> Vec<FenceTestDefinition> {
        extract_fence_tests(text, 0, flavor, syntax, Path::new("doc.md"))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn extract_md(text: &str) -> Vec<FenceTestDefinition> {
        extract(text, DocumentFlavor::Markdown, FenceSyntax::Default)
    }

    #[test]
    fn test_single_fence_source_is_padded_content() {
        let tests = extract_md("```python\nx = 1\n```\n");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].source, "\nx = 1\n");
        assert_eq!(tests[0].start_line, StartLine::Exact(1));
        assert_eq!(tests[0].source.trim_start_matches('\n'), "x = 1\n");
    }

    #[test]
    fn test_non_python_and_notest_are_skipped() {
        let text = "\
```
plain
```

```js
1
```

```python notest
skip()
```

```py
ok()
```
";
        let tests = extract_md(text);
        assert_eq!(tests.len(), 1);
        assert!(tests[0].source.ends_with("ok()\n"));
        assert_eq!(tests[0].start_line, StartLine::Exact(13));
    }

    #[test]
    fn test_non_continuation_fences_are_independent() {
        let text = "```python\na = 1\n```\n\n```python\nb = 2\n```\n";
        let tests = extract_md(text);
        assert_eq!(tests.len(), 2);
        assert!(!tests[1].source.contains("a = 1"));
        assert_eq!(tests[1].source, "\n\n\n\n\nb = 2\n");
    }

    #[test]
    fn test_continuation_chain_accumulates() {
        let text = "\
```python
a = 1
```

```python continuation
b = a + 1
```

```python continuation
assert b == 2
```
";
        let tests = extract_md(text);
        assert_eq!(tests.len(), 3);
        assert!(tests[1].source.starts_with(&tests[0].source));
        assert!(tests[2].source.starts_with(&tests[1].source));

        let lines: Vec<&str> = tests[2].source.lines().collect();
        assert_eq!(lines[1], "a = 1");
        assert_eq!(lines[5], "b = a + 1");
        assert_eq!(lines[9], "assert b == 2");
    }

    #[test]
    fn test_continuation_without_predecessor_starts_fresh() {
        let tests = extract_md("```python continuation\nx = 1\n```\n");
        assert_eq!(tests[0].source, "\nx = 1\n");
    }

    #[test]
    fn test_notest_fence_does_not_break_chain() {
        let text = "\
```python
a = 1
```

```python notest
ignored
```

```python continuation
assert a == 1
```
";
        let tests = extract_md(text);
        assert_eq!(tests.len(), 2);
        assert!(tests[1].source.contains("a = 1"));
        assert!(!tests[1].source.contains("ignored"));
    }

    #[test]
    fn test_fixtures_and_runner() {
        let tests = extract_md("```python fixture:db fixture:tmp runner:Custom\npass\n```\n");
        assert_eq!(tests[0].fixture_names, vec!["db", "tmp"]);
        assert_eq!(tests[0].runner_name.as_deref(), Some("Custom"));
    }

    #[test]
    fn test_multiple_runners_is_an_error_and_stops() {
        let text = "```python runner:a runner:b\npass\n```\n\n```python\npass\n```\n";
        let mut iter =
            extract_fence_tests(text, 0, DocumentFlavor::Markdown, FenceSyntax::Default, Path::new("x.md"));
        assert!(matches!(iter.next(), Some(Err(ExtractError::MultipleRunners { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_offset_shifts_start_line() {
        let tests: Vec<_> = extract_fence_tests(
            "```python\npass\n```\n",
            10,
            DocumentFlavor::Markdown,
            FenceSyntax::Default,
            Path::new("m.py"),
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(tests[0].start_line, StartLine::Exact(11));
        assert_eq!(tests[0].source.matches('\n').count(), 12);
    }

    #[rstest]
    #[case(DocumentFlavor::Mdx, 0)]
    #[case(DocumentFlavor::Markdown, 1)]
    fn test_mdx_notest_comment(#[case] flavor: DocumentFlavor, #[case] expected: usize) {
        let text = "{/* pmd-metadata: notest */}\n```python\nassert True\n```\n";
        assert_eq!(extract(text, flavor, FenceSyntax::Default).len(), expected);
    }

    #[test]
    fn test_mdx_comment_continuation_and_fixtures() {
        let text = "\
```python
b = \"hello\"
```
{/* pmd-metadata: continuation fixture:greeting */}
```python
assert b + \" world\" == \"hello world\"
```
";
        let tests = extract(text, DocumentFlavor::Mdx, FenceSyntax::Default);
        assert_eq!(tests.len(), 2);
        assert!(tests[1].source.contains("b = \"hello\""));
        assert_eq!(tests[1].fixture_names, vec!["greeting"]);
    }

    #[test]
    fn test_superfences_matches_default_syntax() {
        let default = extract(
            "```python\nb = 1\n```\n\n```python continuation fixture:x\nassert b\n```\n",
            DocumentFlavor::Markdown,
            FenceSyntax::Default,
        );
        let braces = extract(
            "```python\nb = 1\n```\n\n```{.python continuation fixture:x}\nassert b\n```\n",
            DocumentFlavor::Markdown,
            FenceSyntax::Superfences,
        );
        assert_eq!(default, braces);
    }

    #[test]
    fn test_superfences_language_not_first() {
        let tests = extract(
            "```{other_option .python .other-class}\npass\n```\n",
            DocumentFlavor::Markdown,
            FenceSyntax::Superfences,
        );
        assert_eq!(tests.len(), 1);
    }

    #[test]
    fn test_fence_in_block_quote() {
        let tests = extract_md("> ```python\n> x = 1\n> ```\n");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].start_line, StartLine::Exact(1));
    }
}
