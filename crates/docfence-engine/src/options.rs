//! Fence option parsing.
//!
//! Options come from the fence info string, in one of two syntaxes, and for
//! MDX documents also from a metadata comment placed right above the fence:
//!
//! ```text
//! ```python continuation fixture:db        default syntax
//! ```{.python continuation fixture:db}     superfences syntax
//! {/* pmd-metadata: continuation */}       MDX metadata comment
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::ExtractError;

pub const CONTINUATION: &str = "continuation";
pub const NOTEST: &str = "notest";
pub const FIXTURE_PREFIX: &str = "fixture:";
pub const RUNNER_PREFIX: &str = "runner:";
pub const METADATA_TAG: &str = "pmd-metadata:";

/// Languages whose fences are executed.
pub const PYTHON_LANGUAGES: [&str; 3] = ["py", "python", "python3"];

/// Grammar used for fence info strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FenceSyntax {
    #[default]
    Default,
    /// PyMdown Superfences: `{.python continuation}`
    Superfences,
}

impl FromStr for FenceSyntax {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(FenceSyntax::Default),
            "superfences" => Ok(FenceSyntax::Superfences),
            other => Err(format!(
                "unknown fence syntax '{other}' (expected 'default' or 'superfences')"
            )),
        }
    }
}

impl fmt::Display for FenceSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenceSyntax::Default => f.write_str("default"),
            FenceSyntax::Superfences => f.write_str("superfences"),
        }
    }
}

/// Document flavor, which decides whether metadata comments are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFlavor {
    #[default]
    Markdown,
    Mdx,
}

impl DocumentFlavor {
    /// `.md` is Markdown; `.mdx` and `.svx` are MDX. Anything else is not a
    /// document.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "md" => Some(DocumentFlavor::Markdown),
            "mdx" | "svx" => Some(DocumentFlavor::Mdx),
            _ => None,
        }
    }

    pub fn reads_metadata_comments(self) -> bool {
        self == DocumentFlavor::Mdx
    }
}

/// The normalized option set of one fence. Insertion ordered, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceOptions {
    tokens: Vec<String>,
}

impl FenceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !token.is_empty() && !self.tokens.contains(&token) {
            self.tokens.push(token);
        }
    }

    pub fn merge(&mut self, other: FenceOptions) {
        for token in other.tokens {
            self.insert(token);
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_continuation(&self) -> bool {
        self.contains(CONTINUATION)
    }

    pub fn is_notest(&self) -> bool {
        self.contains(NOTEST)
    }

    pub fn fixture_names(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter_map(|t| t.strip_prefix(FIXTURE_PREFIX))
            .map(str::to_string)
            .collect()
    }

    /// The `runner:` selector, if any. More than one is a configuration
    /// error.
    pub fn runner_name(&self) -> Result<Option<String>, ExtractError> {
        let runners: Vec<&str> = self
            .tokens
            .iter()
            .filter_map(|t| t.strip_prefix(RUNNER_PREFIX))
            .collect();
        match runners.as_slice() {
            [] => Ok(None),
            [name] => Ok(Some(name.to_string())),
            many => Err(ExtractError::MultipleRunners {
                runners: many.iter().map(|r| r.to_string()).collect(),
            }),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FenceOptions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut options = FenceOptions::new();
        for token in iter {
            options.insert(token);
        }
        options
    }
}

/// Language and options of a fence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceInfo {
    pub language: Option<String>,
    pub options: FenceOptions,
}

impl FenceInfo {
    pub fn is_python(&self) -> bool {
        self.language
            .as_deref()
            .is_some_and(|lang| PYTHON_LANGUAGES.contains(&lang))
    }
}

/// Split an info string with the default grammar: language first, then
/// options.
pub fn parse_default_info(info: &str) -> Vec<String> {
    info.split_whitespace().map(str::to_string).collect()
}

/// Parse PyMdown Superfences brace syntax: `{.<lang> <option> ...}`.
///
/// The language is the first token starting with a dot and may appear
/// anywhere inside the braces. Without a leading brace the default grammar
/// applies, so both styles can be mixed in one document.
pub fn parse_superfences_info(info: &str) -> Vec<String> {
    let info = info.trim();
    if !info.starts_with('{') {
        return parse_default_info(info);
    }

    let mut parts = parse_default_info(info.trim_matches(['{', '}']));
    if let Some(pos) = parts.iter().position(|p| p.starts_with('.')) {
        let dot_lang = parts.remove(pos);
        parts.insert(0, dot_lang[1..].to_string());
    }
    parts
}

/// Parse an info string into language and options.
pub fn parse_fence_info(info: &str, syntax: FenceSyntax) -> FenceInfo {
    let parts = match syntax {
        FenceSyntax::Default => parse_default_info(info),
        FenceSyntax::Superfences => parse_superfences_info(info),
    };
    let language = parts.first().cloned();
    let options = parts
        .into_iter()
        .filter(|p| Some(p) != language.as_ref())
        .collect();
    FenceInfo { language, options }
}

fn metadata_comment_regex() -> &'static Regex {
    static MDX_COMMENT: OnceLock<Regex> = OnceLock::new();
    MDX_COMMENT.get_or_init(|| {
        Regex::new(r"(?s)^\{/\*(.*)\*/\}$").expect("Invalid metadata comment regex")
    })
}

/// Whether inline content is an MDX metadata comment:
/// `{/* pmd-metadata: <options> */}`.
pub fn is_metadata_comment(content: &str) -> bool {
    let trimmed = content.trim();
    metadata_comment_regex().is_match(trimmed) && trimmed.contains(METADATA_TAG)
}

/// Options carried by an MDX metadata comment.
pub fn metadata_comment_options(content: &str) -> FenceOptions {
    let trimmed = content.trim();
    let body = metadata_comment_regex()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    body.replace(METADATA_TAG, " ")
        .split_whitespace()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("python", Some("python"), &[])]
    #[case("python continuation fixture:db", Some("python"), &["continuation", "fixture:db"])]
    #[case("  py   notest ", Some("py"), &["notest"])]
    #[case("", None, &[])]
    fn test_default_syntax(
        #[case] info: &str,
        #[case] language: Option<&str>,
        #[case] options: &[&str],
    ) {
        let parsed = parse_fence_info(info, FenceSyntax::Default);
        assert_eq!(parsed.language.as_deref(), language);
        assert_eq!(parsed.options.tokens(), options);
    }

    #[rstest]
    #[case("{.python continuation}", &["python", "continuation"])]
    #[case("{other_option .python .other-class continuation}", &["python", "other_option", ".other-class", "continuation"])]
    #[case("python continuation", &["python", "continuation"])]
    #[case("{ .py }", &["py"])]
    fn test_superfences_syntax(#[case] info: &str, #[case] expected: &[&str]) {
        assert_eq!(parse_superfences_info(info), expected);
    }

    #[test]
    fn test_equivalent_syntaxes_give_same_options() {
        let default = parse_fence_info("python foo fixture:x", FenceSyntax::Default);
        let braces = parse_fence_info("{.python foo fixture:x}", FenceSyntax::Superfences);
        assert_eq!(default, braces);
    }

    #[test]
    fn test_option_equal_to_language_is_dropped() {
        let parsed = parse_fence_info("python python notest", FenceSyntax::Default);
        assert_eq!(parsed.options.tokens(), &["notest"]);
    }

    #[test]
    fn test_fixture_names_keep_order() {
        let options: FenceOptions = ["fixture:b", "continuation", "fixture:a", "fixture:b"]
            .into_iter()
            .collect();
        assert_eq!(options.fixture_names(), vec!["b", "a"]);
        assert!(options.is_continuation());
        assert!(!options.is_notest());
    }

    #[test]
    fn test_runner_name() {
        let none: FenceOptions = ["continuation"].into_iter().collect();
        assert_eq!(none.runner_name().unwrap(), None);

        let one: FenceOptions = ["runner:LinesAreAllFoo"].into_iter().collect();
        assert_eq!(one.runner_name().unwrap().as_deref(), Some("LinesAreAllFoo"));

        let two: FenceOptions = ["runner:a", "runner:b"].into_iter().collect();
        assert!(matches!(
            two.runner_name(),
            Err(ExtractError::MultipleRunners { runners }) if runners == vec!["a", "b"]
        ));
    }

    #[rstest]
    #[case("{/* pmd-metadata: continuation */}", true)]
    #[case("  {/*pmd-metadata: notest*/}  ", true)]
    #[case("{/* just a comment */}", false)]
    #[case("pmd-metadata: continuation", false)]
    fn test_is_metadata_comment(#[case] content: &str, #[case] expected: bool) {
        assert_eq!(is_metadata_comment(content), expected);
    }

    #[test]
    fn test_metadata_comment_options() {
        let options =
            metadata_comment_options("{/* pmd-metadata: fixture:initialize_specific fixture:another_fixture */}");
        assert_eq!(
            options.fixture_names(),
            vec!["initialize_specific", "another_fixture"]
        );

        let options = metadata_comment_options("{/*pmd-metadata:notest*/}");
        assert!(options.is_notest());
    }

    #[rstest]
    #[case("README.md", Some(DocumentFlavor::Markdown))]
    #[case("page.mdx", Some(DocumentFlavor::Mdx))]
    #[case("Component.svx", Some(DocumentFlavor::Mdx))]
    #[case("module.py", None)]
    fn test_flavor_from_path(#[case] path: &str, #[case] expected: Option<DocumentFlavor>) {
        assert_eq!(DocumentFlavor::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_fence_syntax_from_str() {
        assert_eq!("superfences".parse::<FenceSyntax>(), Ok(FenceSyntax::Superfences));
        assert!("braces".parse::<FenceSyntax>().is_err());
    }
}
