//! Block-level token stream over a Markdown document.
//!
//! # Pulldown-cmark Event Flow
//!
//! pulldown-cmark emits nested `Start`/`End` events with byte ranges. Fence
//! extraction only cares about block structure, so events are flattened into
//! a markdown-it style token list:
//!
//! ````markdown
//! {/* pmd-metadata: continuation */}
//! ```python
//! x = 1
//! ```
//! ````
//!
//! becomes
//!
//! 1. `ParagraphOpen`
//! 2. `Inline("{/* pmd-metadata: continuation */}")`
//! 3. `ParagraphClose`
//! 4. `Fence { info: "python", content: "x = 1\n" }`
//!
//! **Key insight**: a comment placed directly above a fence is always two
//! tokens before it, which is how metadata comments are matched.
//!
//! Opening and leaf tokens carry a line map; closing tokens never do.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ParagraphOpen,
    ParagraphClose,
    HeadingOpen,
    HeadingClose,
    /// Raw inline source of a paragraph or heading
    Inline,
    /// Fenced code block
    Fence,
    /// Indented code block
    CodeBlock,
    HtmlBlock,
    Rule,
    /// Block quotes, lists, items, tables and other containers
    ContainerOpen,
    ContainerClose,
}

/// 0-based line span of a token, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMap {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockToken {
    pub kind: TokenKind,
    /// Fence info string; empty for other tokens.
    pub info: String,
    pub content: String,
    pub map: Option<LineMap>,
}

impl BlockToken {
    fn new(kind: TokenKind, map: Option<LineMap>) -> Self {
        Self {
            kind,
            info: String::new(),
            content: String::new(),
            map,
        }
    }
}

/// Byte offset to 0-based line lookup.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    fn map(&self, range: &Range<usize>) -> LineMap {
        let start = self.line_of(range.start);
        let end = self.line_of(range.end.saturating_sub(1).max(range.start)) + 1;
        LineMap { start, end }
    }
}

fn is_inline_tag(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_inline_end(end: &TagEnd) -> bool {
    matches!(
        end,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

/// Tokenize `text` into block tokens.
pub fn tokenize(text: &str, options: Options) -> Vec<BlockToken> {
    let index = LineIndex::new(text);
    let mut tokens = Vec::new();
    let mut code: Option<BlockToken> = None;
    let mut html: Option<BlockToken> = None;

    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        match event {
            Event::Start(Tag::Paragraph) => {
                tokens.push(BlockToken::new(TokenKind::ParagraphOpen, Some(index.map(&range))));
            }
            Event::End(TagEnd::Paragraph) => {
                let mut inline = BlockToken::new(TokenKind::Inline, Some(index.map(&range)));
                inline.content = text[range].trim().to_string();
                tokens.push(inline);
                tokens.push(BlockToken::new(TokenKind::ParagraphClose, None));
            }
            Event::Start(Tag::Heading { .. }) => {
                tokens.push(BlockToken::new(TokenKind::HeadingOpen, Some(index.map(&range))));
            }
            Event::End(TagEnd::Heading(_)) => {
                let mut inline = BlockToken::new(TokenKind::Inline, Some(index.map(&range)));
                inline.content = text[range]
                    .trim()
                    .trim_start_matches('#')
                    .trim()
                    .to_string();
                tokens.push(inline);
                tokens.push(BlockToken::new(TokenKind::HeadingClose, None));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                code = Some(match kind {
                    CodeBlockKind::Fenced(info) => {
                        let mut t = BlockToken::new(TokenKind::Fence, Some(index.map(&range)));
                        t.info = info.to_string();
                        t
                    }
                    CodeBlockKind::Indented => {
                        BlockToken::new(TokenKind::CodeBlock, Some(index.map(&range)))
                    }
                });
            }
            Event::End(TagEnd::CodeBlock) => {
                tokens.extend(code.take());
            }
            Event::Start(Tag::HtmlBlock) => {
                html = Some(BlockToken::new(TokenKind::HtmlBlock, Some(index.map(&range))));
            }
            Event::End(TagEnd::HtmlBlock) => {
                tokens.extend(html.take());
            }
            Event::Text(t) if code.is_some() => {
                if let Some(block) = code.as_mut() {
                    block.content.push_str(&t);
                }
            }
            Event::Html(t) if html.is_some() => {
                if let Some(block) = html.as_mut() {
                    block.content.push_str(&t);
                }
            }
            Event::Rule => {
                tokens.push(BlockToken::new(TokenKind::Rule, Some(index.map(&range))));
            }
            Event::Start(tag) if !is_inline_tag(&tag) => {
                tokens.push(BlockToken::new(TokenKind::ContainerOpen, Some(index.map(&range))));
            }
            Event::End(end) if !is_inline_end(&end) => {
                tokens.push(BlockToken::new(TokenKind::ContainerClose, None));
            }
            _ => {}
        }
    }

    tokens
}
