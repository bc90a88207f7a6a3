//! # docfence-syntax
//!
//! A small Python declaration scanner built on [Logos]. It reads a Python
//! source file without importing or executing it and produces an explicit
//! tree of documented entities: the module, its classes, functions and
//! methods, each with its docstring and source line.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Architecture Overview
//!
//! ```text
//! Source Text → Lexer → Tokens → Scanner → ModuleTree
//!               (Logos)          (logical lines + indentation stack)
//! ```
//!
//! ### 1. Lexer ([`lexer`] module)
//!
//! Tokenizes the input losslessly. String literals (including multi-line
//! triple quoted ones) are single tokens, so keywords inside strings and
//! comments are never mistaken for definitions.
//!
//! ### 2. Scanner ([`module`] module)
//!
//! Joins tokens into logical lines (bracketed continuations are folded in,
//! trivia is dropped), then tracks indentation with a stack of open
//! definitions. A `def` or `class` header opens a frame; the first statement
//! of its body becomes the docstring when it is a plain string literal.
//!
//! ### 3. Docstrings ([`docstring`] module)
//!
//! Maps a docstring back onto file lines. Resolution fails when the value
//! cannot be aligned line-for-line with the source, for example when several
//! literals are concatenated.
//!
//! ## Quick Start
//!
//! ```
//! use docfence_syntax::parse_module;
//!
//! let source = "class Greeter:\n    def hello(self):\n        \"\"\"Say hi.\"\"\"\n";
//! let tree = parse_module(source, "greet").unwrap();
//!
//! let hello = tree.find("Greeter.hello").unwrap();
//! let doc = hello.docstring.as_ref().unwrap().resolve().unwrap();
//! assert_eq!(doc.text, "Say hi.");
//! assert_eq!(doc.line, 3);
//! ```

pub mod docstring;
pub mod lexer;
pub mod module;

pub use docstring::{Docstring, DocstringError, ResolvedDocstring, StringLiteral};
pub use module::{Entity, EntityId, EntityKind, Member, ModuleTree, ScanError, parse_module};
