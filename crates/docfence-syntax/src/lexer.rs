//! # Lexer - Tokenizing Python Source
//!
//! This module breaks Python source into tokens using the [Logos] lexer
//! generator. It is not a full Python tokenizer: it only distinguishes what
//! the declaration scanner needs to find `def`/`class` headers, docstrings
//! and simple alias assignments.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## The Lossless Guarantee
//!
//! Every byte of the input appears in exactly one token, so line numbers can
//! be recovered by counting newlines in the tokens seen so far:
//!
//! ```
//! use docfence_syntax::lexer::lex;
//!
//! let input = "def f():\n    \"\"\"Doc.\"\"\"\n";
//! let tokens = lex(input);
//!
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! ## Strings
//!
//! String literals are the reason this lexer exists. A `def` inside a string
//! is not a definition, and a `"""` docstring may span many lines. Triple
//! quoted strings are closed by a callback that scans the remainder, since
//! Logos regexes are always greedy.

use logos::{Lexer, Logos};

/// Token kinds produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Horizontal whitespace (spaces, tabs, form feeds)
    #[regex(r"[ \t\x0C]+")]
    Whitespace,

    /// Line ending (LF or CRLF)
    #[regex(r"\r?\n")]
    Newline,

    /// Explicit line joining with a trailing backslash
    #[regex(r"\\\r?\n")]
    LineContinuation,

    /// `# ...` up to the end of the line
    #[regex(r"#[^\r\n]*")]
    Comment,

    /// `"""..."""` or `'''...'''` with an optional prefix
    #[regex(r#"[rRuUbBfF]{0,2}""""#, |lex| close_triple(lex, "\"\"\""))]
    #[regex(r#"[rRuUbBfF]{0,2}'''"#, |lex| close_triple(lex, "'''"))]
    TripleString,

    /// `"..."` or `'...'` with an optional prefix
    #[regex(r#"[rRuUbBfF]{0,2}"([^"\\\r\n]|\\[^\r\n]|\\\r?\n)*""#)]
    #[regex(r#"[rRuUbBfF]{0,2}'([^'\\\r\n]|\\[^\r\n]|\\\r?\n)*'"#)]
    String,

    #[token("def")]
    Def,

    #[token("class")]
    Class,

    #[token("async")]
    Async,

    #[regex(r"[\p{L}_][\p{L}\p{N}_]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    /// `(`, `[` or `{`
    #[token("(")]
    #[token("[")]
    #[token("{")]
    Open,

    /// `)`, `]` or `}`
    #[token(")")]
    #[token("]")]
    #[token("}")]
    Close,

    #[token(":")]
    Colon,

    #[token("=", priority = 3)]
    Eq,

    #[token(".")]
    Dot,

    #[token("@")]
    At,

    #[token(";")]
    Semi,

    /// Any other run of operator characters (`->`, `==`, `+=`, `,` ...)
    #[regex(r"[-+*/%&|^~<>!=,]+")]
    Operator,

    /// Anything the rules above do not cover
    Other,
}

/// Advance past the closing quotes of a triple quoted string.
///
/// Backslashes always skip the next character, which is also correct for
/// raw strings: `r"""\""""` still contains an escaped quote.
fn close_triple(lex: &mut Lexer<TokenKind>, quote: &str) -> bool {
    let rest = lex.remainder();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if rest[i..].starts_with(quote) {
            lex.bump(i + quote.len());
            return true;
        }
    }
    false
}

/// A lexed token with its kind, text slice and 1-based starting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub line: usize,
}

impl Token<'_> {
    /// True for tokens that carry no syntax: whitespace, comments and
    /// explicit line joins.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::LineContinuation
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenKind::String | TokenKind::TripleString)
    }
}

/// Lex the input into a sequence of tokens.
///
/// Unrecognized input becomes [`TokenKind::Other`]; an unterminated string
/// shows up as an `Other` token starting with a quote character, which the
/// scanner reports.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);
    let mut line = 1;

    while let Some(result) = lexer.next() {
        let text = lexer.slice();
        let kind = result.unwrap_or(TokenKind::Other);
        tokens.push(Token { kind, text, line });
        line += text.matches('\n').count();
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_def_header() {
        assert_eq!(
            kinds("def f(x):"),
            vec![
                TokenKind::Def,
                TokenKind::Whitespace,
                TokenKind::Ident,
                TokenKind::Open,
                TokenKind::Ident,
                TokenKind::Close,
                TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(kinds("default"), vec![TokenKind::Ident]);
        assert_eq!(kinds("classy"), vec![TokenKind::Ident]);
    }

    #[test]
    fn test_triple_string_spans_lines() {
        let tokens = lex("x\n\"\"\"a\ndef g():\n\"\"\"\ny");
        let string = tokens
            .iter()
            .find(|t| t.kind == TokenKind::TripleString)
            .unwrap();
        assert_eq!(string.text, "\"\"\"a\ndef g():\n\"\"\"");
        assert_eq!(string.line, 2);

        let last = tokens.last().unwrap();
        assert_eq!(last.text, "y");
        assert_eq!(last.line, 5);
    }

    #[test]
    fn test_escaped_quote_inside_triple_string() {
        let tokens = lex(r#"'''it\'''s'''"#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::TripleString);
    }

    #[test]
    fn test_prefixed_strings() {
        assert_eq!(kinds(r#"r"""raw""""#), vec![TokenKind::TripleString]);
        assert_eq!(kinds(r#"b'bytes'"#), vec![TokenKind::String]);
        assert_eq!(kinds(r#"f"{x}""#), vec![TokenKind::String]);
    }

    #[test]
    fn test_unterminated_triple_string_is_other() {
        let tokens = lex("\"\"\"never closed");
        assert_eq!(tokens[0].kind, TokenKind::Other);
        assert!(tokens[0].text.starts_with('"'));
    }

    #[test]
    fn test_comment_hides_keywords() {
        assert_eq!(kinds("# def f():"), vec![TokenKind::Comment]);
    }

    #[test]
    fn test_lossless() {
        let input = "class A(B, metaclass=M):\n    x = 1  # c\n    y: int = 2\n";
        let reconstructed: String = lex(input).iter().map(|t| t.text).collect();
        assert_eq!(input, reconstructed);
    }
}
