//! Docstring literals and their mapping back to source lines.
//!
//! A docstring is only useful for fence extraction if every line of its
//! value still corresponds to a line of the file. [`Docstring::resolve`]
//! checks that and produces the cleaned text together with the line the
//! literal starts on.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocstringError {
    #[error("docstring on line {line} is built from {count} concatenated literals")]
    Concatenated { line: usize, count: usize },

    #[error("escape sequences in the docstring on line {line} change its line count")]
    LinesShifted { line: usize },
}

/// One string literal token, split into prefix, quotes and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    prefix: String,
    triple: bool,
    body: String,
    line: usize,
}

impl StringLiteral {
    /// Build from the full token text, e.g. `r"""body"""`.
    pub fn from_token(text: &str, line: usize) -> Self {
        let prefix_len = text
            .find(|c: char| c == '"' || c == '\'')
            .unwrap_or(text.len());
        let (prefix, quoted) = text.split_at(prefix_len);
        let triple = quoted.starts_with("\"\"\"") || quoted.starts_with("'''");
        let q = if triple { 3 } else { 1 };
        let body = if quoted.len() >= 2 * q {
            &quoted[q..quoted.len() - q]
        } else {
            ""
        };
        Self {
            prefix: prefix.to_string(),
            triple,
            body: body.to_string(),
            line,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is_triple(&self) -> bool {
        self.triple
    }

    pub fn is_raw(&self) -> bool {
        self.prefix.contains(['r', 'R'])
    }

    pub fn is_bytes(&self) -> bool {
        self.prefix.contains(['b', 'B'])
    }

    pub fn is_formatted(&self) -> bool {
        self.prefix.contains(['f', 'F'])
    }

    /// The runtime value of the literal.
    pub fn value(&self) -> String {
        if self.is_raw() {
            self.body.clone()
        } else {
            unescape(&self.body)
        }
    }
}

/// The docstring of an entity as it appears in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Docstring {
    literals: Vec<StringLiteral>,
}

/// A docstring whose lines map one-to-one onto file lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocstring {
    /// Cleaned text; line `i` of it is file line `line + i`.
    pub text: String,
    /// 1-based line of the opening quotes.
    pub line: usize,
}

impl Docstring {
    pub fn new(literals: Vec<StringLiteral>) -> Self {
        Self { literals }
    }

    pub fn literals(&self) -> &[StringLiteral] {
        &self.literals
    }

    pub fn line(&self) -> usize {
        self.literals.first().map_or(0, |l| l.line)
    }

    /// The docstring value as Python would see it, before cleaning.
    pub fn value(&self) -> String {
        self.literals.iter().map(StringLiteral::value).collect()
    }

    pub fn resolve(&self) -> Result<ResolvedDocstring, DocstringError> {
        let line = self.line();
        let [literal] = self.literals.as_slice() else {
            return Err(DocstringError::Concatenated {
                line,
                count: self.literals.len(),
            });
        };

        let value = literal.value();
        if value.matches('\n').count() != literal.body.matches('\n').count() {
            return Err(DocstringError::LinesShifted { line });
        }

        Ok(ResolvedDocstring {
            text: clean(&value),
            line,
        })
    }
}

/// Python's `str.expandtabs()` with the default tab size.
fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0;
    for c in line.chars() {
        match c {
            '\t' => {
                let pad = 8 - col % 8;
                out.extend(std::iter::repeat_n(' ', pad));
                col += pad;
            }
            _ => {
                out.push(c);
                col += 1;
            }
        }
    }
    out
}

/// Dedent a docstring the way `inspect.cleandoc` does, but without dropping
/// leading or trailing blank lines so the line count is preserved.
pub fn clean(value: &str) -> String {
    let lines: Vec<String> = value.split('\n').map(expand_tabs).collect();

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ').count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i == 0 {
                l.trim_start().to_string()
            } else {
                l.chars().skip(margin).collect()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Process backslash escapes of a non-raw string literal body.
///
/// Named escapes (`\N{...}`) are kept verbatim; they never span lines.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0C'),
            'v' => out.push('\x0B'),
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next_if(char::is_ascii_hexdigit)).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(ch) if digits.len() == width => out.push(ch),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}
