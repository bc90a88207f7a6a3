//! # Module - Documented Entity Tree
//!
//! The declaration scanner turns the token stream into a [`ModuleTree`]: an
//! arena of [`Entity`] values (the module itself, its classes and functions)
//! linked through ordered [`Member`] lists.
//!
//! Members are what a reader of the module would reach by attribute access:
//!
//! - classes and functions defined at module level
//! - methods and nested classes defined in a class body
//! - aliases: `alias = Name` in a class body or at module level, and
//!   `Owner.attr = Name` at module level
//! - members inherited from base classes declared in the same module, see
//!   [`ModuleTree::members_with_inherited`]
//!
//! Aliases only resolve against entities declared earlier in the same
//! module, so imported names never become members. Because an alias can
//! point back at its owner, the member graph may contain cycles; walkers
//! must track visited [`EntityId`]s.
//!
//! Definitions inside a function body are recorded (so indentation and
//! docstrings stay correct) but are never members of anything.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::docstring::{Docstring, StringLiteral};
use crate::lexer::{Token, TokenKind, lex};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("unterminated string literal starting on line {line}")]
    UnterminatedString { line: usize },
}

/// Stable identity of an entity within one [`ModuleTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Module,
    Class,
    Function,
}

/// A named reference from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub target: EntityId,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// Dotted path from the module, `<locals>` included for nested functions.
    pub qualname: String,
    /// 1-based line of the `def`/`class` keyword (1 for the module).
    pub line: usize,
    pub docstring: Option<Docstring>,
    pub members: Vec<Member>,
    /// Bases of a class that resolve to entities of this module.
    pub bases: Vec<EntityId>,
    /// Defined inside a function body.
    pub local: bool,
}

#[derive(Debug, Clone)]
pub struct ModuleTree {
    entities: Vec<Entity>,
}

impl ModuleTree {
    pub fn root(&self) -> EntityId {
        EntityId(0)
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Look up an entity by qualified name.
    pub fn find(&self, qualname: &str) -> Option<&Entity> {
        self.entities
            .iter()
            .skip(1)
            .find(|e| e.qualname == qualname)
    }

    /// Members of `id` followed by the members it inherits.
    ///
    /// Bases are searched depth first, left to right. An inherited member is
    /// dropped when a more derived class already has a member of that name.
    pub fn members_with_inherited(&self, id: EntityId) -> Vec<&Member> {
        let mut classes = HashSet::new();
        let mut shadowed = HashSet::new();
        let mut found = Vec::new();
        self.collect_members(id, &mut classes, &mut shadowed, &mut found);
        found
    }

    fn collect_members<'t>(
        &'t self,
        id: EntityId,
        classes: &mut HashSet<EntityId>,
        shadowed: &mut HashSet<&'t str>,
        found: &mut Vec<&'t Member>,
    ) {
        if !classes.insert(id) {
            return;
        }
        let entity = self.get(id);
        found.extend(
            entity
                .members
                .iter()
                .filter(|m| !shadowed.contains(m.name.as_str())),
        );
        shadowed.extend(entity.members.iter().map(|m| m.name.as_str()));
        for &base in &entity.bases {
            self.collect_members(base, classes, shadowed, found);
        }
    }

    fn push(&mut self, kind: EntityKind, name: &str, qualname: String, line: usize) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            kind,
            name: name.to_string(),
            qualname,
            line,
            docstring: None,
            members: Vec::new(),
            bases: Vec::new(),
            local: false,
        });
        id
    }

    fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }
}

/// Parse Python source into a [`ModuleTree`].
///
/// `module_name` becomes the name and qualname of the root entity.
pub fn parse_module(source: &str, module_name: &str) -> Result<ModuleTree, ScanError> {
    let tokens = lex(source);
    if let Some(bad) = tokens
        .iter()
        .find(|t| t.kind == TokenKind::Other && t.text.starts_with(['"', '\'']))
    {
        return Err(ScanError::UnterminatedString { line: bad.line });
    }

    let mut scanner = Scanner::new(module_name);
    for line in logical_lines(&tokens) {
        scanner.statement(&line);
    }
    Ok(scanner.tree)
}

/// One logical line: significant tokens plus the indentation of its first
/// physical line.
struct LogicalLine<'t, 'a> {
    indent: usize,
    tokens: Vec<&'t Token<'a>>,
}

fn indent_width(ws: &str) -> usize {
    ws.chars().fold(0, |col, c| match c {
        '\t' => (col / 8 + 1) * 8,
        _ => col + 1,
    })
}

/// Group tokens into logical lines, joining lines inside brackets and
/// dropping trivia. Blank and comment-only lines are not returned.
fn logical_lines<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<LogicalLine<'t, 'a>> {
    let mut lines = Vec::new();
    let mut current: Vec<&Token> = Vec::new();
    let mut indent = 0;
    let mut depth = 0usize;
    let mut at_line_start = true;

    for token in tokens {
        if at_line_start {
            indent = if token.kind == TokenKind::Whitespace {
                indent_width(token.text)
            } else {
                0
            };
            at_line_start = false;
        }
        match token.kind {
            TokenKind::Newline if depth == 0 => {
                if !current.is_empty() {
                    lines.push(LogicalLine {
                        indent,
                        tokens: std::mem::take(&mut current),
                    });
                }
                at_line_start = true;
            }
            TokenKind::Newline => {}
            _ if token.is_trivia() => {}
            TokenKind::Open => {
                depth += 1;
                current.push(token);
            }
            TokenKind::Close => {
                depth = depth.saturating_sub(1);
                current.push(token);
            }
            _ => current.push(token),
        }
    }
    if !current.is_empty() {
        lines.push(LogicalLine {
            indent,
            tokens: current,
        });
    }
    lines
}

struct Frame {
    entity: EntityId,
    /// Indentation of the header; `None` for the module.
    indent: Option<usize>,
}

struct Scanner {
    tree: ModuleTree,
    stack: Vec<Frame>,
    /// Entity whose body has not seen its first statement yet.
    pending_doc: Option<EntityId>,
    module_names: HashMap<String, EntityId>,
}

impl Scanner {
    fn new(module_name: &str) -> Self {
        let mut tree = ModuleTree {
            entities: Vec::new(),
        };
        let root = tree.push(EntityKind::Module, module_name, module_name.to_string(), 1);
        Self {
            tree,
            stack: vec![Frame {
                entity: root,
                indent: None,
            }],
            pending_doc: Some(root),
            module_names: HashMap::new(),
        }
    }

    fn statement(&mut self, line: &LogicalLine) {
        while let Some(Frame {
            indent: Some(header),
            ..
        }) = self.stack.last()
        {
            if line.indent > *header {
                break;
            }
            self.stack.pop();
        }
        let parent = self.stack.last().map_or(self.tree.root(), |f| f.entity);

        if let Some(pending) = self.pending_doc.take()
            && pending == parent
            && let Some(doc) = docstring_of(&line.tokens)
        {
            self.tree.get_mut(pending).docstring = Some(doc);
            return;
        }

        let tokens = &line.tokens;
        let header = match tokens.first().map(|t| t.kind) {
            Some(TokenKind::Async) => tokens.get(1).filter(|t| t.kind == TokenKind::Def).map(|_| 1),
            Some(TokenKind::Def | TokenKind::Class) => Some(0),
            _ => None,
        };

        match header {
            Some(at) => self.definition(line, at, parent),
            None => self.assignment(tokens, parent),
        }
    }

    fn definition(&mut self, line: &LogicalLine, at: usize, parent: EntityId) {
        let tokens = &line.tokens;
        let Some(name_token) = tokens.get(at + 1).filter(|t| t.kind == TokenKind::Ident) else {
            return;
        };
        let kind = if tokens[at].kind == TokenKind::Class {
            EntityKind::Class
        } else {
            EntityKind::Function
        };
        let name = name_token.text;

        let owner = self.tree.get(parent);
        let local = owner.local || owner.kind == EntityKind::Function;
        let qualname = match owner.kind {
            EntityKind::Module => name.to_string(),
            EntityKind::Class => format!("{}.{}", owner.qualname, name),
            EntityKind::Function => format!("{}.<locals>.{}", owner.qualname, name),
        };

        let bases = if kind == EntityKind::Class {
            self.class_bases(&tokens[at + 2..], parent)
        } else {
            Vec::new()
        };
        let id = self.tree.push(kind, name, qualname, tokens[at].line);
        let entity = self.tree.get_mut(id);
        entity.local = local;
        entity.bases = bases;
        if !local {
            self.tree.get_mut(parent).members.push(Member {
                name: name.to_string(),
                target: id,
            });
        }
        if parent == self.tree.root() {
            self.module_names.insert(name.to_string(), id);
        }

        self.stack.push(Frame {
            entity: id,
            indent: Some(line.indent),
        });

        // Everything after the header colon is an inline body.
        let mut depth = 0usize;
        let colon = tokens.iter().enumerate().skip(at + 2).find_map(|(i, t)| {
            match t.kind {
                TokenKind::Open => depth += 1,
                TokenKind::Close => depth = depth.saturating_sub(1),
                TokenKind::Colon if depth == 0 => return Some(i),
                _ => {}
            }
            None
        });
        match colon {
            Some(i) if i + 1 < tokens.len() => {
                if let Some(doc) = docstring_of(&tokens[i + 1..]) {
                    self.tree.get_mut(id).docstring = Some(doc);
                }
            }
            _ => self.pending_doc = Some(id),
        }
    }

    /// `name = Target` in a class body or at module level, and
    /// `Owner.attr = Target` at module level.
    fn assignment(&mut self, tokens: &[&Token], parent: EntityId) {
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        let owner_kind = self.tree.get(parent).kind;
        let owner_local = self.tree.get(parent).local;

        match kinds.as_slice() {
            [TokenKind::Ident, TokenKind::Eq, TokenKind::Ident]
                if owner_kind != EntityKind::Function && !owner_local =>
            {
                let name = tokens[0].text;
                let Some(target) = self.resolve(parent, tokens[2].text) else {
                    return;
                };
                self.tree.get_mut(parent).members.push(Member {
                    name: name.to_string(),
                    target,
                });
                if parent == self.tree.root() {
                    self.module_names.insert(name.to_string(), target);
                }
            }
            [
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::Ident,
            ] if parent == self.tree.root() => {
                let (Some(owner), Some(target)) = (
                    self.module_names.get(tokens[0].text).copied(),
                    self.module_names.get(tokens[4].text).copied(),
                ) else {
                    return;
                };
                self.tree.get_mut(owner).members.push(Member {
                    name: tokens[2].text.to_string(),
                    target,
                });
            }
            _ => {}
        }
    }

    /// Plain names in the argument list of a class header that resolve to
    /// entities of this module. Keyword arguments, dotted names and calls
    /// are not bases we can follow.
    fn class_bases(&self, tokens: &[&Token], scope: EntityId) -> Vec<EntityId> {
        if tokens.first().is_none_or(|t| t.text != "(") {
            return Vec::new();
        }

        let mut segments: Vec<Vec<&Token>> = vec![Vec::new()];
        let mut depth = 0usize;
        for &token in tokens {
            match token.kind {
                TokenKind::Open => {
                    depth += 1;
                    if depth == 1 {
                        continue;
                    }
                }
                TokenKind::Close => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Operator if depth == 1 && token.text.starts_with(',') => {
                    segments.push(Vec::new());
                    if token.text.len() == 1 {
                        continue;
                    }
                }
                _ => {}
            }
            if let Some(segment) = segments.last_mut() {
                segment.push(token);
            }
        }

        segments
            .iter()
            .filter_map(|segment| match segment.as_slice() {
                [name] if name.kind == TokenKind::Ident => Some(name.text),
                // Subscripted generic base: `Base[T]`
                [name, open, ..] if name.kind == TokenKind::Ident && open.text == "[" => {
                    Some(name.text)
                }
                _ => None,
            })
            .filter_map(|name| self.resolve(scope, name))
            .filter(|&id| self.tree.get(id).kind == EntityKind::Class)
            .collect()
    }

    /// Class bodies see their own members first, then module globals.
    fn resolve(&self, scope: EntityId, name: &str) -> Option<EntityId> {
        let entity = self.tree.get(scope);
        if entity.kind == EntityKind::Class
            && let Some(member) = entity.members.iter().rev().find(|m| m.name == name)
        {
            return Some(member.target);
        }
        self.module_names.get(name).copied()
    }
}

/// A statement consisting only of string literals is a docstring candidate.
/// Byte strings and f-strings never become docstrings.
fn docstring_of(tokens: &[&Token]) -> Option<Docstring> {
    let strings: Vec<&Token> = tokens
        .iter()
        .copied()
        .take_while(|t| t.is_string())
        .collect();
    let rest = &tokens[strings.len()..];
    if strings.is_empty() || !(rest.is_empty() || rest.iter().all(|t| t.kind == TokenKind::Semi)) {
        return None;
    }

    let literals: Vec<StringLiteral> = strings
        .iter()
        .map(|t| StringLiteral::from_token(t.text, t.line))
        .collect();
    if literals.iter().any(|l| l.is_bytes() || l.is_formatted()) {
        return None;
    }
    Some(Docstring::new(literals))
}
