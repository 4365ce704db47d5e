//! Lightweight Java source scanner
//!
//! Generated and previously generated files are read back for two reasons:
//! to learn the package and primary type name of fresh output (which decides
//! where the file goes) and to split an existing entity into members so the
//! entity merge can replace generated members and keep everything else.
//! This is a structural scanner, not a Java parser: it tokenizes, balances
//! brackets and classifies class members by their shape.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

/// Source text the scanner cannot make sense of
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct SourceError {
    pub offset: usize,
    pub message: String,
}

impl SourceError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Punct(u8),
    Literal,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "transient",
    "volatile",
    "synchronized",
    "native",
    "strictfp",
    "sealed",
    "non",
    "default",
];

/// Kind of a top-level type declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

/// `package a.b.c;`
#[derive(Debug, Clone)]
pub struct PackageDecl {
    pub name: String,
    pub span: Range<usize>,
}

/// `import [static] a.b.C;`
#[derive(Debug, Clone)]
pub struct Import {
    pub name: String,
    pub is_static: bool,
    pub span: Range<usize>,
}

impl Import {
    /// Canonical statement text
    pub fn statement(&self) -> String {
        if self.is_static {
            format!("import static {};", self.name)
        } else {
            format!("import {};", self.name)
        }
    }
}

/// An annotation use; `name` is the simple name (`Table` for `@javax.persistence.Table`)
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: String,
    pub span: Range<usize>,
}

/// Identity of a member used to match members across two versions of a file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKey {
    Field(String),
    Method(String, Vec<String>),
    Type(String),
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Field(name) | MemberKey::Type(name) => f.write_str(name),
            MemberKey::Method(name, params) => write!(f, "{}({})", name, params.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Field { name: String },
    Method { name: String, params: Vec<String> },
    Type { name: String },
    Initializer,
    EnumConstants,
}

/// One member of a type body, with any comments directly in front of it
#[derive(Debug, Clone)]
pub struct Member {
    pub kind: MemberKind,
    /// Simple names of the member's annotations
    pub annotations: Vec<String>,
    pub span: Range<usize>,
}

impl Member {
    pub fn key(&self) -> Option<MemberKey> {
        match &self.kind {
            MemberKind::Field { name } => Some(MemberKey::Field(name.clone())),
            MemberKind::Method { name, params } => {
                Some(MemberKey::Method(name.clone(), params.clone()))
            }
            MemberKind::Type { name } => Some(MemberKey::Type(name.clone())),
            MemberKind::Initializer | MemberKind::EnumConstants => None,
        }
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a == name)
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, MemberKind::Field { .. })
    }
}

/// The first type declared in a file
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub annotations: Vec<Annotation>,
    /// Byte offset of the declaration's first token (annotation or modifier)
    pub start: usize,
    /// From the first modifier or keyword up to, not including, the `{`
    pub header: Range<usize>,
    pub members: Vec<Member>,
    /// Comments after the last member, before the closing `}`
    pub trailing: Range<usize>,
    /// Byte offset just past the closing `}`
    pub end: usize,
}

/// Scanned structure of one Java compilation unit
#[derive(Debug, Clone)]
pub struct JavaSource<'a> {
    src: &'a str,
    pub package: Option<PackageDecl>,
    pub imports: Vec<Import>,
    pub primary: Option<TypeDecl>,
}

impl<'a> JavaSource<'a> {
    pub fn parse(src: &'a str) -> Result<Self, SourceError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser {
            src,
            tokens: &tokens,
            pos: 0,
        };
        parser.compilation_unit()
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn text(&self, span: &Range<usize>) -> &'a str {
        &self.src[span.clone()]
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|p| p.name.as_str())
    }

    pub fn primary_type_name(&self) -> Option<&str> {
        self.primary.as_ref().map(|t| t.name.as_str())
    }

    /// Member text with leading whitespace removed; comments in front stay
    pub fn member_text(&self, member: &Member) -> &'a str {
        self.src[member.span.clone()].trim()
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_part(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

const TEXT_BLOCK: &[u8] = b"\"\"\"";

fn tokenize(src: &str) -> Result<Vec<Token>, SourceError> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let close = src[i + 2..]
                .find("*/")
                .ok_or_else(|| SourceError::new(i, "unterminated comment"))?;
            i = i + 2 + close + 2;
            continue;
        }

        // Delimiters are ASCII, so the block is scanned bytewise; `j` may
        // rest inside a multibyte character but is never used to slice
        if bytes[i..].starts_with(TEXT_BLOCK) {
            let mut j = i + 3;
            loop {
                if j + 3 > len {
                    return Err(SourceError::new(i, "unterminated text block"));
                }
                if bytes[j] == b'\\' {
                    j += 2;
                    continue;
                }
                if bytes[j..].starts_with(TEXT_BLOCK) {
                    break;
                }
                j += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Literal,
                start: i,
                end: j + 3,
            });
            i = j + 3;
            continue;
        }

        if b == b'"' || b == b'\'' {
            let mut j = i + 1;
            loop {
                match bytes.get(j) {
                    None | Some(b'\n') => {
                        return Err(SourceError::new(i, "unterminated literal"));
                    }
                    Some(b'\\') => j += 2,
                    Some(&c) if c == b => break,
                    Some(_) => j += 1,
                }
            }
            tokens.push(Token {
                kind: TokenKind::Literal,
                start: i,
                end: j + 1,
            });
            i = j + 1;
            continue;
        }

        if is_ident_start(b) {
            let mut j = i + 1;
            while j < len && is_ident_part(bytes[j]) {
                j += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                start: i,
                end: j,
            });
            i = j;
            continue;
        }

        if b.is_ascii_digit() {
            let mut j = i + 1;
            while j < len && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'.')
            {
                j += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Literal,
                start: i,
                end: j,
            });
            i = j;
            continue;
        }

        tokens.push(Token {
            kind: TokenKind::Punct(b),
            start: i,
            end: i + 1,
        });
        i += 1;
    }

    Ok(tokens)
}

struct Parser<'s, 't> {
    src: &'s str,
    tokens: &'t [Token],
    pos: usize,
}

impl<'s, 't> Parser<'s, 't> {
    fn text(&self, index: usize) -> &'s str {
        let t = self.tokens[index];
        &self.src[t.start..t.end]
    }

    fn is_punct(&self, index: usize, c: u8) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.kind == TokenKind::Punct(c))
    }

    fn is_ident(&self, index: usize, word: &str) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.kind == TokenKind::Ident && self.text(index) == word)
    }

    fn is_any_ident(&self, index: usize) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn offset(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map(|t| t.start)
            .unwrap_or(self.src.len())
    }

    fn compilation_unit(&mut self) -> Result<JavaSource<'s>, SourceError> {
        // Package annotations live in package-info.java; skip them if present
        let save = self.pos;
        self.annotations(self.tokens.len())?;
        let package = if self.is_ident(self.pos, "package") {
            let start = self.offset(self.pos);
            self.pos += 1;
            let (name, end) = self.qualified_name_until_semicolon()?;
            Some(PackageDecl {
                name,
                span: start..end,
            })
        } else {
            self.pos = save;
            None
        };

        let mut imports = Vec::new();
        loop {
            if self.is_punct(self.pos, b';') {
                self.pos += 1;
                continue;
            }
            if !self.is_ident(self.pos, "import") {
                break;
            }
            let start = self.offset(self.pos);
            self.pos += 1;
            let is_static = self.is_ident(self.pos, "static");
            if is_static {
                self.pos += 1;
            }
            let (name, end) = self.qualified_name_until_semicolon()?;
            imports.push(Import {
                name,
                is_static,
                span: start..end,
            });
        }

        let primary = if self.pos < self.tokens.len() {
            self.type_decl()?
        } else {
            None
        };

        Ok(JavaSource {
            src: self.src,
            package,
            imports,
            primary,
        })
    }

    /// Joins tokens up to `;` without whitespace, returns the name and the
    /// byte offset just past the `;`
    fn qualified_name_until_semicolon(&mut self) -> Result<(String, usize), SourceError> {
        let mut name = String::new();
        while self.pos < self.tokens.len() {
            if self.is_punct(self.pos, b';') {
                let end = self.tokens[self.pos].end;
                self.pos += 1;
                if name.is_empty() {
                    return Err(SourceError::new(end, "empty name"));
                }
                return Ok((name, end));
            }
            match self.tokens[self.pos].kind {
                TokenKind::Ident | TokenKind::Punct(b'.') | TokenKind::Punct(b'*') => {
                    name.push_str(self.text(self.pos));
                }
                _ => {
                    return Err(SourceError::new(
                        self.offset(self.pos),
                        "unexpected token in qualified name",
                    ))
                }
            }
            self.pos += 1;
        }
        Err(SourceError::new(self.src.len(), "missing ';'"))
    }

    /// Consume annotations starting at `self.pos`, stopping before `limit`
    fn annotations(&mut self, limit: usize) -> Result<Vec<Annotation>, SourceError> {
        let mut found = Vec::new();
        while self.pos < limit
            && self.is_punct(self.pos, b'@')
            && self.is_any_ident(self.pos + 1)
            && !self.is_ident(self.pos + 1, "interface")
        {
            let start = self.offset(self.pos);
            let mut name_idx = self.pos + 1;
            self.pos += 2;
            while self.is_punct(self.pos, b'.') && self.is_any_ident(self.pos + 1) {
                name_idx = self.pos + 1;
                self.pos += 2;
            }
            let mut end = self.tokens[self.pos - 1].end;
            if self.is_punct(self.pos, b'(') {
                let close = self.matching(self.pos, b'(', b')')?;
                end = self.tokens[close].end;
                self.pos = close + 1;
            }
            found.push(Annotation {
                name: self.text(name_idx).to_string(),
                span: start..end,
            });
        }
        Ok(found)
    }

    /// Index of the token closing the bracket opened at `open`
    fn matching(&self, open: usize, left: u8, right: u8) -> Result<usize, SourceError> {
        let mut depth = 0usize;
        for i in open..self.tokens.len() {
            if self.is_punct(i, left) {
                depth += 1;
            } else if self.is_punct(i, right) {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
        }
        Err(SourceError::new(
            self.offset(open),
            format!("unbalanced '{}'", left as char),
        ))
    }

    fn skip_modifiers(&mut self, limit: usize) {
        while self.pos < limit {
            if self.tokens[self.pos].kind == TokenKind::Ident
                && MODIFIERS.contains(&self.text(self.pos))
            {
                self.pos += 1;
            } else if self.is_punct(self.pos, b'-') && self.is_ident(self.pos + 1, "sealed") {
                // non-sealed
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn type_keyword(&self, index: usize) -> Option<(TypeKind, usize)> {
        if self.is_punct(index, b'@') && self.is_ident(index + 1, "interface") {
            return Some((TypeKind::Annotation, index + 2));
        }
        let kind = match self.tokens.get(index)?.kind {
            TokenKind::Ident => match self.text(index) {
                "class" => TypeKind::Class,
                "interface" => TypeKind::Interface,
                "enum" => TypeKind::Enum,
                "record" => TypeKind::Record,
                _ => return None,
            },
            _ => return None,
        };
        Some((kind, index + 1))
    }

    fn type_decl(&mut self) -> Result<Option<TypeDecl>, SourceError> {
        let start = self.offset(self.pos);
        let annotations = self.annotations(self.tokens.len())?;
        let header_start = self.offset(self.pos);
        self.skip_modifiers(self.tokens.len());

        let Some((kind, name_idx)) = self.type_keyword(self.pos) else {
            return Ok(None);
        };
        if !self.is_any_ident(name_idx) {
            return Err(SourceError::new(self.offset(name_idx), "missing type name"));
        }
        let name = self.text(name_idx).to_string();

        let mut open = name_idx + 1;
        let mut parens = 0i32;
        loop {
            match self.tokens.get(open).map(|t| t.kind) {
                None => {
                    return Err(SourceError::new(self.src.len(), "missing type body"));
                }
                Some(TokenKind::Punct(b'(')) => parens += 1,
                Some(TokenKind::Punct(b')')) => parens -= 1,
                Some(TokenKind::Punct(b'{')) if parens == 0 => break,
                _ => {}
            }
            open += 1;
        }
        let close = self.matching(open, b'{', b'}')?;
        let header = header_start..self.tokens[open].start;

        let (members, trailing_start) = self.members(open, close, kind)?;
        self.pos = close + 1;

        Ok(Some(TypeDecl {
            kind,
            name,
            annotations,
            start,
            header,
            members,
            trailing: trailing_start..self.tokens[close].start,
            end: self.tokens[close].end,
        }))
    }

    /// Split the body between tokens `open` and `close` into members
    fn members(
        &mut self,
        open: usize,
        close: usize,
        kind: TypeKind,
    ) -> Result<(Vec<Member>, usize), SourceError> {
        let mut members = Vec::new();
        let mut prev_end = self.tokens[open].end;
        let mut i = open + 1;

        if kind == TypeKind::Enum && i < close {
            let mut depth = 0i32;
            let mut j = i;
            while j < close {
                match self.tokens[j].kind {
                    TokenKind::Punct(b'(') | TokenKind::Punct(b'{') => depth += 1,
                    TokenKind::Punct(b')') | TokenKind::Punct(b'}') => depth -= 1,
                    TokenKind::Punct(b';') if depth == 0 => break,
                    _ => {}
                }
                j += 1;
            }
            let last = if j < close { j } else { close - 1 };
            let span = self.member_span(prev_end, i, last);
            prev_end = span.end;
            members.push(Member {
                kind: MemberKind::EnumConstants,
                annotations: Vec::new(),
                span,
            });
            i = last + 1;
        }

        while i < close {
            if self.is_punct(i, b';') {
                i += 1;
                continue;
            }
            let last = self.member_end(i, close)?;
            let span = self.member_span(prev_end, i, last);
            let (member_kind, annotations) = self.classify(i, last)?;
            prev_end = span.end;
            members.push(Member {
                kind: member_kind,
                annotations,
                span,
            });
            i = last + 1;
        }

        Ok((members, prev_end))
    }

    fn member_span(&self, prev_end: usize, first: usize, last: usize) -> Range<usize> {
        let gap = &self.src[prev_end..self.tokens[first].start];
        let start = prev_end + (gap.len() - gap.trim_start().len());
        start..self.tokens[last].end
    }

    /// Index of the last token of the member starting at `first`
    fn member_end(&self, first: usize, close: usize) -> Result<usize, SourceError> {
        let mut parens = 0i32;
        let mut seen_params = false;
        let mut in_expression = false;
        let mut j = first;
        while j < close {
            match self.tokens[j].kind {
                TokenKind::Punct(b'(') | TokenKind::Punct(b'[') => parens += 1,
                TokenKind::Punct(b')') | TokenKind::Punct(b']') => {
                    parens -= 1;
                    if parens == 0 {
                        seen_params = true;
                    }
                }
                TokenKind::Punct(b'=') if parens == 0 => in_expression = true,
                TokenKind::Ident if parens == 0 && seen_params && self.text(j) == "default" => {
                    in_expression = true;
                }
                TokenKind::Punct(b'{') if parens == 0 => {
                    let end = self.matching(j, b'{', b'}')?;
                    if !in_expression {
                        return Ok(end);
                    }
                    j = end;
                }
                TokenKind::Punct(b';') if parens == 0 => return Ok(j),
                _ => {}
            }
            j += 1;
        }
        Err(SourceError::new(self.offset(first), "unterminated member"))
    }

    fn classify(
        &mut self,
        first: usize,
        last: usize,
    ) -> Result<(MemberKind, Vec<String>), SourceError> {
        self.pos = first;
        let annotations = self
            .annotations(last + 1)?
            .into_iter()
            .map(|a| a.name)
            .collect();
        self.skip_modifiers(last + 1);

        if self.is_punct(self.pos, b'<') {
            self.pos = self.matching(self.pos, b'<', b'>')? + 1;
        }
        if self.is_punct(self.pos, b'{') {
            return Ok((MemberKind::Initializer, annotations));
        }
        if let Some((_, name_idx)) = self.type_keyword(self.pos) {
            if self.is_any_ident(name_idx) {
                let name = self.text(name_idx).to_string();
                return Ok((MemberKind::Type { name }, annotations));
            }
        }

        let mut angles = 0i32;
        let mut j = self.pos;
        while j <= last {
            match self.tokens[j].kind {
                TokenKind::Punct(b'<') => angles += 1,
                TokenKind::Punct(b'>') => angles -= 1,
                TokenKind::Punct(b'(') if angles == 0 => {
                    if j == 0 || !self.is_any_ident(j - 1) {
                        return Err(SourceError::new(self.offset(j), "missing method name"));
                    }
                    let name = self.text(j - 1).to_string();
                    let params = self.param_types(j)?;
                    return Ok((MemberKind::Method { name, params }, annotations));
                }
                TokenKind::Punct(b'=') | TokenKind::Punct(b';') | TokenKind::Punct(b',')
                    if angles == 0 =>
                {
                    let name = self.field_name_before(j)?;
                    return Ok((MemberKind::Field { name }, annotations));
                }
                TokenKind::Punct(b'{') => break,
                _ => {}
            }
            j += 1;
        }
        Ok((MemberKind::Initializer, annotations))
    }

    fn field_name_before(&self, end: usize) -> Result<String, SourceError> {
        let mut k = end;
        while k > 0 {
            k -= 1;
            match self.tokens[k].kind {
                TokenKind::Punct(b'[') | TokenKind::Punct(b']') => continue,
                TokenKind::Ident => return Ok(self.text(k).to_string()),
                _ => break,
            }
        }
        Err(SourceError::new(self.offset(end), "missing field name"))
    }

    /// Parameter types of the list opened at `open`, names and annotations dropped
    fn param_types(&mut self, open: usize) -> Result<Vec<String>, SourceError> {
        let close = self.matching(open, b'(', b')')?;
        let mut params = Vec::new();
        let mut start = open + 1;
        let mut depth = 0i32;
        for k in open + 1..=close {
            let at_end = k == close;
            match self.tokens[k].kind {
                TokenKind::Punct(b'<') | TokenKind::Punct(b'(') if !at_end => depth += 1,
                TokenKind::Punct(b'>') | TokenKind::Punct(b')') if !at_end => depth -= 1,
                _ => {}
            }
            let split = at_end || (depth == 0 && self.is_punct(k, b','));
            if split {
                if k > start {
                    params.push(self.param_type(start, k)?);
                }
                start = k + 1;
            }
        }
        Ok(params)
    }

    fn param_type(&mut self, start: usize, end: usize) -> Result<String, SourceError> {
        self.pos = start;
        self.annotations(end)?;
        while self.pos < end && self.is_ident(self.pos, "final") {
            self.pos += 1;
        }
        // Drop the parameter name and any `[]` written after it
        let mut stop = end;
        while stop > self.pos && (self.is_punct(stop - 1, b'[') || self.is_punct(stop - 1, b']')) {
            stop -= 1;
        }
        if stop > self.pos && self.is_any_ident(stop - 1) {
            stop -= 1;
        }
        let mut ty = String::new();
        for k in self.pos..stop {
            ty.push_str(self.text(k));
        }
        let trailing: String = (stop + 1..end).map(|k| self.text(k)).collect();
        ty.push_str(&trailing);
        Ok(ty)
    }
}
