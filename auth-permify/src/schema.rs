//! Authorization model text and its parsed form.
//!
//! The text format is the one Permify accepts:
//!
//! ```text
//! entity domain {
//!     relation member @user
//!     relation admin @user
//!
//!     action view = member or admin
//!     action edit = admin
//! }
//! ```
//!
//! Expressions combine relations and permissions of the same entity with
//! `or`, `and`, `not` (exclusion) and parentheses, and can follow a relation
//! to another entity with `relation.permission`.

use crate::models::RelationTuple;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Model published at startup unless configuration points elsewhere.
pub const DEFAULT_SCHEMA: &str = r#"
entity user {}

entity domain {
    relation member @user
    relation admin @user

    action view = member or admin
    action edit = admin
}

entity post {
    relation parent @domain
    relation member @user
    relation admin @user

    action view = member or admin or parent.view
    action edit = admin or parent.edit
}
"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("schema error at line {line}: {message}")]
pub struct SchemaError {
    pub line: usize,
    pub message: String,
}

impl SchemaError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Boolean combination of relations evaluated for a permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionExpr {
    /// A relation or permission on the same entity
    Ref(String),
    /// `relation.target`: follow `relation` and evaluate `target` there
    Traverse { relation: String, target: String },
    Or(Box<PermissionExpr>, Box<PermissionExpr>),
    And(Box<PermissionExpr>, Box<PermissionExpr>),
    /// `base not excluded`
    Exclude(Box<PermissionExpr>, Box<PermissionExpr>),
}

impl fmt::Display for PermissionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionExpr::Ref(name) => write!(f, "{}", name),
            PermissionExpr::Traverse { relation, target } => write!(f, "{}.{}", relation, target),
            PermissionExpr::Or(l, r) => write!(f, "({} or {})", l, r),
            PermissionExpr::And(l, r) => write!(f, "({} and {})", l, r),
            PermissionExpr::Exclude(l, r) => write!(f, "({} not {})", l, r),
        }
    }
}

/// `@type` or `@type#relation` on a relation declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTypeRef {
    pub entity_type: String,
    pub relation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    pub name: String,
    pub subject_types: Vec<SubjectTypeRef>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDefinition {
    pub name: String,
    pub expr: PermissionExpr,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDefinition {
    pub name: String,
    pub relations: BTreeMap<String, RelationDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
    pub line: usize,
}

impl EntityDefinition {
    fn declares(&self, name: &str) -> bool {
        self.relations.contains_key(name) || self.permissions.contains_key(name)
    }
}

/// Parsed, validated authorization model
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaDefinition {
    pub entities: BTreeMap<String, EntityDefinition>,
}

impl SchemaDefinition {
    /// Parse and validate schema text.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let tokens = tokenize(text)?;
        let schema = Parser { tokens, pos: 0 }.parse_schema()?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.get(name)
    }

    /// Check a tuple names a declared entity, a declared relation (not a
    /// permission) and a subject type that relation accepts.
    pub fn validate_tuple(&self, tuple: &RelationTuple) -> Result<(), String> {
        let entity = self
            .entities
            .get(&tuple.entity.entity_type)
            .ok_or_else(|| format!("entity type '{}' is not declared", tuple.entity.entity_type))?;

        let relation = entity.relations.get(&tuple.relation).ok_or_else(|| {
            format!(
                "relation '{}' is not declared on entity '{}'",
                tuple.relation, tuple.entity.entity_type
            )
        })?;

        let accepted = relation.subject_types.iter().any(|st| {
            st.entity_type == tuple.subject.subject_type && st.relation == tuple.subject.relation
        });
        if !accepted {
            return Err(format!(
                "relation '{}#{}' does not accept subject '{}'",
                tuple.entity.entity_type, tuple.relation, tuple.subject
            ));
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for entity in self.entities.values() {
            for relation in entity.relations.values() {
                if relation.subject_types.is_empty() {
                    return Err(SchemaError::new(
                        relation.line,
                        format!("relation '{}' has no subject types", relation.name),
                    ));
                }
                for st in &relation.subject_types {
                    let target = self.entities.get(&st.entity_type).ok_or_else(|| {
                        SchemaError::new(
                            relation.line,
                            format!("relation '{}' references unknown entity '{}'", relation.name, st.entity_type),
                        )
                    })?;
                    if let Some(ref rel) = st.relation {
                        if !target.declares(rel) {
                            return Err(SchemaError::new(
                                relation.line,
                                format!("'{}#{}' is not declared", st.entity_type, rel),
                            ));
                        }
                    }
                }
            }

            for permission in entity.permissions.values() {
                self.validate_expr(entity, &permission.expr, permission.line)?;
            }
        }
        Ok(())
    }

    fn validate_expr(&self, entity: &EntityDefinition, expr: &PermissionExpr, line: usize) -> Result<(), SchemaError> {
        match expr {
            PermissionExpr::Ref(name) => {
                if !entity.declares(name) {
                    return Err(SchemaError::new(
                        line,
                        format!("'{}' is not declared on entity '{}'", name, entity.name),
                    ));
                }
                Ok(())
            }
            PermissionExpr::Traverse { relation, target } => {
                let rel = entity.relations.get(relation).ok_or_else(|| {
                    SchemaError::new(
                        line,
                        format!("'{}' is not a relation on entity '{}'", relation, entity.name),
                    )
                })?;
                for st in &rel.subject_types {
                    let declared = self
                        .entities
                        .get(&st.entity_type)
                        .map(|e| e.declares(target))
                        .unwrap_or(false);
                    if !declared {
                        return Err(SchemaError::new(
                            line,
                            format!("'{}' is not declared on entity '{}'", target, st.entity_type),
                        ));
                    }
                }
                Ok(())
            }
            PermissionExpr::Or(l, r) | PermissionExpr::And(l, r) | PermissionExpr::Exclude(l, r) => {
                self.validate_expr(entity, l, line)?;
                self.validate_expr(entity, r, line)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Eq,
    At,
    Hash,
    Dot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Eq => f.write_str("'='"),
            Token::At => f.write_str("'@'"),
            Token::Hash => f.write_str("'#'"),
            Token::Dot => f.write_str("'.'"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, SchemaError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            }
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '=' => Token::Eq,
            '@' => Token::At,
            '#' => Token::Hash,
            '.' => Token::Dot,
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            other => return Err(SchemaError::new(line, format!("unexpected character '{}'", other))),
        };
        tokens.push((token, line));
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), SchemaError> {
        let line = self.line();
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(SchemaError::new(line, format!("expected {}, found {}", expected, t))),
            None => Err(SchemaError::new(line, format!("expected {}, found end of input", expected))),
        }
    }

    fn ident(&mut self) -> Result<String, SchemaError> {
        let line = self.line();
        match self.next() {
            Some(Token::Ident(name)) if !is_keyword(&name) => Ok(name),
            Some(t) => Err(SchemaError::new(line, format!("expected identifier, found {}", t))),
            None => Err(SchemaError::new(line, "expected identifier, found end of input")),
        }
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn parse_schema(mut self) -> Result<SchemaDefinition, SchemaError> {
        let mut schema = SchemaDefinition::default();
        while self.peek().is_some() {
            let line = self.line();
            if !self.keyword("entity") {
                let found = self.next().map(|t| t.to_string()).unwrap_or_default();
                return Err(SchemaError::new(line, format!("expected 'entity', found {}", found)));
            }
            self.next();
            let entity = self.parse_entity(line)?;
            if schema.entities.contains_key(&entity.name) {
                return Err(SchemaError::new(line, format!("entity '{}' declared twice", entity.name)));
            }
            schema.entities.insert(entity.name.clone(), entity);
        }
        Ok(schema)
    }

    fn parse_entity(&mut self, line: usize) -> Result<EntityDefinition, SchemaError> {
        let name = self.ident()?;
        self.expect(Token::LBrace)?;

        let mut entity = EntityDefinition {
            name,
            relations: BTreeMap::new(),
            permissions: BTreeMap::new(),
            line,
        };

        loop {
            let member_line = self.line();
            match self.next() {
                Some(Token::RBrace) => break,
                Some(Token::Ident(ref kw)) if kw == "relation" => {
                    let relation = self.parse_relation(member_line)?;
                    if entity.declares(&relation.name) {
                        return Err(SchemaError::new(
                            member_line,
                            format!("'{}' declared twice on entity '{}'", relation.name, entity.name),
                        ));
                    }
                    entity.relations.insert(relation.name.clone(), relation);
                }
                Some(Token::Ident(ref kw)) if kw == "action" || kw == "permission" => {
                    let name = self.ident()?;
                    self.expect(Token::Eq)?;
                    let expr = self.parse_or()?;
                    if entity.declares(&name) {
                        return Err(SchemaError::new(
                            member_line,
                            format!("'{}' declared twice on entity '{}'", name, entity.name),
                        ));
                    }
                    entity.permissions.insert(
                        name.clone(),
                        PermissionDefinition {
                            name,
                            expr,
                            line: member_line,
                        },
                    );
                }
                Some(t) => {
                    return Err(SchemaError::new(
                        member_line,
                        format!("expected 'relation', 'action' or '}}', found {}", t),
                    ))
                }
                None => return Err(SchemaError::new(member_line, "unterminated entity block")),
            }
        }

        Ok(entity)
    }

    fn parse_relation(&mut self, line: usize) -> Result<RelationDefinition, SchemaError> {
        let name = self.ident()?;
        let mut subject_types = Vec::new();
        while self.peek() == Some(&Token::At) {
            self.next();
            let entity_type = self.ident()?;
            let relation = if self.peek() == Some(&Token::Hash) {
                self.next();
                Some(self.ident()?)
            } else {
                None
            };
            subject_types.push(SubjectTypeRef { entity_type, relation });
        }
        Ok(RelationDefinition {
            name,
            subject_types,
            line,
        })
    }

    fn parse_or(&mut self) -> Result<PermissionExpr, SchemaError> {
        let mut expr = self.parse_and()?;
        while self.keyword("or") {
            self.next();
            let rhs = self.parse_and()?;
            expr = PermissionExpr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<PermissionExpr, SchemaError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.keyword("and") {
                self.next();
                let rhs = self.parse_primary()?;
                expr = PermissionExpr::And(Box::new(expr), Box::new(rhs));
            } else if self.keyword("not") {
                self.next();
                let rhs = self.parse_primary()?;
                expr = PermissionExpr::Exclude(Box::new(expr), Box::new(rhs));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<PermissionExpr, SchemaError> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let expr = self.parse_or()?;
            self.expect(Token::RParen)?;
            return Ok(expr);
        }

        let name = self.ident()?;
        if self.peek() == Some(&Token::Dot) {
            self.next();
            let target = self.ident()?;
            return Ok(PermissionExpr::Traverse { relation: name, target });
        }
        Ok(PermissionExpr::Ref(name))
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "entity" | "relation" | "action" | "permission" | "or" | "and" | "not")
}
