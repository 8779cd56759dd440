//! Recursive-descent reader for the classic text encoding.
//!
//! Supported: node bodies `Type { field value ... }`, `DEF` / `USE`, `NULL`, `ROUTE a.f TO
//! b.g` at any nesting level, and values for every [`FieldType`]. Prototype declarations are
//! rejected.
//!
//! A load either completes or leaves the scene as it found it: on a syntax or field error every
//! node created so far is removed again and the error is reported as fatal. Routes are resolved
//! after the whole text was read, so they may name nodes defined further down; a route that
//! cannot be resolved is reported as a warning and skipped.
use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::field::{ArrayValue, FieldKind, FieldType, FieldValue};
use crate::loader::lexer::{tokenize, Spanned, Token};
use crate::node::NodeId;
use crate::route::RouteSpec;
use crate::scene::Scene;
use crate::space::SpaceId;

/// Parses `text` into `space`, returning its root nodes in file order.
pub fn load_str(scene: &mut Scene, space: SpaceId, text: &str) -> Result<Vec<NodeId>> {
    if scene.space(space).is_none() {
        return Err(Error::UnknownSpace);
    }
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(offset) => {
            let e = parse_error(text, offset, "unexpected character");
            scene
                .reporter_mut()
                .fatal_error_report("Scene content could not be read.", Some(&e));
            return Err(e);
        }
    };

    let mut parser = Parser {
        scene,
        space,
        text,
        tokens,
        pos: 0,
        created: Vec::new(),
        routes: Vec::new(),
    };
    match parser.document() {
        Ok(roots) => parser.commit(roots),
        Err(e) => {
            parser.rollback();
            parser
                .scene
                .reporter_mut()
                .fatal_error_report("Scene content could not be read.", Some(&e));
            Err(e)
        }
    }
}

fn parse_error(text: &str, offset: usize, message: impl Into<String>) -> Error {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |p| p + 1);
    Error::Parse {
        line,
        column: offset - line_start + 1,
        message: message.into(),
    }
}

struct Parser<'a> {
    scene: &'a mut Scene,
    space: SpaceId,
    text: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    created: Vec<NodeId>,
    routes: Vec<(RouteSpec, usize)>,
}

impl Parser<'_> {
    // Token stream

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.text.len(), |s| s.span.start)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        parse_error(self.text, offset, message)
    }

    fn unexpected(&self, wanted: &str) -> Error {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_owned(), Token::describe);
        self.error_at(self.offset(), format!("expected {wanted}, found {found}"))
    }

    fn expect(&mut self, expected: Token, wanted: &str) -> Result<Range<usize>> {
        if self.peek() == Some(&expected) {
            let spanned = self.advance().ok_or_else(|| self.unexpected(wanted))?;
            Ok(spanned.span)
        } else {
            Err(self.unexpected(wanted))
        }
    }

    fn ident(&mut self, wanted: &str) -> Result<(String, usize)> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.advance() {
                Some(Spanned {
                    token: Token::Ident(name),
                    span,
                }) => Ok((name, span.start)),
                _ => Err(self.unexpected(wanted)),
            },
            _ => Err(self.unexpected(wanted)),
        }
    }

    // Grammar

    fn document(&mut self) -> Result<Vec<NodeId>> {
        let mut roots = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Route => self.route()?,
                Token::Proto | Token::ExternProto => {
                    return Err(self.error_at(self.offset(), "prototype declarations are not supported"))
                }
                _ => {
                    if let Some(node) = self.node_statement()? {
                        roots.push(node);
                    }
                }
            }
        }
        Ok(roots)
    }

    fn route(&mut self) -> Result<()> {
        let start = self.expect(Token::Route, "ROUTE")?.start;
        let (from_node, _) = self.ident("node name")?;
        self.expect(Token::Dot, "'.'")?;
        let (from_field, _) = self.ident("field name")?;
        self.expect(Token::To, "TO")?;
        let (to_node, _) = self.ident("node name")?;
        self.expect(Token::Dot, "'.'")?;
        let (to_field, _) = self.ident("field name")?;
        self.routes.push((
            RouteSpec {
                from_node,
                from_field,
                to_node,
                to_field,
            },
            start,
        ));
        Ok(())
    }

    /// `DEF name Node`, `USE name`, `NULL` or a bare node.
    fn node_statement(&mut self) -> Result<Option<NodeId>> {
        match self.peek() {
            Some(Token::Null) => {
                self.advance();
                Ok(None)
            }
            Some(Token::Use) => {
                self.advance();
                let (name, at) = self.ident("node name after USE")?;
                self.scene
                    .named_node_in(self.space, &name)
                    .map(Some)
                    .ok_or_else(|| self.error_at(at, format!("USE of undefined name '{name}'")))
            }
            Some(Token::Def) => {
                self.advance();
                let (name, _) = self.ident("node name after DEF")?;
                self.node(Some(name)).map(Some)
            }
            Some(Token::Ident(_)) => self.node(None).map(Some),
            _ => Err(self.unexpected("a node")),
        }
    }

    fn node(&mut self, def: Option<String>) -> Result<NodeId> {
        let (type_name, at) = self.ident("node type")?;
        let id = self
            .scene
            .create_node(self.space, &type_name)
            .map_err(|e| self.error_at(at, e.to_string()))?;
        self.created.push(id);
        if let Some(name) = def {
            self.scene.define_name(self.space, name, id)?;
        }

        self.expect(Token::LBrace, "'{'")?;
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.advance();
                    return Ok(id);
                }
                Some(Token::Route) => self.route()?,
                Some(Token::Ident(_)) => self.field(id)?,
                _ => return Err(self.unexpected("a field name or '}'")),
            }
        }
    }

    fn field(&mut self, id: NodeId) -> Result<()> {
        let (name, at) = self.ident("field name")?;
        let index = self
            .scene
            .field_index(id, &name)
            .map_err(|e| self.error_at(at, e.to_string()))?;
        let field_type = self
            .scene
            .node(id)
            .and_then(|n| n.field_declaration(index))
            .map(|d| d.field_type)
            .ok_or_else(|| self.error_at(at, format!("no declaration for '{name}'")))?;

        let value_at = self.offset();
        let value = self.value(field_type)?;
        self.scene
            .set_value(id, index, value)
            .map_err(|e| self.error_at(value_at, e.to_string()))
    }

    fn value(&mut self, field_type: FieldType) -> Result<FieldValue> {
        let value = match field_type.kind() {
            FieldKind::Bool => FieldValue::Bool(self.boolean()?),
            FieldKind::Int32 => FieldValue::Int32(self.int32()?),
            FieldKind::Double => FieldValue::Double(self.number()?),
            FieldKind::Float => FieldValue::Float(self.number()? as f32),
            FieldKind::String => FieldValue::String(self.string()?),
            FieldKind::Node => FieldValue::Node(self.node_statement()?),
            FieldKind::BoolArray => {
                FieldValue::BoolArray(ArrayValue::new(self.list(1, Self::boolean)?))
            }
            FieldKind::Int32Array => {
                FieldValue::Int32Array(ArrayValue::new(self.list(1, Self::int32)?))
            }
            FieldKind::DoubleArray => {
                FieldValue::DoubleArray(ArrayValue::new(self.list(1, Self::number)?))
            }
            FieldKind::StringArray => {
                FieldValue::StringArray(ArrayValue::new(self.list(1, Self::string)?))
            }
            FieldKind::FloatArray if field_type.is_fixed_tuple() => {
                let mut data = Vec::with_capacity(field_type.components());
                for _ in 0..field_type.components() {
                    data.push(self.number()? as f32);
                }
                FieldValue::FloatArray(ArrayValue::new(data))
            }
            FieldKind::FloatArray => {
                let data = self.list(field_type.components(), |p| Ok(p.number()? as f32))?;
                FieldValue::FloatArray(ArrayValue::new(data))
            }
            FieldKind::NodeArray => {
                let nodes = self.list(1, Self::node_statement)?;
                FieldValue::nodes(nodes.into_iter().flatten().collect())
            }
        };
        Ok(value)
    }

    /// `[ item* ]`, or one element of `width` items without brackets.
    fn list<T>(&mut self, width: usize, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        if self.peek() != Some(&Token::LBracket) {
            for _ in 0..width {
                out.push(item(self)?);
            }
            return Ok(out);
        }
        self.advance();
        while self.peek() != Some(&Token::RBracket) {
            if self.peek().is_none() {
                return Err(self.unexpected("']'"));
            }
            out.push(item(self)?);
        }
        self.advance();
        Ok(out)
    }

    fn boolean(&mut self) -> Result<bool> {
        let value = match self.peek() {
            Some(Token::True) => true,
            Some(Token::False) => false,
            _ => return Err(self.unexpected("TRUE or FALSE")),
        };
        self.advance();
        Ok(value)
    }

    fn int32(&mut self) -> Result<i32> {
        let at = self.offset();
        match self.peek() {
            Some(Token::Int(v)) => {
                let v = i32::try_from(*v)
                    .map_err(|_| self.error_at(at, format!("{v} does not fit in 32 bits")))?;
                self.advance();
                Ok(v)
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let value = match self.peek() {
            Some(Token::Int(v)) => *v as f64,
            Some(Token::Float(v)) => *v,
            _ => return Err(self.unexpected("a number")),
        };
        self.advance();
        Ok(value)
    }

    fn string(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Str(_)) => match self.advance() {
                Some(Spanned {
                    token: Token::Str(s),
                    ..
                }) => Ok(s),
                _ => Err(self.unexpected("a string")),
            },
            _ => Err(self.unexpected("a string")),
        }
    }

    // Completion

    fn commit(mut self, roots: Vec<NodeId>) -> Result<Vec<NodeId>> {
        for &root in &roots {
            self.scene.add_root_node_in(self.space, root)?;
        }
        for (statement, at) in std::mem::take(&mut self.routes) {
            if let Err(e) = self.scene.add_route_spec(self.space, &statement) {
                let e = match e {
                    Error::InvalidRoute(msg) => self.error_at(at, msg),
                    other => other,
                };
                self.scene
                    .reporter_mut()
                    .warning_report("Skipping unresolved route.", Some(&e));
            }
        }
        for &id in &self.created {
            self.scene.finish_setup(id)?;
        }
        debug!(
            nodes = self.created.len(),
            roots = roots.len(),
            "Parsed scene content."
        );
        Ok(roots)
    }

    fn rollback(&mut self) {
        for id in self.created.drain(..).rev() {
            if self.scene.remove_node(id).is_err() {
                debug!(node = ?id, "Node already removed during rollback.");
            }
        }
    }
}
