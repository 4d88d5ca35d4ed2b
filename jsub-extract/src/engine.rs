//! Single-pass walker correlating a selection tree with a token stream
//!
//! The walker reads each token exactly once. Every container it enters is
//! consumed through its matching close token, whether the contents are being
//! copied, summarized as keys, counted or skipped. Once a node requests a full
//! copy, everything below it is copied too; this is carried down as the
//! `copy_all` argument and the selection tree itself is never modified.

use crate::metadata::{MetadataSink, NULL_LENGTH};
use crate::selection::{SelectionNode, ANY_INDEX, ANY_KEY};
use crate::sink::DocumentSink;
use jsub_format::{DocPath, ExtractError, Result, Token, TokenError, TokenSource};
use smallvec::{smallvec, SmallVec};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Extraction state for one document
pub struct Extractor<'a, S: ?Sized, D: ?Sized, M: ?Sized> {
    source: &'a mut S,
    subset: &'a mut D,
    metadata: &'a mut M,
    path: DocPath,
    tokens_read: u64,
}

impl<'a, S, D, M> Extractor<'a, S, D, M>
where
    S: TokenSource + ?Sized,
    D: DocumentSink + ?Sized,
    M: MetadataSink + ?Sized,
{
    /// Bind a token source to the subset and metadata sinks
    pub fn new(source: &'a mut S, subset: &'a mut D, metadata: &'a mut M) -> Self {
        Self {
            source,
            subset,
            metadata,
            path: DocPath::new(),
            tokens_read: 0,
        }
    }

    /// Tokens pulled from the source so far
    pub fn tokens_read(&self) -> u64 {
        self.tokens_read
    }

    /// Consume exactly one complete value from the source
    pub fn run(&mut self, root: &SelectionNode) -> Result<()> {
        let token = self.next()?;
        self.extract(token, root, false)?;
        tracing::trace!(tokens = self.tokens_read, "document value consumed");
        Ok(())
    }

    fn next(&mut self) -> Result<Token> {
        match self.source.next_token()? {
            Some(token) => {
                self.tokens_read += 1;
                Ok(token)
            }
            None => Err(TokenError::UnexpectedEnd.into()),
        }
    }

    fn structure(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::Structure {
            path: self.path.to_string(),
            reason: reason.into(),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> ExtractError {
        self.structure(format!("expected {}, found {}", expected, token.kind_name()))
    }

    fn extract(&mut self, token: Token, node: &SelectionNode, copy_all: bool) -> Result<()> {
        match token {
            Token::BeginObject => self.extract_object(node, copy_all),
            Token::BeginArray => self.extract_array(node, copy_all),
            Token::EndObject | Token::EndArray | Token::FieldName(_) => {
                Err(self.unexpected(&token, "a value"))
            }
            scalar => self.extract_scalar(scalar, node, copy_all),
        }
    }

    fn extract_object(&mut self, node: &SelectionNode, copy_all: bool) -> Result<()> {
        if node.child(ANY_INDEX).is_some() {
            return Err(self.structure(format!(
                "found an object where the selection expects an array ({})",
                ANY_INDEX
            )));
        }
        let members = if copy_all || node.need_all() {
            if node.has_children() {
                self.copy_fields_with_children(node)?
            } else {
                self.pass_container(Container::Object, true)?
            }
        } else if node.need_keys() {
            if node.has_children() {
                return Err(self.structure(format!(
                    "keys-of selection cannot also select fields below it ({})",
                    node.child_names().join(", ")
                )));
            }
            self.write_keys()?
        } else if node.has_children() {
            self.select_fields(node)?
        } else {
            self.pass_container(Container::Object, false)?
        };
        self.finish_container(node, members)
    }

    fn extract_array(&mut self, node: &SelectionNode, copy_all: bool) -> Result<()> {
        let members = if node.has_children() {
            let element = match node.child(ANY_INDEX) {
                Some(element) if node.child_count() == 1 => element,
                Some(_) => {
                    return Err(self.structure(format!(
                        "selection on an array may only use {} (found {})",
                        ANY_INDEX,
                        node.child_names().join(", ")
                    )))
                }
                None => {
                    return Err(self.structure(format!(
                        "found an array where the selection expects an object ({}); use {} to select elements",
                        node.child_names().join(", "),
                        ANY_INDEX
                    )))
                }
            };
            self.select_elements(element, copy_all || node.needs_subset(), copy_all)?
        } else if node.need_keys() {
            return Err(self.structure("keys-of selection on an array"));
        } else {
            self.pass_container(Container::Array, copy_all || node.need_all())?
        };
        self.finish_container(node, members)
    }

    fn extract_scalar(&mut self, token: Token, node: &SelectionNode, copy_all: bool) -> Result<()> {
        if node.has_children() {
            return Err(self.structure(format!(
                "found a {} where the selection expects a container ({})",
                token.kind_name(),
                node.child_names().join(", ")
            )));
        }
        if node.need_keys() {
            return Err(self.structure(format!("keys-of selection on a {}", token.kind_name())));
        }

        if copy_all || node.need_all() {
            self.subset.token(&token)?;
        }

        if !node.length_names().is_empty() {
            match &token {
                Token::String(text) => self.save_length(node, text.chars().count())?,
                Token::Null => self.save_length(node, NULL_LENGTH)?,
                other => {
                    return Err(self.structure(format!(
                        "length() requested on a {}",
                        other.kind_name()
                    )))
                }
            }
        }

        if !node.value_names().is_empty() {
            let text = token.text();
            for name in node.value_names() {
                self.metadata.save(name, &text)?;
            }
        }
        Ok(())
    }

    /// Copy an object, descending with `copy_all` into fields that have children
    fn copy_fields_with_children(&mut self, node: &SelectionNode) -> Result<u64> {
        self.subset.begin_object()?;
        let mut members = 0;
        loop {
            match self.next()? {
                Token::EndObject => break,
                Token::FieldName(name) => {
                    self.subset.field_name(&name)?;
                    let value = self.next()?;
                    match node.child(&name) {
                        Some(child) => self.descend_field(name, value, child, true)?,
                        None => self.pass_value(value, true)?,
                    }
                }
                other => return Err(self.unexpected(&other, "a field name or end of object")),
            }
            members += 1;
        }
        self.subset.end_object()?;
        Ok(members)
    }

    /// Write the field names of an object as an array of strings
    fn write_keys(&mut self) -> Result<u64> {
        self.subset.begin_array()?;
        let mut members = 0;
        loop {
            match self.next()? {
                Token::EndObject => break,
                Token::FieldName(name) => {
                    self.subset.string(&name)?;
                    let value = self.next()?;
                    self.pass_value(value, false)?;
                }
                other => return Err(self.unexpected(&other, "a field name or end of object")),
            }
            members += 1;
        }
        self.subset.end_array()?;
        Ok(members)
    }

    /// Visit the selected fields of an object and skip the rest
    fn select_fields(&mut self, node: &SelectionNode) -> Result<u64> {
        let wildcard = node.child(ANY_KEY);
        if wildcard.is_some() && node.child_count() > 1 {
            let others: Vec<&str> = node
                .child_names()
                .into_iter()
                .filter(|name| *name != ANY_KEY)
                .collect();
            return Err(self.structure(format!(
                "selection with {} cannot name other fields ({})",
                ANY_KEY,
                others.join(", ")
            )));
        }

        let write = node.need_subset_in_children();
        if write {
            self.subset.begin_object()?;
        }

        // a repeated field name is only visited on its first occurrence
        let mut visited: SmallVec<[bool; 8]> = smallvec![false; node.child_count()];
        let mut members = 0;
        loop {
            match self.next()? {
                Token::EndObject => break,
                Token::FieldName(name) => {
                    let selected = match wildcard {
                        Some(child) => Some(child),
                        None => match node.child_position(&name) {
                            Some(idx) if !visited[idx] => {
                                visited[idx] = true;
                                node.child_at(idx)
                            }
                            _ => None,
                        },
                    };
                    let value = self.next()?;
                    match selected {
                        Some(child) => {
                            if write && child.needs_subset() {
                                self.subset.field_name(&name)?;
                            }
                            self.descend_field(name, value, child, false)?;
                        }
                        None => {
                            tracing::trace!(path = %self.path, field = %name, "skipping field");
                            self.pass_value(value, false)?
                        }
                    }
                }
                other => return Err(self.unexpected(&other, "a field name or end of object")),
            }
            members += 1;
        }

        if write {
            self.subset.end_object()?;
        }
        Ok(members)
    }

    /// Apply `element` to every element of an array
    fn select_elements(
        &mut self,
        element: &SelectionNode,
        write: bool,
        copy_all: bool,
    ) -> Result<u64> {
        if write {
            self.subset.begin_array()?;
        }
        let mut index = 0usize;
        loop {
            let token = self.next()?;
            if token == Token::EndArray {
                break;
            }
            self.path.push_index(index);
            self.extract(token, element, copy_all)?;
            self.path.pop();
            index += 1;
        }
        if write {
            self.subset.end_array()?;
        }
        Ok(index as u64)
    }

    fn descend_field(
        &mut self,
        name: String,
        value: Token,
        child: &SelectionNode,
        copy_all: bool,
    ) -> Result<()> {
        self.path.push_field(name);
        self.extract(value, child, copy_all)?;
        self.path.pop();
        Ok(())
    }

    /// Consume the rest of a container whose open token was just read
    ///
    /// With `copy` set the container is written to the subset verbatim.
    /// Returns the number of direct members.
    fn pass_container(&mut self, kind: Container, copy: bool) -> Result<u64> {
        if copy {
            match kind {
                Container::Object => self.subset.begin_object()?,
                Container::Array => self.subset.begin_array()?,
            }
        }

        let mut members = 0;
        loop {
            let token = self.next()?;
            match (kind, token) {
                (Container::Object, Token::EndObject) | (Container::Array, Token::EndArray) => {
                    break
                }
                (Container::Object, Token::FieldName(name)) => {
                    if copy {
                        self.subset.field_name(&name)?;
                    }
                    let value = self.next()?;
                    self.pass_value(value, copy)?;
                }
                (Container::Object, other) => {
                    return Err(self.unexpected(&other, "a field name or end of object"))
                }
                (Container::Array, value) => self.pass_value(value, copy)?,
            }
            members += 1;
        }

        if copy {
            match kind {
                Container::Object => self.subset.end_object()?,
                Container::Array => self.subset.end_array()?,
            }
        }
        Ok(members)
    }

    fn pass_value(&mut self, token: Token, copy: bool) -> Result<()> {
        match token {
            Token::BeginObject => self.pass_container(Container::Object, copy).map(drop),
            Token::BeginArray => self.pass_container(Container::Array, copy).map(drop),
            Token::EndObject | Token::EndArray | Token::FieldName(_) => {
                Err(self.unexpected(&token, "a value"))
            }
            scalar if copy => self.subset.token(&scalar),
            _ => Ok(()),
        }
    }

    fn finish_container(&mut self, node: &SelectionNode, members: u64) -> Result<()> {
        if !node.value_names().is_empty() {
            tracing::debug!(
                path = %self.path,
                names = ?node.value_names(),
                "value metadata requested on a container; nothing recorded"
            );
        }
        self.save_length(node, members)
    }

    fn save_length(&mut self, node: &SelectionNode, length: impl fmt::Display) -> Result<()> {
        if node.length_names().is_empty() {
            return Ok(());
        }
        let text = length.to_string();
        for name in node.length_names() {
            self.metadata.save(name, &text)?;
        }
        Ok(())
    }
}
