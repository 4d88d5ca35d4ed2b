//! Metadata selections and the size-bounded metadata accumulator
//!
//! A metadata selection maps caller-defined names to path expressions of the
//! form `field1.field2...fieldN` (the scalar value at that path) or
//! `length(field1.field2...fieldN)` (the character count of a string, or the
//! member count of an object or array). Paths descend through object fields
//! only; wildcards are not allowed.

use ahash::AHashMap;
use jsub_format::{ExtractError, Result, SizeTarget};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Length recorded for a `null` value that had a `length()` request
pub const NULL_LENGTH: &str = "NaN";

/// What a metadata name wants from its node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataRequest {
    /// Textual value of a scalar
    Value,
    /// String length or container member count
    Length,
}

/// Parsed metadata path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataExpr {
    /// Field names from the document root
    pub path: Vec<String>,
    /// Value or length
    pub request: MetadataRequest,
}

impl MetadataExpr {
    /// Parse `a.b.c` or `length(a.b.c)`
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let (inner, request) = match trimmed
            .strip_prefix("length(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => (inner, MetadataRequest::Length),
            None => (trimmed, MetadataRequest::Value),
        };

        if inner.is_empty() {
            return Err(ExtractError::invalid_selection(format!(
                "metadata expression '{}' has an empty path",
                expression
            )));
        }

        let mut path = Vec::new();
        for segment in inner.split('.') {
            if segment.is_empty() {
                return Err(ExtractError::invalid_selection(format!(
                    "metadata expression '{}' contains an empty field name",
                    expression
                )));
            }
            if segment == crate::selection::ANY_KEY || segment == crate::selection::ANY_INDEX {
                return Err(ExtractError::invalid_selection(format!(
                    "metadata expression '{}' uses wildcard '{}'; metadata paths may only name fields",
                    expression, segment
                )));
            }
            path.push(segment.to_string());
        }

        Ok(Self { path, request })
    }
}

impl FromStr for MetadataExpr {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Named metadata expressions, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSelection {
    entries: Vec<(String, MetadataExpr)>,
}

impl MetadataSelection {
    /// Empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named expression
    pub fn insert(&mut self, name: impl Into<String>, expression: &str) -> Result<&mut Self> {
        let name = name.into();
        let expr = MetadataExpr::parse(expression)?;
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = expr,
            None => self.entries.push((name, expr)),
        }
        Ok(self)
    }

    /// Build from name/expression pairs
    pub fn from_pairs<I, N, E>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: AsRef<str>,
    {
        let mut selection = Self::new();
        for (name, expression) in pairs {
            selection.insert(name, expression.as_ref())?;
        }
        Ok(selection)
    }

    /// Build from a JSON object whose values are expression strings
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut selection = Self::new();
        for (name, value) in map {
            let expression = value.as_str().ok_or_else(|| {
                ExtractError::invalid_selection(format!(
                    "metadata expression for '{}' must be a string",
                    name
                ))
            })?;
            selection.insert(name.clone(), expression)?;
        }
        Ok(selection)
    }

    /// Iterate over (name, expression) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataExpr)> {
        self.entries.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    /// Number of names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no names were declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Receiver of extracted metadata values
pub trait MetadataSink {
    /// Record `value` under `name`, appending or overwriting
    fn save(&mut self, name: &str, value: &str) -> Result<()>;
}

/// Extracted metadata in the order it was first recorded
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: Vec<(String, String)>,
    index: AHashMap<String, usize>,
    size: u64,
}

impl Metadata {
    /// Value recorded for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    /// Iterate over (name, value) pairs in record order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Names in record order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes of names and values
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Convert to a JSON object of strings
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect()
    }

    /// Size after storing `value` under `name`
    fn size_with(&self, name: &str, value: &str) -> u64 {
        let entry = (name.len() + value.len()) as u64;
        match self.index.get(name) {
            Some(&idx) => {
                let (old_name, old_value) = &self.entries[idx];
                self.size - (old_name.len() + old_value.len()) as u64 + entry
            }
            None => self.size + entry,
        }
    }

    fn store(&mut self, name: &str, value: &str, size: u64) {
        match self.index.get(name) {
            Some(&idx) => self.entries[idx].1 = value.to_string(),
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), value.to_string()));
            }
        }
        self.size = size;
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Metadata {}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Metadata sink enforcing a maximum cumulative size
///
/// The size of the accumulated metadata is the sum of the byte lengths of all
/// names and their current values.
#[derive(Debug, Clone)]
pub struct MetadataAccumulator {
    metadata: Metadata,
    max_size: u64,
}

impl MetadataAccumulator {
    /// Create an empty accumulator
    pub fn new(max_size: u64) -> Self {
        Self {
            metadata: Metadata::default(),
            max_size,
        }
    }

    /// Current cumulative size in bytes
    pub fn size(&self) -> u64 {
        self.metadata.size()
    }

    /// Metadata recorded so far
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Consume the accumulator
    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }
}

impl MetadataSink for MetadataAccumulator {
    fn save(&mut self, name: &str, value: &str) -> Result<()> {
        let attempted = self.metadata.size_with(name, value);
        if attempted > self.max_size {
            return Err(ExtractError::SizeExceeded {
                target: SizeTarget::Metadata,
                limit: self.max_size,
                attempted,
            });
        }
        tracing::trace!(name, value, size = attempted, "saved metadata");
        self.metadata.store(name, value, attempted);
        Ok(())
    }
}
