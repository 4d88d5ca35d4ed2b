//! jsub I/O - Token sources and high-level extraction APIs
//!
//! This crate connects the extraction engine to real inputs:
//!
//! - A streaming, validating JSON tokenizer over any `Read`
//! - A token source walking an in-memory `serde_json::Value`
//! - Request/summary types and one-call extraction functions

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod reader;
pub mod value;

// Re-export commonly used types
pub use jsub_extract::{Extracted, Metadata, MetadataSelection, SelectionTree};
pub use jsub_format::{ErrorKind, ExtractError, Limits, Result, Token, TokenError, TokenSource};
pub use reader::{JsonTokenReader, ReaderLimits};
pub use value::ValueTokens;

use jsub_extract::extract_fields_with;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use std::time::{Duration, Instant};

/// Keys, fields and metadata selections in their JSON form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionSpec {
    /// Keys-of selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Map<String, Value>>,
    /// Full-copy selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
    /// Metadata name to path expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SelectionSpec {
    /// True if no selection is present
    pub fn is_empty(&self) -> bool {
        self.keys.is_none() && self.fields.is_none() && self.metadata.is_none()
    }

    /// Validate metadata expressions and merge everything into one tree
    pub fn to_tree(&self) -> Result<SelectionTree> {
        let metadata = self
            .metadata
            .as_ref()
            .map(MetadataSelection::from_map)
            .transpose()?;
        Ok(SelectionTree::build(
            self.keys.as_ref(),
            self.fields.as_ref(),
            metadata.as_ref(),
        ))
    }
}

/// Extraction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Output size limits
    pub limits: Limits,
    /// Tokenizer limits
    pub reader_limits: ReaderLimits,
    /// Reject input with anything but whitespace after the first value
    pub require_single_value: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            reader_limits: ReaderLimits::default(),
            require_single_value: true,
        }
    }
}

impl ExtractOptions {
    /// Validate all limits against their hard maximums
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.reader_limits.validate()
    }
}

/// Selection plus options for one extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractRequest {
    /// What to extract
    pub selection: SelectionSpec,
    /// How to extract it
    pub options: ExtractOptions,
}

/// Metrics collected during one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractMetrics {
    /// Tokens pulled from the source
    pub tokens_read: u64,
    /// Input bytes consumed (zero for in-memory values)
    pub bytes_read: u64,
    /// Compact JSON size of the subset
    pub subset_bytes: u64,
    /// Total bytes of metadata names and values
    pub metadata_bytes: u64,
    /// Wall time spent building the tree and extracting
    pub duration: Duration,
}

/// Result of a high-level extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractSummary {
    /// Subset and metadata
    pub extracted: Extracted,
    /// Collected metrics
    pub metrics: ExtractMetrics,
}

/// Extract from a JSON byte stream
pub fn extract_from_reader<R: Read>(reader: R, request: &ExtractRequest) -> Result<ExtractSummary> {
    let start = Instant::now();
    request.options.validate()?;
    let tree = request.selection.to_tree()?;

    let mut source = JsonTokenReader::with_limits(reader, request.options.reader_limits.clone())?;
    let extracted = extract_fields_with(&mut source, &tree, &request.options.limits)?;
    if request.options.require_single_value && !tree.is_empty() {
        source.finish()?;
    }

    let summary = summarize(extracted, source.bytes_read(), start);
    tracing::debug!(
        tokens_read = summary.metrics.tokens_read,
        bytes_read = summary.metrics.bytes_read,
        duration_us = summary.metrics.duration.as_micros() as u64,
        "extracted from reader"
    );
    Ok(summary)
}

/// Extract from JSON bytes in memory
pub fn extract_from_slice(input: &[u8], request: &ExtractRequest) -> Result<ExtractSummary> {
    extract_from_reader(input, request)
}

/// Extract from an already parsed JSON value
pub fn extract_from_value(value: &Value, request: &ExtractRequest) -> Result<ExtractSummary> {
    let start = Instant::now();
    request.options.limits.validate()?;
    let tree = request.selection.to_tree()?;

    let mut source = ValueTokens::new(value);
    let extracted = extract_fields_with(&mut source, &tree, &request.options.limits)?;
    Ok(summarize(extracted, 0, start))
}

fn summarize(extracted: Extracted, bytes_read: u64, start: Instant) -> ExtractSummary {
    let metrics = ExtractMetrics {
        tokens_read: extracted.tokens_read,
        bytes_read,
        subset_bytes: extracted.subset_bytes,
        metadata_bytes: extracted.metadata.size(),
        duration: start.elapsed(),
    };
    ExtractSummary { extracted, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(selection: Value) -> ExtractRequest {
        ExtractRequest {
            selection: serde_json::from_value(selection).unwrap(),
            options: ExtractOptions::default(),
        }
    }

    #[test]
    fn selection_spec_deserializes_partially() {
        let spec: SelectionSpec = serde_json::from_value(json!({"fields": {"a": {}}})).unwrap();
        assert!(spec.keys.is_none());
        assert!(spec.fields.is_some());
        assert!(!spec.is_empty());

        let unknown = serde_json::from_value::<SelectionSpec>(json!({"field": {}}));
        assert!(unknown.is_err());
    }

    #[test]
    fn reader_and_value_agree() {
        let doc = json!({"a": {"b": "hi"}, "list": [1, 2, 3]});
        let request = request(json!({
            "fields": {"list": {}},
            "metadata": {"n": "a.b", "len": "length(list)"}
        }));

        let text = serde_json::to_vec(&doc).unwrap();
        let from_reader = extract_from_slice(&text, &request).unwrap();
        let from_value = extract_from_value(&doc, &request).unwrap();

        assert_eq!(from_reader.extracted, from_value.extracted);
        assert_eq!(
            from_reader.extracted.subset,
            Some(json!({"list": [1, 2, 3]}))
        );
        assert_eq!(from_reader.metrics.bytes_read, text.len() as u64);
        assert_eq!(from_value.metrics.bytes_read, 0);
        assert_eq!(from_reader.metrics.metadata_bytes, 1 + 2 + 3 + 1);
    }

    #[test]
    fn trailing_content_is_rejected_by_default() {
        let request = request(json!({"fields": {}}));
        let err = extract_from_slice(b"{} {}", &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenStream);

        let mut lenient = request.clone();
        lenient.options.require_single_value = false;
        let summary = extract_from_slice(b"{} {}", &lenient).unwrap();
        assert_eq!(summary.extracted.subset, Some(json!({})));
    }

    #[test]
    fn empty_selection_skips_input() {
        let request = ExtractRequest::default();
        let summary = extract_from_slice(b"not json at all", &request).unwrap();
        assert!(summary.extracted.subset.is_none());
        assert_eq!(summary.metrics.bytes_read, 0);
    }

    #[test]
    fn invalid_options_fail_before_reading() {
        let mut request = request(json!({"fields": {}}));
        request.options.limits.max_metadata_size = u64::MAX;
        let err = extract_from_slice(b"{}", &request).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidLimits { .. }));
    }
}
