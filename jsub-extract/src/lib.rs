//! jsub Extract - Single-pass subset and metadata extraction
//!
//! This crate correlates a JSON token stream with a set of selections:
//!
//! - Selection trees merging keys-of, full-copy and metadata selections
//! - The streaming extraction engine
//! - Size-bounded sinks for the subset document and the metadata map
//!
//! ```
//! use jsub_extract::{extract_fields, MetadataSelection};
//! use jsub_format::{Token, TokenIter};
//!
//! let metadata = MetadataSelection::from_pairs([("id", "id")]).unwrap();
//! let mut source = TokenIter::new(vec![
//!     Token::BeginObject,
//!     Token::FieldName("id".into()),
//!     Token::String("abc".into()),
//!     Token::EndObject,
//! ]);
//! let extracted = extract_fields(&mut source, None, None, 1000, 1000, Some(&metadata)).unwrap();
//! assert!(extracted.subset.is_none());
//! assert_eq!(extracted.metadata.get("id"), Some("abc"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod metadata;
pub mod selection;
pub mod sink;

pub use jsub_format::{ExtractError, Limits, Result, Token, TokenSource};

pub use engine::Extractor;
pub use metadata::{
    Metadata, MetadataAccumulator, MetadataExpr, MetadataRequest, MetadataSelection, MetadataSink,
    NULL_LENGTH,
};
pub use selection::{SelectionNode, SelectionTree, ANY_INDEX, ANY_KEY};
pub use sink::{DocumentSink, NullSink, TreeSink};

use serde_json::{Map, Value};

/// Outcome of one extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Subset document, absent when no subset was requested
    pub subset: Option<Value>,
    /// Metadata values in document order
    pub metadata: Metadata,
    /// Tokens pulled from the source
    pub tokens_read: u64,
    /// Compact JSON size of the subset in bytes
    pub subset_bytes: u64,
}

/// Extract a subset and metadata from one JSON value
///
/// `keys` and `fields` are nested selections: `None` selects nothing, an empty
/// object selects the whole document. The source is read for exactly one value
/// and left positioned after it; nothing is read if no selection was given.
pub fn extract_fields<S: TokenSource + ?Sized>(
    source: &mut S,
    keys: Option<&Map<String, Value>>,
    fields: Option<&Map<String, Value>>,
    max_subset_size: u64,
    max_metadata_size: u64,
    metadata: Option<&MetadataSelection>,
) -> Result<Extracted> {
    let tree = SelectionTree::build(keys, fields, metadata);
    let limits = Limits {
        max_subset_size,
        max_metadata_size,
    };
    extract_fields_with(source, &tree, &limits)
}

/// Extract with a prebuilt selection tree
pub fn extract_fields_with<S: TokenSource + ?Sized>(
    source: &mut S,
    tree: &SelectionTree,
    limits: &Limits,
) -> Result<Extracted> {
    if tree.is_empty() {
        tracing::debug!("empty selection; token source left unread");
        return Ok(Extracted::default());
    }
    tracing::debug!(
        needs_subset = tree.needs_subset(),
        max_subset_size = limits.max_subset_size,
        max_metadata_size = limits.max_metadata_size,
        "starting extraction"
    );

    let mut accumulator = MetadataAccumulator::new(limits.max_metadata_size);
    let (subset, tokens_read, subset_bytes) = if tree.needs_subset() {
        let mut sink = TreeSink::new(limits.max_subset_size);
        let tokens_read = run(source, tree, &mut sink, &mut accumulator)?;
        let subset_bytes = sink.size();
        (Some(sink.finish()?), tokens_read, subset_bytes)
    } else {
        let tokens_read = run(source, tree, &mut NullSink, &mut accumulator)?;
        (None, tokens_read, 0)
    };

    let metadata = accumulator.into_metadata();
    tracing::debug!(
        tokens_read,
        subset_bytes,
        metadata_entries = metadata.len(),
        metadata_bytes = metadata.size(),
        "extraction finished"
    );
    Ok(Extracted {
        subset,
        metadata,
        tokens_read,
        subset_bytes,
    })
}

fn run<S, D>(
    source: &mut S,
    tree: &SelectionTree,
    sink: &mut D,
    metadata: &mut MetadataAccumulator,
) -> Result<u64>
where
    S: TokenSource + ?Sized,
    D: DocumentSink + ?Sized,
{
    let mut extractor = Extractor::new(source, sink, metadata);
    extractor.run(tree.root())?;
    Ok(extractor.tokens_read())
}
