//! Error types for jsub extraction

use std::fmt;
use thiserror::Error;

/// Errors raised while producing tokens from a JSON document
#[derive(Debug, Error)]
pub enum TokenError {
    /// I/O operation failed while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Input is not well-formed JSON.
    #[error("Syntax error: {message}")]
    Syntax {
        /// Description of the malformed construct, including its position
        message: String,
    },
    /// The token stream ended in the middle of a value.
    #[error("Unexpected end of token stream")]
    UnexpectedEnd,
    /// Nesting went deeper than the configured maximum.
    #[error("Nesting depth limit exceeded: depth {depth} (max: {max_depth})")]
    DepthLimitExceeded {
        /// Depth that would have been reached
        depth: usize,
        /// Maximum depth allowed
        max_depth: usize,
    },
    /// A string or number lexeme is longer than the configured maximum.
    #[error("Lexeme too long: {length} bytes (max: {max_length})")]
    LexemeTooLong {
        /// Decoded length of the string or number
        length: usize,
        /// Maximum lexeme length allowed
        max_length: usize,
    },
    /// Number text does not follow the JSON number grammar.
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// Which bounded output a size limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTarget {
    /// The extracted subset document
    Subset,
    /// The accumulated metadata values
    Metadata,
}

impl fmt::Display for SizeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeTarget::Subset => f.write_str("subset"),
            SizeTarget::Metadata => f.write_str("metadata"),
        }
    }
}

/// Extraction error types
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The token source failed; propagated unchanged.
    #[error("Token stream error: {0}")]
    Token(#[from] TokenError),
    /// The document's shape contradicts what the selection assumed.
    #[error("Structural extraction error at {path}: {reason}")]
    Structure {
        /// Rendered diagnostic path (e.g. `list[0].name`)
        path: String,
        /// What was expected and what was found
        reason: String,
    },
    /// Cumulative subset or metadata size went over its maximum.
    #[error("Extracted {target} too large: {attempted} bytes (limit: {limit} bytes)")]
    SizeExceeded {
        /// Output that overflowed
        target: SizeTarget,
        /// Configured maximum in bytes
        limit: u64,
        /// Size the write would have produced
        attempted: u64,
    },
    /// The selection cannot be turned into a selection tree.
    #[error("Invalid selection: {reason}")]
    InvalidSelection {
        /// Why the selection was rejected
        reason: String,
    },
    /// Configured limits exceed their hard maximums.
    #[error("Invalid limits: {reason}")]
    InvalidLimits {
        /// Which limit was out of range
        reason: String,
    },
    /// Internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::Token(TokenError::Io(err))
    }
}

/// Coarse classification of an [`ExtractError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated input, or an I/O failure
    TokenStream,
    /// Document shape does not match the selection
    Structure,
    /// Subset or metadata too large
    SizeExceeded,
    /// Selection or limits rejected before extraction started
    Selection,
    /// Bug in the extractor or a sink
    Internal,
}

impl ExtractError {
    /// Classify this error without inspecting its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Token(_) => ErrorKind::TokenStream,
            ExtractError::Structure { .. } => ErrorKind::Structure,
            ExtractError::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            ExtractError::InvalidSelection { .. } | ExtractError::InvalidLimits { .. } => {
                ErrorKind::Selection
            }
            ExtractError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Build an [`ExtractError::InvalidSelection`]
    pub fn invalid_selection(reason: impl Into<String>) -> Self {
        ExtractError::InvalidSelection {
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_disjoint() {
        let io = ExtractError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.kind(), ErrorKind::TokenStream);

        let structure = ExtractError::Structure {
            path: "list".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(structure.kind(), ErrorKind::Structure);

        let size = ExtractError::SizeExceeded {
            target: SizeTarget::Metadata,
            limit: 10,
            attempted: 11,
        };
        assert_eq!(size.kind(), ErrorKind::SizeExceeded);
        assert_eq!(ExtractError::invalid_selection("x").kind(), ErrorKind::Selection);
    }

    #[test]
    fn messages_name_path_and_target() {
        let structure = ExtractError::Structure {
            path: "list[0].name".to_string(),
            reason: "keys-of selection on an array".to_string(),
        };
        assert!(structure.to_string().contains("list[0].name"));

        let size = ExtractError::SizeExceeded {
            target: SizeTarget::Subset,
            limit: 10,
            attempted: 12,
        };
        let message = size.to_string();
        assert!(message.contains("subset"));
        assert!(message.contains("12"));
    }
}
