//! jsub Format - Core primitives for single-pass JSON subset extraction
//!
//! This crate provides the building blocks shared by the extraction engine and
//! the token sources, with no I/O dependencies. It includes:
//!
//! - The closed [`Token`] union and the [`TokenSource`] contract
//! - Integral and floating-point number families with arbitrary precision
//! - Diagnostic document paths
//! - Error types
//! - Output size limits

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod decimal;
pub mod error;
pub mod limits;
pub mod path;
pub mod token;

// Re-export commonly used types
pub use decimal::Decimal;
pub use error::{ErrorKind, ExtractError, Result, SizeTarget, TokenError};
pub use limits::Limits;
pub use path::{DocPath, PathSegment};
pub use token::{Float, Integer, Token, TokenIter, TokenSource};
