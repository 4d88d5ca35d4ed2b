//! JSON tokens and the token source contract

use crate::decimal::Decimal;
use crate::error::TokenError;
use std::fmt;

/// Integral JSON number
#[derive(Debug, Clone, PartialEq)]
pub enum Integer {
    /// Fits in a machine word
    Small(i64),
    /// Needs arbitrary precision
    Big(Decimal),
}

impl Integer {
    /// JSON text of this number
    pub fn text(&self) -> String {
        match self {
            Integer::Small(value) => value.to_string(),
            Integer::Big(decimal) => decimal.to_json_string(),
        }
    }
}

/// Floating-point JSON number
#[derive(Debug, Clone, PartialEq)]
pub enum Float {
    /// Exactly representable as a finite f64
    Small(f64),
    /// Needs arbitrary precision
    Big(Decimal),
}

impl Float {
    /// JSON text of this number
    pub fn text(&self) -> String {
        match self {
            Float::Small(value) => serde_json::Number::from_f64(*value)
                .map(|number| number.to_string())
                .unwrap_or_else(|| value.to_string()),
            Float::Big(decimal) => decimal.to_json_string(),
        }
    }
}

/// One token of a JSON document
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `{`
    BeginObject,
    /// `}`
    EndObject,
    /// `[`
    BeginArray,
    /// `]`
    EndArray,
    /// Object member name
    FieldName(String),
    /// String value
    String(String),
    /// Integral number
    Integer(Integer),
    /// Number with a fraction or exponent
    Float(Float),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
}

impl Token {
    /// Classify JSON number text into an integer or float token
    ///
    /// The text must follow the JSON number grammar. Text with a fraction or
    /// an exponent is a float, everything else an integer.
    pub fn number(text: &str) -> Result<Token, TokenError> {
        if !is_json_number(text) {
            return Err(TokenError::InvalidNumber(text.to_string()));
        }

        if text.bytes().any(|b| matches!(b, b'.' | b'e' | b'E')) {
            let decimal = Decimal::from_str_exact(text)?;
            // parse the text itself so a negative zero keeps its sign
            let float = match (decimal.to_f64_if_exact(), text.parse::<f64>()) {
                (Some(_), Ok(value)) => Float::Small(value),
                _ => Float::Big(decimal),
            };
            return Ok(Token::Float(float));
        }

        match text.parse::<i64>() {
            Ok(value) => Ok(Token::Integer(Integer::Small(value))),
            Err(_) => Ok(Token::Integer(Integer::Big(Decimal::from_str_exact(text)?))),
        }
    }

    /// True for string, number, boolean and null tokens
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Token::String(_) | Token::Integer(_) | Token::Float(_) | Token::Bool(_) | Token::Null
        )
    }

    /// Textual representation used for value metadata
    ///
    /// Strings and field names yield their unquoted text, numbers their JSON
    /// text, literals their keyword.
    pub fn text(&self) -> String {
        match self {
            Token::BeginObject => "{".to_string(),
            Token::EndObject => "}".to_string(),
            Token::BeginArray => "[".to_string(),
            Token::EndArray => "]".to_string(),
            Token::FieldName(text) | Token::String(text) => text.clone(),
            Token::Integer(integer) => integer.text(),
            Token::Float(float) => float.text(),
            Token::Bool(value) => value.to_string(),
            Token::Null => "null".to_string(),
        }
    }

    /// Short name of the token kind for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::BeginObject => "start of object",
            Token::EndObject => "end of object",
            Token::BeginArray => "start of array",
            Token::EndArray => "end of array",
            Token::FieldName(_) => "field name",
            Token::String(_) => "string",
            Token::Integer(_) => "integer",
            Token::Float(_) => "float",
            Token::Bool(_) => "boolean",
            Token::Null => "null",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BeginObject => f.write_str("begin-object"),
            Token::EndObject => f.write_str("end-object"),
            Token::BeginArray => f.write_str("begin-array"),
            Token::EndArray => f.write_str("end-array"),
            Token::FieldName(name) => write!(f, "field-name {:?}", name),
            Token::String(value) => write!(f, "string {:?}", value),
            Token::Integer(Integer::Small(value)) => write!(f, "integer {}", value),
            Token::Integer(Integer::Big(decimal)) => {
                write!(f, "big-integer {}", decimal.to_json_string())
            }
            Token::Float(float @ Float::Small(_)) => write!(f, "float {}", float.text()),
            Token::Float(float @ Float::Big(_)) => write!(f, "big-float {}", float.text()),
            Token::Bool(value) => write!(f, "boolean {}", value),
            Token::Null => f.write_str("null"),
        }
    }
}

/// Check `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = 0;

    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    if bytes.get(pos) == Some(&b'-') {
        pos += 1;
    }

    match bytes.get(pos) {
        Some(b'0') => pos += 1,
        Some(b'1'..=b'9') => pos += digits_from(pos),
        _ => return false,
    }

    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        let frac = digits_from(pos);
        if frac == 0 {
            return false;
        }
        pos += frac;
    }

    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+') | Some(b'-')) {
            pos += 1;
        }
        let exp = digits_from(pos);
        if exp == 0 {
            return false;
        }
        pos += exp;
    }

    pos == bytes.len()
}

/// Forward-only producer of JSON tokens
///
/// `Ok(None)` marks the end of the stream. Sources are single-use: once a
/// token has been returned it cannot be read again.
pub trait TokenSource {
    /// Pull the next token
    fn next_token(&mut self) -> Result<Option<Token>, TokenError>;
}

impl<T: TokenSource + ?Sized> TokenSource for &mut T {
    fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        (**self).next_token()
    }
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        (**self).next_token()
    }
}

/// Token source over an in-memory sequence of tokens
///
/// The sequence is passed through as-is, so it can describe token streams a
/// JSON parser would never produce.
#[derive(Debug, Clone)]
pub struct TokenIter<I> {
    inner: I,
    consumed: usize,
}

impl<I: Iterator<Item = Token>> TokenIter<I> {
    /// Wrap an iterator of tokens
    pub fn new(tokens: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: tokens.into_iter(),
            consumed: 0,
        }
    }

    /// Number of tokens handed out so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl<I: Iterator<Item = Token>> TokenSource for TokenIter<I> {
    fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        let token = self.inner.next();
        if token.is_some() {
            self.consumed += 1;
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_classifies_integers() {
        assert_eq!(Token::number("0").unwrap(), Token::Integer(Integer::Small(0)));
        assert_eq!(
            Token::number("-42").unwrap(),
            Token::Integer(Integer::Small(-42))
        );
        assert_eq!(
            Token::number("9223372036854775807").unwrap(),
            Token::Integer(Integer::Small(i64::MAX))
        );

        match Token::number("18446744073709551616").unwrap() {
            Token::Integer(Integer::Big(decimal)) => {
                assert_eq!(decimal.to_json_string(), "18446744073709551616")
            }
            other => panic!("expected big integer, got {other:?}"),
        }
    }

    #[test]
    fn number_classifies_floats() {
        assert_eq!(Token::number("1.5").unwrap(), Token::Float(Float::Small(1.5)));
        assert_eq!(Token::number("1e2").unwrap(), Token::Float(Float::Small(100.0)));
        assert_eq!(Token::number("-0.0").unwrap(), Token::Float(Float::Small(-0.0)));

        assert!(matches!(
            Token::number("1.00000000000000000000001").unwrap(),
            Token::Float(Float::Big(_))
        ));
        assert!(matches!(
            Token::number("1e999").unwrap(),
            Token::Float(Float::Big(_))
        ));
    }

    #[test]
    fn number_rejects_invalid_grammar() {
        for text in ["", "-", "01", "1.", ".5", "1e", "1e+", "+1", "0x10", "1.2.3", "NaN"] {
            assert!(
                matches!(Token::number(text), Err(TokenError::InvalidNumber(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn text_matches_json_rendering() {
        assert_eq!(Token::String("hi".into()).text(), "hi");
        assert_eq!(Token::Bool(false).text(), "false");
        assert_eq!(Token::Null.text(), "null");
        assert_eq!(Token::number("1.0").unwrap().text(), "1.0");
        assert_eq!(Token::number("12").unwrap().text(), "12");
        assert_eq!(
            Token::number("123456789012345678901234567890").unwrap().text(),
            "123456789012345678901234567890"
        );
    }

    #[test]
    fn token_iter_counts_consumed() {
        let mut source = TokenIter::new(vec![Token::BeginArray, Token::EndArray]);
        assert_eq!(source.next_token().unwrap(), Some(Token::BeginArray));
        assert_eq!(source.consumed(), 1);
        assert_eq!(source.next_token().unwrap(), Some(Token::EndArray));
        assert_eq!(source.next_token().unwrap(), None);
        assert_eq!(source.consumed(), 2);
    }

    #[test]
    fn display_is_one_line_per_token() {
        assert_eq!(Token::FieldName("a".into()).to_string(), "field-name \"a\"");
        assert_eq!(Token::number("7").unwrap().to_string(), "integer 7");
        assert_eq!(Token::BeginObject.to_string(), "begin-object");
    }
}
