//! Token source over an in-memory JSON value

use jsub_format::{Token, TokenError, TokenSource};
use serde_json::Value;

enum Frame<'a> {
    Object(serde_json::map::Iter<'a>),
    Array(std::slice::Iter<'a, Value>),
}

/// Yields the token stream of a `serde_json::Value` in document order
///
/// Numbers are classified from their JSON text, so big integers and
/// high-precision floats keep their exact value.
pub struct ValueTokens<'a> {
    stack: Vec<Frame<'a>>,
    pending: Option<&'a Value>,
    tokens_read: u64,
}

impl<'a> ValueTokens<'a> {
    /// Walk `value`
    pub fn new(value: &'a Value) -> Self {
        Self {
            stack: Vec::new(),
            pending: Some(value),
            tokens_read: 0,
        }
    }

    /// Tokens produced so far
    pub fn tokens_read(&self) -> u64 {
        self.tokens_read
    }

    fn enter(&mut self, value: &'a Value) -> Result<Token, TokenError> {
        Ok(match value {
            Value::Null => Token::Null,
            Value::Bool(b) => Token::Bool(*b),
            Value::Number(number) => Token::number(&number.to_string())?,
            Value::String(s) => Token::String(s.clone()),
            Value::Array(items) => {
                self.stack.push(Frame::Array(items.iter()));
                Token::BeginArray
            }
            Value::Object(map) => {
                self.stack.push(Frame::Object(map.iter()));
                Token::BeginObject
            }
        })
    }

    fn produce(&mut self) -> Result<Option<Token>, TokenError> {
        if let Some(value) = self.pending.take() {
            return self.enter(value).map(Some);
        }
        let token = match self.stack.last_mut() {
            None => return Ok(None),
            Some(Frame::Object(members)) => match members.next() {
                Some((name, value)) => {
                    self.pending = Some(value);
                    Token::FieldName(name.clone())
                }
                None => {
                    self.stack.pop();
                    Token::EndObject
                }
            },
            Some(Frame::Array(items)) => match items.next() {
                Some(item) => return self.enter(item).map(Some),
                None => {
                    self.stack.pop();
                    Token::EndArray
                }
            },
        };
        Ok(Some(token))
    }
}

impl TokenSource for ValueTokens<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        let token = self.produce()?;
        if token.is_some() {
            self.tokens_read += 1;
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsub_format::{Float, Integer};
    use serde_json::json;

    fn collect(value: &Value) -> Vec<Token> {
        let mut source = ValueTokens::new(value);
        let mut tokens = Vec::new();
        while let Some(token) = source.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn walks_in_document_order() {
        let value = json!({"b": [1, {"c": null}], "a": 2.5});
        assert_eq!(
            collect(&value),
            vec![
                Token::BeginObject,
                Token::FieldName("b".into()),
                Token::BeginArray,
                Token::Integer(Integer::Small(1)),
                Token::BeginObject,
                Token::FieldName("c".into()),
                Token::Null,
                Token::EndObject,
                Token::EndArray,
                Token::FieldName("a".into()),
                Token::Float(Float::Small(2.5)),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn scalar_root_is_one_token() {
        let value = json!("s");
        let mut source = ValueTokens::new(&value);
        assert_eq!(source.next_token().unwrap(), Some(Token::String("s".into())));
        assert_eq!(source.next_token().unwrap(), None);
        assert_eq!(source.tokens_read(), 1);
    }

    #[test]
    fn big_numbers_stay_exact() {
        let value: Value = serde_json::from_str("[123456789012345678901234567890]").unwrap();
        assert!(matches!(
            collect(&value)[1],
            Token::Integer(Integer::Big(_))
        ));
    }
}
