//! Document sinks receiving the extracted subset
//!
//! [`TreeSink`] builds a `serde_json::Value` and enforces the subset size
//! limit. The size of the subset is the length in bytes of its compact JSON
//! rendering, counted incrementally as tokens arrive so the limit trips at the
//! first write that crosses it.

use jsub_format::{ExtractError, Float, Integer, Result, SizeTarget, Token};
use serde_json::{Map, Number, Value};

/// Receiver of a well-formed sequence of JSON writes
pub trait DocumentSink {
    /// `{`
    fn begin_object(&mut self) -> Result<()>;
    /// `}`
    fn end_object(&mut self) -> Result<()>;
    /// `[`
    fn begin_array(&mut self) -> Result<()>;
    /// `]`
    fn end_array(&mut self) -> Result<()>;
    /// Member name inside an object
    fn field_name(&mut self, name: &str) -> Result<()>;
    /// String value
    fn string(&mut self, value: &str) -> Result<()>;
    /// Integral number
    fn integer(&mut self, value: &Integer) -> Result<()>;
    /// Floating-point number
    fn float(&mut self, value: &Float) -> Result<()>;
    /// `true` or `false`
    fn boolean(&mut self, value: bool) -> Result<()>;
    /// `null`
    fn null(&mut self) -> Result<()>;

    /// Write one token verbatim
    fn token(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::BeginObject => self.begin_object(),
            Token::EndObject => self.end_object(),
            Token::BeginArray => self.begin_array(),
            Token::EndArray => self.end_array(),
            Token::FieldName(name) => self.field_name(name),
            Token::String(value) => self.string(value),
            Token::Integer(value) => self.integer(value),
            Token::Float(value) => self.float(value),
            Token::Bool(value) => self.boolean(*value),
            Token::Null => self.null(),
        }
    }
}

impl<T: DocumentSink + ?Sized> DocumentSink for &mut T {
    fn begin_object(&mut self) -> Result<()> {
        (**self).begin_object()
    }
    fn end_object(&mut self) -> Result<()> {
        (**self).end_object()
    }
    fn begin_array(&mut self) -> Result<()> {
        (**self).begin_array()
    }
    fn end_array(&mut self) -> Result<()> {
        (**self).end_array()
    }
    fn field_name(&mut self, name: &str) -> Result<()> {
        (**self).field_name(name)
    }
    fn string(&mut self, value: &str) -> Result<()> {
        (**self).string(value)
    }
    fn integer(&mut self, value: &Integer) -> Result<()> {
        (**self).integer(value)
    }
    fn float(&mut self, value: &Float) -> Result<()> {
        (**self).float(value)
    }
    fn boolean(&mut self, value: bool) -> Result<()> {
        (**self).boolean(value)
    }
    fn null(&mut self) -> Result<()> {
        (**self).null()
    }
}

/// Sink that discards every write
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DocumentSink for NullSink {
    fn begin_object(&mut self) -> Result<()> {
        Ok(())
    }
    fn end_object(&mut self) -> Result<()> {
        Ok(())
    }
    fn begin_array(&mut self) -> Result<()> {
        Ok(())
    }
    fn end_array(&mut self) -> Result<()> {
        Ok(())
    }
    fn field_name(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }
    fn string(&mut self, _value: &str) -> Result<()> {
        Ok(())
    }
    fn integer(&mut self, _value: &Integer) -> Result<()> {
        Ok(())
    }
    fn float(&mut self, _value: &Float) -> Result<()> {
        Ok(())
    }
    fn boolean(&mut self, _value: bool) -> Result<()> {
        Ok(())
    }
    fn null(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
enum Frame {
    Object {
        map: Map<String, Value>,
        pending: Option<String>,
        members: usize,
    },
    Array {
        items: Vec<Value>,
    },
}

/// Sink building an in-memory JSON value under a size limit
#[derive(Debug)]
pub struct TreeSink {
    stack: Vec<Frame>,
    root: Option<Value>,
    size: u64,
    max_size: u64,
}

impl TreeSink {
    /// Create a sink accepting at most `max_size` bytes of compact JSON
    pub fn new(max_size: u64) -> Self {
        Self {
            stack: Vec::new(),
            root: None,
            size: 0,
            max_size,
        }
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Return the completed value
    pub fn finish(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(ExtractError::Internal(format!(
                "subset has {} unclosed container(s)",
                self.stack.len()
            )));
        }
        self.root
            .ok_or_else(|| ExtractError::Internal("no subset value was written".to_string()))
    }

    fn reserve(&mut self, bytes: u64) -> Result<()> {
        let attempted = self.size + bytes;
        if attempted > self.max_size {
            return Err(ExtractError::SizeExceeded {
                target: SizeTarget::Subset,
                limit: self.max_size,
                attempted,
            });
        }
        self.size = attempted;
        Ok(())
    }

    /// Separator bytes a value written now needs; fails if no value is allowed
    fn value_separator(&self) -> Result<u64> {
        match self.stack.last() {
            None if self.root.is_some() => Err(ExtractError::Internal(
                "subset already holds a complete value".to_string(),
            )),
            None => Ok(0),
            Some(Frame::Object { pending: None, .. }) => Err(ExtractError::Internal(
                "object value written without a field name".to_string(),
            )),
            Some(Frame::Object { .. }) => Ok(0),
            Some(Frame::Array { items }) => Ok(u64::from(!items.is_empty())),
        }
    }

    fn attach(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                self.root = Some(value);
                Ok(())
            }
            Some(Frame::Object {
                map,
                pending,
                members,
            }) => match pending.take() {
                Some(key) => {
                    let key_len = quoted_len(&key);
                    if let Some(replaced) = map.insert(key, value) {
                        // a repeated name replaces the earlier member; drop its ',' ':' name and value
                        let replaced_len = compact_len(&replaced)?;
                        *members -= 1;
                        self.size -= 2 + key_len + replaced_len;
                    }
                    Ok(())
                }
                None => Err(ExtractError::Internal(
                    "object value written without a field name".to_string(),
                )),
            },
            Some(Frame::Array { items }) => {
                items.push(value);
                Ok(())
            }
        }
    }

    fn scalar(&mut self, value: Value, text_len: u64) -> Result<()> {
        let separator = self.value_separator()?;
        self.reserve(separator + text_len)?;
        self.attach(value)
    }

    fn open(&mut self, frame: Frame) -> Result<()> {
        let separator = self.value_separator()?;
        self.reserve(separator + 1)?;
        self.stack.push(frame);
        Ok(())
    }
}

impl DocumentSink for TreeSink {
    fn begin_object(&mut self) -> Result<()> {
        self.open(Frame::Object {
            map: Map::new(),
            pending: None,
            members: 0,
        })
    }

    fn end_object(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Object {
                map, pending: None, ..
            }) => {
                self.reserve(1)?;
                self.attach(Value::Object(map))
            }
            Some(Frame::Object { .. }) => Err(ExtractError::Internal(
                "object closed after a field name".to_string(),
            )),
            _ => Err(ExtractError::Internal(
                "end of object without an open object".to_string(),
            )),
        }
    }

    fn begin_array(&mut self) -> Result<()> {
        self.open(Frame::Array { items: Vec::new() })
    }

    fn end_array(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Frame::Array { items }) => {
                self.reserve(1)?;
                self.attach(Value::Array(items))
            }
            _ => Err(ExtractError::Internal(
                "end of array without an open array".to_string(),
            )),
        }
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        let separator = match self.stack.last() {
            Some(Frame::Object {
                pending: None,
                members,
                ..
            }) => u64::from(*members > 0),
            _ => {
                return Err(ExtractError::Internal(format!(
                    "field name '{}' written outside an object",
                    name
                )))
            }
        };
        // name plus ':'
        self.reserve(separator + quoted_len(name) + 1)?;
        if let Some(Frame::Object {
            pending, members, ..
        }) = self.stack.last_mut()
        {
            *pending = Some(name.to_string());
            *members += 1;
        }
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.scalar(Value::String(value.to_string()), quoted_len(value))
    }

    fn integer(&mut self, value: &Integer) -> Result<()> {
        let (number, text) = match value {
            Integer::Small(v) => (Number::from(*v), v.to_string()),
            Integer::Big(decimal) => {
                let text = decimal.to_json_string();
                (parse_number(&text)?, text)
            }
        };
        self.scalar(Value::Number(number), text.len() as u64)
    }

    fn float(&mut self, value: &Float) -> Result<()> {
        let number = match value {
            Float::Small(v) => Number::from_f64(*v).ok_or_else(|| {
                ExtractError::Internal(format!("non-finite float {} in subset", v))
            })?,
            Float::Big(decimal) => parse_number(&decimal.to_json_string())?,
        };
        let len = number.to_string().len() as u64;
        self.scalar(Value::Number(number), len)
    }

    fn boolean(&mut self, value: bool) -> Result<()> {
        let len = if value { 4 } else { 5 };
        self.scalar(Value::Bool(value), len)
    }

    fn null(&mut self) -> Result<()> {
        self.scalar(Value::Null, 4)
    }
}

fn parse_number(text: &str) -> Result<Number> {
    serde_json::from_str::<Number>(text)
        .map_err(|err| ExtractError::Internal(format!("number '{}' not representable: {}", text, err)))
}

fn compact_len(value: &Value) -> Result<u64> {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len() as u64)
        .map_err(|err| ExtractError::Internal(format!("subset value not serializable: {}", err)))
}

/// Length of `s` as a compact JSON string literal
fn quoted_len(s: &str) -> u64 {
    let escaped: u64 = s
        .bytes()
        .map(|b| match b {
            b'"' | b'\\' | 0x08 | 0x0c | b'\n' | b'\r' | b'\t' => 2,
            0x00..=0x1f => 6,
            _ => 1,
        })
        .sum();
    escaped + 2
}
