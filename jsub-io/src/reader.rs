//! Streaming JSON tokens over any byte reader
//!
//! [`JsonTokenReader`] drives a `struson` pull reader and turns its values
//! into [`Token`]s one call at a time. Grammar validation and string decoding
//! happen in `struson`; this wrapper enforces [`ReaderLimits`], counts bytes
//! pulled from the input and stops after the first top-level value.

use jsub_format::{ExtractError, Token, TokenError, TokenSource};
use std::cell::Cell;
use std::io::Read;
use std::rc::Rc;
use struson::reader::{JsonReader, JsonStreamReader, ReaderError, ReaderSettings, ValueType};

/// Resource limits for the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderLimits {
    /// Maximum container nesting depth
    pub max_depth: usize,
    /// Maximum bytes in one decoded string or number lexeme
    pub max_string_len: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            max_depth: 512,
            max_string_len: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl ReaderLimits {
    /// Hard maximum limits that cannot be exceeded
    pub fn hard_maximums() -> Self {
        Self {
            max_depth: 4096,
            max_string_len: 128 * 1024 * 1024, // 128 MiB
        }
    }

    /// Validate limits against hard maximums
    pub fn validate(&self) -> Result<(), ExtractError> {
        let hard = Self::hard_maximums();

        if self.max_depth == 0 || self.max_depth > hard.max_depth {
            return Err(ExtractError::InvalidLimits {
                reason: format!(
                    "max_depth {} must be between 1 and {}",
                    self.max_depth, hard.max_depth
                ),
            });
        }

        if self.max_string_len > hard.max_string_len {
            return Err(ExtractError::InvalidLimits {
                reason: format!(
                    "max_string_len {} exceeds hard limit {}",
                    self.max_string_len, hard.max_string_len
                ),
            });
        }

        Ok(())
    }
}

/// Reader wrapper that counts bytes handed to the parser
struct CountingReader<R> {
    inner: R,
    bytes_read: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read.set(self.bytes_read.get() + n as u64);
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Pull tokenizer for one JSON document
pub struct JsonTokenReader<R: Read> {
    // None once `finish` has consumed the parser
    parser: Option<JsonStreamReader<CountingReader<R>>>,
    limits: ReaderLimits,
    stack: Vec<Container>,
    // a field name was produced and its value is next
    value_pending: bool,
    done: bool,
    bytes_read: Rc<Cell<u64>>,
    tokens_read: u64,
}

impl<R: Read> JsonTokenReader<R> {
    /// Create a tokenizer with default limits
    pub fn new(reader: R) -> Self {
        Self::build(reader, ReaderLimits::default())
    }

    /// Create a tokenizer with explicit limits
    pub fn with_limits(reader: R, limits: ReaderLimits) -> Result<Self, ExtractError> {
        limits.validate()?;
        Ok(Self::build(reader, limits))
    }

    fn build(reader: R, limits: ReaderLimits) -> Self {
        let bytes_read = Rc::new(Cell::new(0));
        let counting = CountingReader {
            inner: reader,
            bytes_read: Rc::clone(&bytes_read),
        };
        // nesting is bounded by `limits.max_depth` below
        let settings = ReaderSettings {
            max_nesting_depth: None,
            ..ReaderSettings::default()
        };
        Self {
            parser: Some(JsonStreamReader::new_custom(counting, settings)),
            limits,
            stack: Vec::new(),
            value_pending: false,
            done: false,
            bytes_read,
            tokens_read: 0,
        }
    }

    /// Tokens produced so far
    pub fn tokens_read(&self) -> u64 {
        self.tokens_read
    }

    /// Bytes pulled from the input so far, including parser read-ahead
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.get()
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Check that a complete value was read and only whitespace follows it
    pub fn finish(&mut self) -> Result<(), TokenError> {
        if !self.done {
            return Err(syntax("document ended before the top-level value was complete"));
        }
        match self.parser.take() {
            Some(parser) => parser.consume_trailing_whitespace().map_err(convert),
            None => Ok(()),
        }
    }

    fn parser(&mut self) -> Result<&mut JsonStreamReader<CountingReader<R>>, TokenError> {
        self.parser
            .as_mut()
            .ok_or_else(|| syntax("token reader already finished"))
    }

    fn produce(&mut self) -> Result<Option<Token>, TokenError> {
        if self.done {
            return Ok(None);
        }
        let token = match self.stack.last().copied() {
            None => self.read_value()?,
            Some(_) if self.value_pending => {
                self.value_pending = false;
                self.read_value()?
            }
            Some(Container::Object) => {
                if self.parser()?.has_next().map_err(convert)? {
                    let name = self.parser()?.next_name_owned().map_err(convert)?;
                    self.check_lexeme(name.len())?;
                    self.value_pending = true;
                    Token::FieldName(name)
                } else {
                    self.parser()?.end_object().map_err(convert)?;
                    self.close();
                    Token::EndObject
                }
            }
            Some(Container::Array) => {
                if self.parser()?.has_next().map_err(convert)? {
                    self.read_value()?
                } else {
                    self.parser()?.end_array().map_err(convert)?;
                    self.close();
                    Token::EndArray
                }
            }
        };
        Ok(Some(token))
    }

    fn read_value(&mut self) -> Result<Token, TokenError> {
        let token = match self.parser()?.peek().map_err(convert)? {
            ValueType::Object => {
                self.open(Container::Object)?;
                return Ok(Token::BeginObject);
            }
            ValueType::Array => {
                self.open(Container::Array)?;
                return Ok(Token::BeginArray);
            }
            ValueType::String => {
                let text = self.parser()?.next_string().map_err(convert)?;
                self.check_lexeme(text.len())?;
                Token::String(text)
            }
            ValueType::Number => {
                let text = self.parser()?.next_number_as_string().map_err(convert)?;
                self.check_lexeme(text.len())?;
                Token::number(&text)?
            }
            ValueType::Boolean => Token::Bool(self.parser()?.next_bool().map_err(convert)?),
            ValueType::Null => {
                self.parser()?.next_null().map_err(convert)?;
                Token::Null
            }
        };
        if self.stack.is_empty() {
            self.done = true;
        }
        Ok(token)
    }

    fn open(&mut self, container: Container) -> Result<(), TokenError> {
        let depth = self.stack.len() + 1;
        if depth > self.limits.max_depth {
            return Err(TokenError::DepthLimitExceeded {
                depth,
                max_depth: self.limits.max_depth,
            });
        }
        match container {
            Container::Object => self.parser()?.begin_object().map_err(convert)?,
            Container::Array => self.parser()?.begin_array().map_err(convert)?,
        }
        self.stack.push(container);
        Ok(())
    }

    fn close(&mut self) {
        self.stack.pop();
        if self.stack.is_empty() {
            self.done = true;
        }
    }

    fn check_lexeme(&self, length: usize) -> Result<(), TokenError> {
        if length > self.limits.max_string_len {
            return Err(TokenError::LexemeTooLong {
                length,
                max_length: self.limits.max_string_len,
            });
        }
        Ok(())
    }
}

fn syntax(message: impl Into<String>) -> TokenError {
    TokenError::Syntax {
        message: message.into(),
    }
}

fn convert(err: ReaderError) -> TokenError {
    match err {
        ReaderError::IoError { error, .. } => TokenError::Io(error),
        other => syntax(other.to_string()),
    }
}

impl<R: Read> TokenSource for JsonTokenReader<R> {
    fn next_token(&mut self) -> Result<Option<Token>, TokenError> {
        let token = self.produce()?;
        if token.is_some() {
            self.tokens_read += 1;
        }
        Ok(token)
    }
}
