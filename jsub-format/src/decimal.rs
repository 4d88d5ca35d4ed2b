//! Arbitrary-precision decimal numbers

use crate::error::TokenError;

/// Maximum significant digits kept for one number
pub const MAX_DECIMAL_DIGITS: usize = 65_536;

/// Decimal number with exact representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    /// Sign: false = non-negative, true = negative
    pub sign: bool,
    /// ASCII digits '0'..'9', MSB-first, no leading zeros
    pub digits: Vec<u8>,
    /// Base-10 exponent
    pub exponent: i32,
}

impl Decimal {
    /// Parse from JSON number text
    pub fn from_str_exact(s: &str) -> Result<Self, TokenError> {
        let text = s.trim();
        let invalid = || TokenError::InvalidNumber(text.to_string());
        if text.is_empty() {
            return Err(invalid());
        }

        let (sign, rest) = match text.strip_prefix('-') {
            Some(stripped) => (true, stripped),
            None => (false, text),
        };

        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(e_pos) => {
                let exp: i32 = rest[e_pos + 1..].parse().map_err(|_| invalid())?;
                (&rest[..e_pos], exp)
            }
            None => (rest, 0),
        };

        let (digits, decimal_places) = Self::parse_mantissa(mantissa).ok_or_else(invalid)?;
        let exponent = i32::try_from(decimal_places)
            .ok()
            .and_then(|places| exponent.checked_sub(places))
            .ok_or_else(invalid)?;

        let digits = Self::remove_leading_zeros(digits);
        if digits.len() > MAX_DECIMAL_DIGITS {
            return Err(TokenError::InvalidNumber(format!(
                "{} significant digits (max: {})",
                digits.len(),
                MAX_DECIMAL_DIGITS
            )));
        }

        if digits == [b'0'] {
            return Ok(Self::zero());
        }

        Ok(Self {
            sign,
            digits,
            exponent,
        })
    }

    fn zero() -> Self {
        Self {
            sign: false,
            digits: vec![b'0'],
            exponent: 0,
        }
    }

    /// Parse mantissa and return (digits, decimal_places)
    fn parse_mantissa(s: &str) -> Option<(Vec<u8>, usize)> {
        let mut digits = Vec::with_capacity(s.len());
        let mut decimal_places = 0;
        let mut found_dot = false;

        for byte in s.bytes() {
            match byte {
                b'0'..=b'9' => {
                    digits.push(byte);
                    if found_dot {
                        decimal_places += 1;
                    }
                }
                b'.' if !found_dot => found_dot = true,
                _ => return None,
            }
        }

        if digits.is_empty() {
            return None;
        }

        Some((digits, decimal_places))
    }

    fn remove_leading_zeros(mut digits: Vec<u8>) -> Vec<u8> {
        let first_significant = digits
            .iter()
            .position(|&d| d != b'0')
            .unwrap_or(digits.len().saturating_sub(1));
        digits.drain(..first_significant);
        if digits.is_empty() {
            digits.push(b'0');
        }
        digits
    }

    /// True if this is zero
    pub fn is_zero(&self) -> bool {
        self.digits == [b'0']
    }

    /// Same value with trailing zero digits folded into the exponent
    pub fn trimmed(&self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let keep = self
            .digits
            .iter()
            .rposition(|&d| d != b'0')
            .map_or(1, |pos| pos + 1);
        let dropped = (self.digits.len() - keep) as i32;
        Self {
            sign: self.sign,
            digits: self.digits[..keep].to_vec(),
            exponent: self.exponent.saturating_add(dropped),
        }
    }

    /// Convert to f64 if the conversion loses nothing
    pub fn to_f64_if_exact(&self) -> Option<f64> {
        let value: f64 = self.to_json_string().parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        // f64 Display prints the shortest text that parses back to the same bits
        let back = Self::from_str_exact(&value.to_string()).ok()?;
        (back.trimmed() == self.trimmed()).then_some(value)
    }

    /// Convert to JSON number text
    pub fn to_json_string(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }

        let digits = String::from_utf8_lossy(&self.digits);
        let mut result = String::with_capacity(self.digits.len() + 8);
        if self.sign {
            result.push('-');
        }

        let len = self.digits.len() as i64;
        let exponent = self.exponent as i64;
        let adjusted = exponent + len - 1;

        if (0..=6).contains(&exponent) {
            result.push_str(&digits);
            result.extend(std::iter::repeat('0').take(exponent as usize));
        } else if exponent < 0 && adjusted >= -7 {
            let frac_len = (-exponent) as usize;
            if frac_len < self.digits.len() {
                let (int_part, frac_part) = digits.split_at(self.digits.len() - frac_len);
                result.push_str(int_part);
                result.push('.');
                result.push_str(frac_part);
            } else {
                result.push_str("0.");
                result.extend(std::iter::repeat('0').take(frac_len - self.digits.len()));
                result.push_str(&digits);
            }
        } else {
            let (lead, rest) = digits.split_at(1);
            result.push_str(lead);
            if !rest.is_empty() {
                result.push('.');
                result.push_str(rest);
            }
            result.push('e');
            result.push_str(&adjusted.to_string());
        }

        result
    }
}
