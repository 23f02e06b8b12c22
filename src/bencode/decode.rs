use super::error::BencodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Containers nested deeper than this are refused.
const MAX_DEPTH: usize = 64;

/// Decodes a single bencode value that must span the whole input.
///
/// Use [`decode_prefix`] when the value is followed by other data, such as the
/// raw metadata piece appended to a `ut_metadata` data message.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    match decode_prefix(data)? {
        (value, []) => Ok(value),
        _ => Err(BencodeError::TrailingData),
    }
}

/// Decodes the first bencode value in `data` and returns it together with the
/// bytes that follow it.
///
/// # Examples
///
/// ```
/// use minibit::bencode::{decode_prefix, Value};
///
/// let (value, rest) = decode_prefix(b"i42eextra").unwrap();
/// assert_eq!(value, Value::Integer(42));
/// assert_eq!(rest, b"extra");
/// ```
pub fn decode_prefix(data: &[u8]) -> Result<(Value, &[u8]), BencodeError> {
    let mut cursor = Cursor {
        rest: data,
        depth: 0,
    };
    let value = cursor.value()?;
    Ok((value, cursor.rest))
}

/// Walks the input by shrinking `rest`; whatever is left once a value is
/// complete is the undecoded remainder.
struct Cursor<'a> {
    rest: &'a [u8],
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn value(&mut self) -> Result<Value, BencodeError> {
        match self.peek()? {
            b'i' => {
                self.advance(1);
                let digits = self.take_through(b'e')?;
                parse_integer(digits).map(Value::Integer)
            }
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            b'l' => self.container(|cursor| {
                let mut items = Vec::new();
                while !cursor.close()? {
                    items.push(cursor.value()?);
                }
                Ok(Value::List(items))
            }),
            b'd' => self.container(|cursor| {
                let mut entries = BTreeMap::new();
                while !cursor.close()? {
                    let key = match cursor.peek()? {
                        b'0'..=b'9' => cursor.byte_string()?,
                        c => return Err(BencodeError::UnexpectedChar(c as char)),
                    };
                    let value = cursor.value()?;
                    entries.insert(key, value);
                }
                Ok(Value::Dict(entries))
            }),
            c => Err(BencodeError::UnexpectedChar(c as char)),
        }
    }

    /// Consumes the opening tag and runs `body` one level deeper.
    fn container<F>(&mut self, body: F) -> Result<Value, BencodeError>
    where
        F: FnOnce(&mut Self) -> Result<Value, BencodeError>,
    {
        if self.depth == MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }
        self.advance(1);
        self.depth += 1;
        let value = body(self)?;
        self.depth -= 1;
        Ok(value)
    }

    /// `<len>:<bytes>`. The length has no sign and no leading zeros.
    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let digits = self.take_through(b':')?;
        if digits.len() > 1 && digits[0] == b'0' {
            return Err(BencodeError::InvalidStringLength);
        }
        let len = std::str::from_utf8(digits)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(BencodeError::InvalidStringLength)?;

        if len > self.rest.len() {
            return Err(BencodeError::UnexpectedEof);
        }
        let (bytes, rest) = self.rest.split_at(len);
        self.rest = rest;
        Ok(Bytes::copy_from_slice(bytes))
    }

    /// True (and consumed) if the next byte ends the current container.
    fn close(&mut self) -> Result<bool, BencodeError> {
        let end = self.peek()? == b'e';
        if end {
            self.advance(1);
        }
        Ok(end)
    }

    /// Returns the bytes before `delim` and moves past `delim`.
    fn take_through(&mut self, delim: u8) -> Result<&'a [u8], BencodeError> {
        let at = self
            .rest
            .iter()
            .position(|&b| b == delim)
            .ok_or(BencodeError::UnexpectedEof)?;
        let token = &self.rest[..at];
        self.rest = &self.rest[at + 1..];
        Ok(token)
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.rest.first().copied().ok_or(BencodeError::UnexpectedEof)
    }

    fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n..];
    }
}

fn parse_integer(digits: &[u8]) -> Result<i64, BencodeError> {
    let text = std::str::from_utf8(digits)
        .map_err(|_| BencodeError::InvalidInteger(String::from_utf8_lossy(digits).into_owned()))?;

    let magnitude = text.strip_prefix('-').unwrap_or(text);
    match magnitude.as_bytes() {
        [] => return Err(BencodeError::InvalidInteger("empty".into())),
        [b'0', _, ..] => return Err(BencodeError::InvalidInteger("leading zeros".into())),
        [b'0'] if magnitude.len() != text.len() => {
            return Err(BencodeError::InvalidInteger("negative zero".into()))
        }
        m if !m.iter().all(u8::is_ascii_digit) => {
            return Err(BencodeError::InvalidInteger(text.into()))
        }
        _ => {}
    }

    text.parse()
        .map_err(|_| BencodeError::InvalidInteger(text.into()))
}
