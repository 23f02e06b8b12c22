use bytes::Bytes;
use std::collections::BTreeMap;

/// A bencode value.
///
/// Dictionaries use a `BTreeMap` keyed by raw bytes, so iteration (and
/// therefore encoding) is always in ascending key order.
///
/// # Examples
///
/// ```
/// use minibit::bencode::Value;
///
/// let length: Value = 92063i64.into();
/// let name: Value = "sample.txt".into();
///
/// assert_eq!(length.as_integer(), Some(92063));
/// assert_eq!(name.as_str(), Some("sample.txt"));
/// assert_eq!(name.as_integer(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    /// Raw bytes; not necessarily UTF-8 (`pieces` never is).
    Bytes(Bytes),
    List(Vec<Value>),
    /// A dictionary with byte string keys.
    Dict(BTreeMap<Bytes, Value>),
}

impl Value {
    /// Creates a byte string value from a UTF-8 string.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Builds a dictionary from `(key, value)` pairs.
    ///
    /// ```
    /// use minibit::bencode::{encode, Value};
    ///
    /// let value = Value::dict([("piece", Value::Integer(0)), ("msg_type", Value::Integer(0))]);
    /// assert_eq!(encode(&value), b"d8:msg_typei0e5:piecei0ee");
    /// ```
    pub fn dict<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Bytes::copy_from_slice(k.as_bytes()), v))
                .collect(),
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as a UTF-8 string.
    ///
    /// Returns `None` if the value is not a byte string or the bytes are not
    /// valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Dictionary lookup. `None` when the key is absent or `self` is not a
    /// dictionary.
    ///
    /// ```
    /// use minibit::bencode::decode;
    ///
    /// let info = decode(b"d6:lengthi42e4:name5:a.bine").unwrap();
    /// assert_eq!(info.get(b"length").and_then(|v| v.as_integer()), Some(42));
    /// assert!(info.get(b"pieces").is_none());
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }

    /// Renders the value as JSON.
    ///
    /// Byte strings become JSON strings (invalid UTF-8 is replaced), which is
    /// lossy for binary fields such as `pieces` but matches how the values are
    /// usually inspected.
    ///
    /// ```
    /// use minibit::bencode::decode;
    ///
    /// let value = decode(b"d3:fool5:helloi52eee").unwrap();
    /// assert_eq!(value.to_json().to_string(), r#"{"foo":["hello",52]}"#);
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Bytes(b) => serde_json::Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::List(l) => serde_json::Value::Array(l.iter().map(Value::to_json).collect()),
            Value::Dict(d) => serde_json::Value::Object(
                d.iter()
                    .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<Bytes, Value>> for Value {
    fn from(d: BTreeMap<Bytes, Value>) -> Self {
        Value::Dict(d)
    }
}
