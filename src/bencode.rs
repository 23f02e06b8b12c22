//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the self-describing format used for `.torrent` files, tracker
//! responses and extension-protocol payloads.
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! Decoding is a single recursive-descent pass over a byte cursor. It accepts
//! dictionary keys in any order; encoding always emits them sorted, so
//! `decode(encode(v)) == v` for every value and `encode(decode(x))` is the
//! canonical form of `x`.
//!
//! ```
//! use minibit::bencode::{decode, encode, Value};
//!
//! let value = decode(b"d4:spam4:eggs3:cow3:mooe").unwrap();
//! assert_eq!(value.get(b"cow").and_then(Value::as_str), Some("moo"));
//!
//! // Re-encoding canonicalizes the key order.
//! assert_eq!(encode(&value), b"d3:cow3:moo4:spam4:eggse");
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_prefix};
pub use encode::{encode, encode_into};
pub use error::BencodeError;
pub use value::Value;
