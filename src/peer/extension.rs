use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::PeerError;
use crate::bencode::{decode_prefix, encode, Value};

/// Extended message id reserved for the extension handshake itself.
pub const EXTENSION_HANDSHAKE_ID: u8 = 0;

/// The BEP-10 extension handshake dictionary.
///
/// `m` maps extension names to the message ids the sender wants to receive
/// them under. An id of 0 means the extension is disabled and is dropped on
/// decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionHandshake {
    pub extensions: BTreeMap<String, u8>,
    pub client: Option<String>,
    pub metadata_size: Option<u64>,
}

impl ExtensionHandshake {
    pub fn with_extensions(extensions: &[(&str, u8)]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|(name, id)| ((*name).to_string(), *id))
                .collect(),
            ..Self::default()
        }
    }

    pub fn encode(&self) -> Bytes {
        let m: BTreeMap<Bytes, Value> = self
            .extensions
            .iter()
            .map(|(name, id)| {
                (
                    Bytes::copy_from_slice(name.as_bytes()),
                    Value::Integer(i64::from(*id)),
                )
            })
            .collect();

        let mut dict = BTreeMap::new();
        dict.insert(Bytes::from_static(b"m"), Value::Dict(m));

        if let Some(ref client) = self.client {
            dict.insert(Bytes::from_static(b"v"), Value::string(client));
        }

        if let Some(size) = self.metadata_size {
            dict.insert(
                Bytes::from_static(b"metadata_size"),
                Value::Integer(size as i64),
            );
        }

        Bytes::from(encode(&Value::Dict(dict)))
    }

    /// Parses the peer's handshake dictionary. Bytes after the dictionary are
    /// ignored.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        let (value, _) = decode_prefix(data)?;
        let dict = value.as_dict().ok_or_else(|| {
            PeerError::InvalidMessage("extension handshake is not a dictionary".into())
        })?;

        let mut hs = Self::default();

        if let Some(m) = dict.get(b"m".as_slice()).and_then(Value::as_dict) {
            for (key, val) in m {
                let id = val.as_integer().and_then(|id| u8::try_from(id).ok());
                if let (Ok(name), Some(id)) = (std::str::from_utf8(key), id) {
                    if id != 0 {
                        hs.extensions.insert(name.to_string(), id);
                    }
                }
            }
        }

        hs.client = dict
            .get(b"v".as_slice())
            .and_then(Value::as_str)
            .map(String::from);

        hs.metadata_size = dict
            .get(b"metadata_size".as_slice())
            .and_then(Value::as_integer)
            .and_then(|size| u64::try_from(size).ok());

        Ok(hs)
    }

    pub fn extension_id(&self, name: &str) -> Option<u8> {
        self.extensions.get(name).copied()
    }
}
