use super::error::MetainfoError;
use super::info_hash::InfoHash;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::HashMap;

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_PREFIX: &str = "urn:btih:";

/// A parsed `magnet:` URI ([BEP-9]).
///
/// Only the parameters needed to join a swarm are kept: the info hash
/// (`xt`), the display name (`dn`) and the trackers (`tr`).
///
/// ```
/// use minibit::metainfo::MagnetLink;
///
/// let magnet = MagnetLink::parse(
///     "magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a\
///      &dn=Example&tr=http%3A%2F%2Ftracker.example.com%2Fannounce",
/// )
/// .unwrap();
///
/// assert_eq!(magnet.display_name.as_deref(), Some("Example"));
/// assert_eq!(magnet.tracker(), Some("http://tracker.example.com/announce"));
/// ```
///
/// [BEP-9]: http://bittorrent.org/beps/bep_0009.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl MagnetLink {
    pub fn parse(uri: &str) -> Result<Self, MetainfoError> {
        let query = uri.strip_prefix(MAGNET_PREFIX).ok_or_else(|| {
            MetainfoError::InvalidMagnetLink("missing magnet:? prefix".into())
        })?;

        let params = parse_query_string(query);

        let xt = params
            .get("xt")
            .and_then(|v| v.first())
            .ok_or_else(|| MetainfoError::InvalidMagnetLink("missing xt parameter".into()))?;

        let hash = xt.strip_prefix(BTIH_PREFIX).ok_or_else(|| {
            MetainfoError::InvalidMagnetLink("xt is not a urn:btih: reference".into())
        })?;

        let info_hash = match hash.len() {
            40 => InfoHash::from_hex(hash)
                .map_err(|_| MetainfoError::InvalidMagnetLink("invalid hex info hash".into()))?,
            32 => {
                let decoded = base32_decode(hash)
                    .ok_or_else(|| MetainfoError::InvalidMagnetLink("invalid base32".into()))?;
                InfoHash::from_bytes(&decoded)?
            }
            _ => {
                return Err(MetainfoError::InvalidMagnetLink(
                    "invalid info hash length".into(),
                ))
            }
        };

        let display_name = params
            .get("dn")
            .and_then(|v| v.first())
            .map(|s| unescape(s))
            .transpose()?;

        let trackers = params
            .get("tr")
            .map(|v| v.iter().map(|s| unescape(s)).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            info_hash,
            display_name,
            trackers,
        })
    }

    /// The first tracker listed, which is the one announced to.
    pub fn tracker(&self) -> Option<&str> {
        self.trackers.first().map(String::as_str)
    }

    pub fn to_uri(&self) -> String {
        let mut uri = format!("{}xt={}{}", MAGNET_PREFIX, BTIH_PREFIX, self.info_hash.to_hex());

        if let Some(ref name) = self.display_name {
            uri.push_str("&dn=");
            uri.extend(utf8_percent_encode(name, NON_ALPHANUMERIC));
        }

        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.extend(utf8_percent_encode(tracker, NON_ALPHANUMERIC));
        }

        uri
    }
}

fn parse_query_string(query: &str) -> HashMap<&str, Vec<&str>> {
    let mut params: HashMap<&str, Vec<&str>> = HashMap::new();

    for part in query.split('&') {
        if let Some((key, value)) = part.split_once('=') {
            params.entry(key).or_default().push(value);
        }
    }

    params
}

/// Percent-decodes a query value. Every `%` must introduce two hex digits and
/// the result must be UTF-8.
fn unescape(value: &str) -> Result<String, MetainfoError> {
    let well_formed = value.split('%').skip(1).all(|chunk| {
        chunk.len() >= 2 && chunk.as_bytes()[..2].iter().all(u8::is_ascii_hexdigit)
    });

    if !well_formed {
        return Err(MetainfoError::InvalidMagnetLink(format!(
            "cannot unescape {:?}",
            value
        )));
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| MetainfoError::InvalidMagnetLink(format!("{:?} is not utf-8", value)))
}

fn base32_decode(input: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

    let mut output = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for c in input.trim_end_matches('=').bytes() {
        let value = ALPHABET
            .iter()
            .position(|&x| x == c.to_ascii_uppercase())? as u64;
        buffer = (buffer << 5) | value;
        bits_in_buffer += 5;

        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            output.push((buffer >> bits_in_buffer) as u8);
            buffer &= (1 << bits_in_buffer) - 1;
        }
    }

    Some(output)
}
