use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::error::TrackerError;
use crate::bencode::{decode, Value};

const COMPACT_PEER_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds the tracker asks us to wait between announces, if it says.
    pub interval: Option<u32>,
    pub min_interval: Option<u32>,
    pub complete: Option<u32>,
    pub incomplete: Option<u32>,
    pub peers: Vec<SocketAddr>,
    pub warning_message: Option<String>,
}

/// One 6-byte compact peer entry: IPv4 address then big-endian port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactPeer {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl CompactPeer {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; COMPACT_PEER_LEN] = bytes.try_into().ok()?;
        Some(Self {
            ip: Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            port: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.ip), self.port)
    }
}

/// Splits a compact peer string into addresses.
pub fn parse_compact_peers(data: &[u8]) -> Result<Vec<SocketAddr>, TrackerError> {
    if data.len() % COMPACT_PEER_LEN != 0 {
        return Err(TrackerError::InvalidResponse(format!(
            "compact peers length {} is not a multiple of {}",
            data.len(),
            COMPACT_PEER_LEN
        )));
    }

    Ok(data
        .chunks_exact(COMPACT_PEER_LEN)
        .filter_map(CompactPeer::from_bytes)
        .map(|p| p.to_socket_addr())
        .collect())
}

/// Parses the bencoded body of an announce reply.
pub fn parse_announce_response(body: &[u8]) -> Result<AnnounceResponse, TrackerError> {
    let value = decode(body)?;
    let dict = value
        .as_dict()
        .ok_or_else(|| TrackerError::InvalidResponse("expected dict".into()))?;

    if let Some(failure) = dict.get(b"failure reason".as_slice()) {
        let reason = failure
            .as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        return Err(TrackerError::Failure(reason));
    }

    let count = |key: &[u8]| {
        dict.get(key)
            .and_then(Value::as_integer)
            .and_then(|v| u32::try_from(v).ok())
    };

    let peers = match dict.get(b"peers".as_slice()) {
        Some(Value::Bytes(bytes)) => parse_compact_peers(bytes)?,
        Some(Value::List(list)) => list.iter().filter_map(dict_peer).collect(),
        Some(_) => return Err(TrackerError::InvalidResponse("peers has wrong type".into())),
        None => return Err(TrackerError::InvalidResponse("missing peers".into())),
    };

    Ok(AnnounceResponse {
        interval: count(b"interval"),
        min_interval: count(b"min interval"),
        complete: count(b"complete"),
        incomplete: count(b"incomplete"),
        peers,
        warning_message: dict
            .get(b"warning message".as_slice())
            .and_then(Value::as_str)
            .map(String::from),
    })
}

fn dict_peer(value: &Value) -> Option<SocketAddr> {
    let ip: IpAddr = value.get(b"ip")?.as_str()?.parse().ok()?;
    let port = u16::try_from(value.get(b"port")?.as_integer()?).ok()?;
    Some(SocketAddr::new(ip, port))
}
