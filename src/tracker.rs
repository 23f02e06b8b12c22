//! HTTP tracker announces (BEP-3, BEP-23).
//!
//! The tracker is asked for peers with a GET request carrying the info hash,
//! our peer id and transfer counters. Its reply is a bencoded dictionary whose
//! `peers` entry is either a compact string of 6-byte IPv4 entries or a list
//! of `{ip, port}` dictionaries.

mod error;
mod http;
mod response;

pub use error::TrackerError;
pub use http::{AnnounceRequest, HttpTracker};
pub use response::{parse_announce_response, parse_compact_peers, AnnounceResponse, CompactPeer};
