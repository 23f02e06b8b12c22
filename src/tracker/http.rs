use std::time::Duration;

use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use tracing::debug;

use super::error::TrackerError;
use super::response::{parse_announce_response, AnnounceResponse};
use crate::constants::{HTTP_TRACKER_TIMEOUT, USER_AGENT};
use crate::metainfo::InfoHash;
use crate::peer::PeerId;

/// Bytes left unescaped in query values: the RFC 3986 unreserved set.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Parameters of one announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
}

impl AnnounceRequest {
    /// Appends the query string to `announce_url`. Compact peer lists are
    /// always requested.
    pub fn to_url(&self, announce_url: &str) -> String {
        let separator = if announce_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            announce_url,
            separator,
            percent_encode(self.info_hash.as_bytes(), QUERY_VALUE),
            percent_encode(self.peer_id.as_bytes(), QUERY_VALUE),
            self.port,
            self.uploaded,
            self.downloaded,
            self.left
        )
    }
}

pub struct HttpTracker {
    client: Client,
    url: String,
}

impl HttpTracker {
    pub fn new(url: &str) -> Result<Self, TrackerError> {
        Self::with_timeout(url, HTTP_TRACKER_TIMEOUT)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TrackerError::InvalidUrl(url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TrackerError::Http)?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn announce(
        &self,
        info_hash: &InfoHash,
        peer_id: &PeerId,
        port: u16,
        uploaded: u64,
        downloaded: u64,
        left: u64,
    ) -> Result<AnnounceResponse, TrackerError> {
        let request = AnnounceRequest {
            info_hash: *info_hash,
            peer_id: *peer_id,
            port,
            uploaded,
            downloaded,
            left,
        };
        self.send(&request).await
    }

    pub async fn send(&self, request: &AnnounceRequest) -> Result<AnnounceResponse, TrackerError> {
        debug!(tracker = %self.url, info_hash = %request.info_hash, left = request.left, "announcing");

        let response = self
            .client
            .get(request.to_url(&self.url))
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        let parsed = parse_announce_response(&body)?;
        debug!(peers = parsed.peers.len(), interval = ?parsed.interval, "tracker replied");
        Ok(parsed)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
