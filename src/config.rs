use std::time::Duration;

use crate::constants::{
    CONNECT_TIMEOUT, DEFAULT_PORT, HTTP_TRACKER_TIMEOUT, MAX_MESSAGE_SIZE, MAX_METADATA_SIZE,
    PEER_ID_PREFIX, READ_TIMEOUT, WRITE_TIMEOUT,
};

/// Runtime settings for a [`Client`](crate::client::Client).
///
/// ```
/// use std::time::Duration;
/// use minibit::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_port(51413)
///     .with_read_timeout(Duration::from_secs(30));
/// assert_eq!(config.port, 51413);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Port reported to trackers.
    pub port: u16,
    /// Leading bytes of every generated peer id.
    pub peer_id_prefix: Vec<u8>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub tracker_timeout: Duration,
    /// Frames longer than this are rejected as invalid.
    pub max_message_size: usize,
    /// Metadata announced larger than this is not fetched.
    pub max_metadata_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            peer_id_prefix: PEER_ID_PREFIX.to_vec(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            tracker_timeout: HTTP_TRACKER_TIMEOUT,
            max_message_size: MAX_MESSAGE_SIZE,
            max_metadata_size: MAX_METADATA_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_peer_id_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.peer_id_prefix = prefix.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_tracker_timeout(mut self, timeout: Duration) -> Self {
        self.tracker_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_max_metadata_size(mut self, size: u64) -> Self {
        self.max_metadata_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_constants() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 6881);
        assert_eq!(config.peer_id_prefix, b"-MB0001-");
        assert_eq!(config.connect_timeout, CONNECT_TIMEOUT);
        assert_eq!(config.max_metadata_size, MAX_METADATA_SIZE);
    }

    #[test]
    fn test_setters() {
        let config = ClientConfig::default()
            .with_port(1)
            .with_peer_id_prefix(&b"-XX0000-"[..])
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(3))
            .with_tracker_timeout(Duration::from_secs(4))
            .with_max_message_size(5)
            .with_max_metadata_size(6);

        assert_eq!(config.port, 1);
        assert_eq!(config.peer_id_prefix, b"-XX0000-");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.write_timeout, Duration::from_secs(3));
        assert_eq!(config.tracker_timeout, Duration::from_secs(4));
        assert_eq!(config.max_message_size, 5);
        assert_eq!(config.max_metadata_size, 6);
    }
}
