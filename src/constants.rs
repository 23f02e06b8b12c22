//! Protocol constants and default tuning parameters.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client prefix for peer id generation (Azureus-style).
pub const PEER_ID_PREFIX: &[u8] = b"-MB0001-";

/// User agent string for tracker requests.
pub const USER_AGENT: &str = concat!("minibit/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Ports
// ============================================================================

/// Port reported to trackers.
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Block and piece sizes
// ============================================================================

/// Size of a requested block (16 KiB). Only the last block of a piece may be
/// shorter.
pub const BLOCK_SIZE: u32 = 16384;

/// Metadata piece size (BEP-9).
pub const METADATA_PIECE_SIZE: usize = 16384;

/// Largest frame accepted from a peer (2 MiB). A piece message for one block
/// is 13 bytes of header plus the block.
pub const MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Largest info dictionary fetched over `ut_metadata` (8 MiB).
pub const MAX_METADATA_SIZE: u64 = 8 * 1024 * 1024;

// ============================================================================
// Extension protocol
// ============================================================================

/// Name of the metadata exchange extension in the `m` dictionary.
pub const UT_METADATA: &str = "ut_metadata";

/// Extended message id we ask peers to use for `ut_metadata` messages.
pub const LOCAL_UT_METADATA_ID: u8 = 1;

// ============================================================================
// Timeouts
// ============================================================================

/// TCP connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Peer read timeout. Peers send a keep-alive every two minutes.
pub const READ_TIMEOUT: Duration = Duration::from_secs(180);

/// Peer write timeout.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP tracker request timeout.
pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);
