use std::fmt;

use rand::Rng;

use crate::constants::PEER_ID_PREFIX;

/// A 20-byte peer identifier.
///
/// Generated ids follow the Azureus-style format `-MB0001-<12 random bytes>`,
/// where `MB` identifies minibit and `0001` is the version.
///
/// ```
/// use minibit::peer::PeerId;
///
/// let peer_id = PeerId::generate();
/// assert_eq!(peer_id.client_id(), Some("MB0001"));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Generates a new peer id from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generates a new peer id drawing its random suffix from `rng`.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_prefix(PEER_ID_PREFIX, rng)
    }

    /// Generates a peer id starting with `prefix` (truncated to 20 bytes),
    /// filling the rest from `rng`.
    pub fn with_prefix<R: Rng + ?Sized>(prefix: &[u8], rng: &mut R) -> Self {
        let mut id = [0u8; 20];
        let n = prefix.len().min(id.len());
        id[..n].copy_from_slice(&prefix[..n]);
        rng.fill(&mut id[n..]);
        Self(id)
    }

    /// Returns `None` if the slice is not exactly 20 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let id: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The 6-character client tag of an Azureus-style id (`-XXXXXX-`).
    pub fn client_id(&self) -> Option<&str> {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            std::str::from_utf8(&self.0[1..7]).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_id() {
            Some(client) => write!(f, "PeerId({})", client),
            None => write!(f, "PeerId({})", self.to_hex()),
        }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
