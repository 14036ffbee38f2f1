//! Strong type definitions for record stream ingestion.

use std::fmt;

use crate::error::CoreError;

/// Length of a SHA-384 digest in bytes.
pub const HASH_LEN: usize = 48;

/// A 48-byte SHA-384 file hash.
///
/// Used both for the hash a file declares for its predecessor and for the
/// hash computed over a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHash(pub [u8; HASH_LEN]);

impl FileHash {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Convert to lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }

    /// Whether this is the all-zero hash.
    ///
    /// Writers emit the zero hash when they have no predecessor, and the
    /// cursor treats it the same as "no hash recorded".
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The zero hash (sentinel value).
    pub const ZERO: Self = Self([0u8; HASH_LEN]);
}

impl fmt::Debug for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHash({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for FileHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LEN]> for FileHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for FileHash {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; HASH_LEN] = slice
            .try_into()
            .map_err(|_| CoreError::InvalidHashLength(slice.len()))?;
        Ok(Self(arr))
    }
}

/// Nanoseconds since the Unix epoch at which a transaction reached consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsensusTimestamp(pub i64);

impl ConsensusTimestamp {
    const NANOS_PER_SECOND: i64 = 1_000_000_000;

    /// Build from a seconds/nanos pair as carried in protocol messages.
    ///
    /// Saturates instead of overflowing for seconds beyond year 2262.
    pub fn from_parts(seconds: i64, nanos: i32) -> Self {
        let ns = seconds
            .saturating_mul(Self::NANOS_PER_SECOND)
            .saturating_add(i64::from(nanos));
        Self(ns)
    }

    /// Nanoseconds since the epoch.
    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Whole seconds since the epoch.
    pub const fn seconds(&self) -> i64 {
        self.0.div_euclid(Self::NANOS_PER_SECOND)
    }

    /// Sub-second nanoseconds.
    pub const fn subsec_nanos(&self) -> i64 {
        self.0.rem_euclid(Self::NANOS_PER_SECOND)
    }
}

impl fmt::Display for ConsensusTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds(), self.subsec_nanos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_hex_roundtrip() {
        let hash = FileHash::from_bytes([0x42; HASH_LEN]);
        let recovered = FileHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, recovered);
        assert_eq!(hash.to_hex().len(), 96);
    }

    #[test]
    fn test_file_hash_rejects_wrong_length() {
        let err = FileHash::from_hex("abcd").unwrap_err();
        assert!(matches!(err, CoreError::InvalidHashLength(2)));
        assert!(FileHash::from_hex("zz").is_err());
    }

    #[test]
    fn test_zero_hash() {
        assert!(FileHash::ZERO.is_zero());
        assert!(!FileHash::from_bytes([1; HASH_LEN]).is_zero());
    }

    #[test]
    fn test_file_hash_debug() {
        let debug = format!("{:?}", FileHash::from_bytes([0xcd; HASH_LEN]));
        assert_eq!(debug, "FileHash(cdcdcdcdcdcdcdcd...)");
    }

    #[test]
    fn test_consensus_timestamp_parts() {
        let ts = ConsensusTimestamp::from_parts(1_568_415_600, 123);
        assert_eq!(ts.as_nanos(), 1_568_415_600_000_000_123);
        assert_eq!(ts.seconds(), 1_568_415_600);
        assert_eq!(ts.subsec_nanos(), 123);
        assert_eq!(ts.to_string(), "1568415600.000000123");
    }

    #[test]
    fn test_consensus_timestamp_ordering() {
        let a = ConsensusTimestamp::from_parts(10, 999_999_999);
        let b = ConsensusTimestamp::from_parts(11, 0);
        assert!(a < b);
    }
}
