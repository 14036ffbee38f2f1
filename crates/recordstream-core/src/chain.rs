//! Hash-chain continuity checks.
//!
//! Each file declares the hash of its predecessor. That declaration must
//! match the hash computed for the last committed file, except for files
//! whose name sorts at or before a configured bypass boundary.

use crate::types::FileHash;

/// Outcome of comparing a file's declared previous hash against the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainCheck {
    /// The declaration matches the last committed hash.
    Linked,
    /// No usable prior hash; the declaration is taken as ground truth.
    Adopted,
    /// Mismatch tolerated because the file is inside the bypass window.
    Bypassed { expected: FileHash },
    /// Mismatch outside the bypass window. Fatal for the batch.
    Broken { expected: FileHash },
}

impl ChainCheck {
    /// Whether ingestion may continue.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ChainCheck::Broken { .. })
    }
}

/// Compare `declared` against the last committed hash.
///
/// `file_key` is the file's ordering key (its file name); `bypass_until` is
/// the last key for which a mismatch is tolerated. A missing or all-zero
/// `last` means the prior state is unknown.
pub fn check_link(
    last: Option<&FileHash>,
    declared: &FileHash,
    file_key: &str,
    bypass_until: Option<&str>,
) -> ChainCheck {
    let expected = match last {
        Some(hash) if !hash.is_zero() => *hash,
        _ => return ChainCheck::Adopted,
    };

    if expected == *declared {
        return ChainCheck::Linked;
    }

    match bypass_until {
        Some(boundary) if file_key <= boundary => ChainCheck::Bypassed { expected },
        _ => ChainCheck::Broken { expected },
    }
}
