//! Core type definitions for waystate.

use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction.
///
/// Transaction IDs are random (UUID v4) so that artifacts left on disk by a
/// crashed process can never be confused with those of a later transaction.
/// The display form is 32 lowercase hex characters and is embedded in the
/// names of the transaction's backups and temp files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generates a fresh transaction ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parses the display form of a transaction ID.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        Uuid::try_parse(s).ok().map(Self)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The owner of a write's artifacts.
///
/// Every backup and temp file carries its owner's tag in its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteTag {
    /// The write belongs to a transaction.
    Transaction(TransactionId),
    /// A standalone write outside any transaction.
    Solo(Uuid),
}

impl WriteTag {
    /// Prefix that marks standalone tags.
    pub const SOLO_PREFIX: &'static str = "solo-";

    /// Creates a fresh tag for a standalone write.
    #[must_use]
    pub fn solo() -> Self {
        Self::Solo(Uuid::new_v4())
    }

    /// Returns the owning transaction, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<TransactionId> {
        match self {
            Self::Transaction(id) => Some(*id),
            Self::Solo(_) => None,
        }
    }

    /// Parses the display form of a tag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.strip_prefix(Self::SOLO_PREFIX) {
            Some(rest) if rest.len() == 32 => Uuid::try_parse(rest).ok().map(Self::Solo),
            Some(_) => None,
            None => TransactionId::parse(s).map(Self::Transaction),
        }
    }
}

impl fmt::Display for WriteTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction(id) => write!(f, "{id}"),
            Self::Solo(id) => write!(f, "{}{}", Self::SOLO_PREFIX, id.simple()),
        }
    }
}
