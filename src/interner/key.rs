//! Lookup keys for the string index
//!
//! The index never holds an address into the arena: the arena relocates
//! when it grows. A key is either
//!   Content: the caller's bytes, used to probe the index
//!   Stored:  an arena offset plus the hash computed when it was inserted
//! Both sides are resolved to bytes against the arena passed in at
//! comparison time.

use std::hash::BuildHasher;

/// Key stored in (or probing) the interner index.
#[derive(Debug, Clone, Copy)]
pub enum LookupKey<'a> {
    /// External text, not yet (or not known to be) in the arena.
    Content(&'a [u8]),

    /// Text already in the arena.
    Stored {
        /// Byte offset of the first character.
        offset: usize,
        /// Hash of the content, computed once on insertion.
        hash: u64,
    },
}

impl LookupKey<'_> {
    /// Resolve the key to its content, reading stored keys through `base`.
    ///
    /// `base` must be the arena as it is *now*; a stored offset past its end
    /// resolves to the empty string.
    pub fn content<'s>(&'s self, base: &'s [u8]) -> &'s [u8] {
        match *self {
            LookupKey::Content(text) => text,
            LookupKey::Stored { offset, .. } => base.get(offset..).map_or(&[][..], until_nul),
        }
    }

    /// Content equality of two keys, either variant on either side.
    pub fn matches(&self, other: &LookupKey<'_>, base: &[u8]) -> bool {
        self.content(base) == other.content(base)
    }

    /// Hash of the content. Stored keys return their cached hash.
    pub fn hash_with<S: BuildHasher>(&self, builder: &S) -> u64 {
        match *self {
            LookupKey::Content(text) => builder.hash_one(text),
            LookupKey::Stored { hash, .. } => hash,
        }
    }

    /// Arena offset for stored keys.
    pub fn offset(&self) -> Option<usize> {
        match *self {
            LookupKey::Content(_) => None,
            LookupKey::Stored { offset, .. } => Some(offset),
        }
    }
}

/// Bytes up to (excluding) the first NUL, or the whole slice.
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}
