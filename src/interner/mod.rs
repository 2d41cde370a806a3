//! Label interner
//!
//! Distinct strings are stored once, NUL-terminated and concatenated in a
//! single growable arena:
//!
//! ```text
//! "foo\0bar\0"   foo -> offset 0, bar -> offset 4
//! ```
//!
//! A handle is the offset of the first character. Growing the arena may move
//! it, so the index only stores offsets (see [`LookupKey`]) and `&str`
//! borrowed from [`StringInterner::resolve`] cannot be held across
//! [`StringInterner::intern`]; the borrow checker enforces this.

mod key;

pub use key::LookupKey;

use std::fmt;

use hashbrown::{DefaultHashBuilder, HashTable};
use thiserror::Error;

use key::until_nul;

/// Arena size used by [`StringInterner::new`].
pub const DEFAULT_CAPACITY: usize = 2048;

/// Errors raised while interning a label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternError {
    /// The arena could not be grown.
    #[error("string store cannot grow from {capacity} to {requested} bytes")]
    StoreExhausted {
        /// Capacity before the failed growth.
        capacity: usize,
        /// Capacity that was requested.
        requested: usize,
    },

    /// Strings are NUL-terminated in the arena, so NUL cannot appear inside one.
    #[error("label {label:?} contains a NUL byte at position {position}")]
    InteriorNul {
        /// Offending label.
        label: String,
        /// Byte position of the first NUL.
        position: usize,
    },
}

/// Opaque handle to an interned string.
///
/// Valid for the lifetime of the interner that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrHandle(usize);

impl StrHandle {
    /// Byte offset of the string in its interner's arena.
    pub fn offset(self) -> usize {
        self.0
    }
}

/// Deduplicating string store.
#[derive(Clone)]
pub struct StringInterner {
    /// Concatenated NUL-terminated strings.
    data: Vec<u8>,
    /// Content -> offset; only `LookupKey::Stored` entries.
    index: HashTable<LookupKey<'static>>,
    hasher: DefaultHashBuilder,
}

impl StringInterner {
    /// Create an interner with [`DEFAULT_CAPACITY`] bytes reserved.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an interner with `capacity` bytes reserved for string data.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            index: HashTable::new(),
            hasher: DefaultHashBuilder::default(),
        }
    }

    /// Intern `text`, returning the existing handle if equal content was
    /// interned before.
    pub fn intern(&mut self, text: &str) -> Result<StrHandle, InternError> {
        let probe = LookupKey::Content(text.as_bytes());
        let hash = probe.hash_with(&self.hasher);

        if let Some(offset) = self.lookup(&probe, hash) {
            return Ok(StrHandle(offset));
        }

        if let Some(position) = text.bytes().position(|b| b == 0) {
            return Err(InternError::InteriorNul {
                label: text.to_string(),
                position,
            });
        }

        self.reserve(text.len() + 1)?;

        let offset = self.data.len();
        self.data.extend_from_slice(text.as_bytes());
        self.data.push(0);
        self.index
            .insert_unique(hash, LookupKey::Stored { offset, hash }, |key| {
                key.hash_with(&self.hasher)
            });

        Ok(StrHandle(offset))
    }

    /// Handle for `text` if it was interned, without inserting it.
    pub fn get(&self, text: &str) -> Option<StrHandle> {
        let probe = LookupKey::Content(text.as_bytes());
        let hash = probe.hash_with(&self.hasher);
        self.lookup(&probe, hash).map(StrHandle)
    }

    /// String behind `handle`.
    ///
    /// `None` only for handles this interner did not issue and that fall
    /// outside its arena.
    pub fn resolve(&self, handle: StrHandle) -> Option<&str> {
        let bytes = self.data.get(handle.0..)?;
        std::str::from_utf8(until_nul(bytes)).ok()
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes of arena in use, terminators included.
    pub fn bytes_used(&self) -> usize {
        self.data.len()
    }

    /// Bytes the arena can hold before it has to grow.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Interned strings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StrHandle, &str)> + '_ {
        let mut offset = 0;
        std::iter::from_fn(move || {
            let bytes = self.data.get(offset..).filter(|rest| !rest.is_empty())?;
            let text = until_nul(bytes);
            let handle = StrHandle(offset);
            offset += text.len() + 1;
            Some((handle, std::str::from_utf8(text).unwrap_or_default()))
        })
    }

    fn lookup(&self, probe: &LookupKey<'_>, hash: u64) -> Option<usize> {
        self.index
            .find(hash, |stored| stored.matches(probe, &self.data))
            .and_then(LookupKey::offset)
    }

    /// Make room for `additional` bytes: new capacity is
    /// max(1.5 x capacity, required).
    fn reserve(&mut self, additional: usize) -> Result<(), InternError> {
        let capacity = self.data.capacity();
        let required = self
            .data
            .len()
            .checked_add(additional)
            .ok_or(InternError::StoreExhausted {
                capacity,
                requested: usize::MAX,
            })?;
        if required <= capacity {
            return Ok(());
        }

        let grown = capacity.saturating_add(capacity / 2);
        let requested = grown.max(required);
        self.data
            .try_reserve_exact(requested - self.data.len())
            .map_err(|_| InternError::StoreExhausted {
                capacity,
                requested,
            })?;

        tracing::debug!(
            old_capacity = capacity,
            new_capacity = self.data.capacity(),
            strings = self.index.len(),
            "string store grown"
        );
        Ok(())
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("strings", &self.index.len())
            .field("bytes_used", &self.data.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_resolve() {
        let mut strings = StringInterner::with_capacity(1);

        let dog = strings.intern("dog").unwrap();
        let cat = strings.intern("cat").unwrap();
        let dog_again = strings.intern("dog").unwrap();

        assert_eq!(dog, dog_again);
        assert_ne!(dog, cat);
        assert_eq!(strings.resolve(dog), Some("dog"));
        assert_eq!(strings.resolve(cat), Some("cat"));
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn test_offsets_are_packed() {
        let mut strings = StringInterner::new();

        assert_eq!(strings.intern("foo").unwrap().offset(), 0);
        assert_eq!(strings.intern("bar").unwrap().offset(), 4);
        assert_eq!(strings.intern("").unwrap().offset(), 8);
        assert_eq!(strings.bytes_used(), 9);
    }

    #[test]
    fn test_growth_is_one_and_a_half_or_fit() {
        let mut strings = StringInterner::with_capacity(10);

        strings.intern("abcdefgh").unwrap(); // 9 bytes
        assert!(strings.capacity() >= 10);

        // 9 + 6 = 15 == max(15, 15)
        strings.intern("12345").unwrap();
        assert!(strings.capacity() >= 15);

        // far beyond 1.5x: capacity must fit the string
        let long = "x".repeat(100);
        strings.intern(&long).unwrap();
        assert!(strings.capacity() >= 116);
        assert_eq!(strings.resolve(strings.get(&long).unwrap()), Some(long.as_str()));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let mut strings = StringInterner::new();
        let err = strings.intern("a\0b").unwrap_err();

        assert!(matches!(err, InternError::InteriorNul { position: 1, .. }));
        assert!(strings.is_empty());
        assert_eq!(strings.bytes_used(), 0);
    }

    #[test]
    fn test_get_does_not_insert() {
        let mut strings = StringInterner::new();
        assert_eq!(strings.get("main"), None);

        let main = strings.intern("main").unwrap();
        assert_eq!(strings.get("main"), Some(main));
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let mut strings = StringInterner::with_capacity(0);
        for name in ["root", "func1", "func2", "func1"] {
            strings.intern(name).unwrap();
        }

        let names: Vec<&str> = strings.iter().map(|(_, text)| text).collect();
        assert_eq!(names, ["root", "func1", "func2"]);
    }

    #[test]
    fn test_foreign_handle_out_of_range() {
        let mut big = StringInterner::new();
        big.intern("some long label").unwrap();
        let foreign = big.intern("other").unwrap();

        let small = StringInterner::new();
        assert_eq!(small.resolve(foreign), None);
    }
}
