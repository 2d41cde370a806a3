//! Label capabilities
//!
//! The recorder never compares or stores labels directly; it goes through a
//! [`LabelStore`], which decides how an external label is kept inside the
//! tree (the handle) and how it is turned back into an external value on
//! export.
//!
//! - [`ValueLabels`]: cheap value labels (addresses, enums). Identity.
//! - [`InternedLabels`]: text labels, deduplicated in a [`StringInterner`].

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::interner::{InternError, StrHandle, StringInterner};

/// Equality / save / restore capability for one label type.
pub trait LabelStore {
    /// Label as passed to `begin_scope`.
    type Label: ?Sized + fmt::Debug;

    /// Internal representation kept in tree nodes.
    type Handle: Clone + fmt::Debug;

    /// External value produced at export time. Report entries are keyed by
    /// it, so handles that restore to equal values are merged.
    type Restored<'a>: Clone + Eq + Hash + fmt::Debug
    where
        Self: 'a;

    /// Whether the stored `handle` denotes `label`.
    fn matches(&self, handle: &Self::Handle, label: &Self::Label) -> bool;

    /// Convert an external label to its internal representation.
    fn save(&mut self, label: &Self::Label) -> Result<Self::Handle, InternError>;

    /// Convert an internal handle back to its external value.
    fn restore<'a>(&'a self, handle: &Self::Handle) -> Self::Restored<'a>;
}

/// Identity store for labels that are cheap to copy and compare.
pub struct ValueLabels<L> {
    _label: PhantomData<fn() -> L>,
}

impl<L> ValueLabels<L> {
    /// Create the (stateless) store.
    pub fn new() -> Self {
        Self {
            _label: PhantomData,
        }
    }
}

impl<L> Default for ValueLabels<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Clone for ValueLabels<L> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<L> fmt::Debug for ValueLabels<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueLabels<{}>", std::any::type_name::<L>())
    }
}

impl<L> LabelStore for ValueLabels<L>
where
    L: Clone + Eq + Hash + fmt::Debug,
{
    type Label = L;
    type Handle = L;
    type Restored<'a> = L where Self: 'a;

    #[inline]
    fn matches(&self, handle: &L, label: &L) -> bool {
        handle == label
    }

    #[inline]
    fn save(&mut self, label: &L) -> Result<L, InternError> {
        Ok(label.clone())
    }

    #[inline]
    fn restore<'a>(&'a self, handle: &L) -> L {
        handle.clone()
    }
}

/// Text labels backed by a [`StringInterner`].
#[derive(Debug, Clone, Default)]
pub struct InternedLabels {
    strings: StringInterner,
}

impl InternedLabels {
    /// Store with the default arena capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose arena starts with `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: StringInterner::with_capacity(capacity),
        }
    }

    /// The underlying interner.
    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }
}

impl LabelStore for InternedLabels {
    type Label = str;
    type Handle = StrHandle;
    type Restored<'a> = &'a str;

    fn matches(&self, handle: &StrHandle, label: &str) -> bool {
        self.strings.resolve(*handle) == Some(label)
    }

    fn save(&mut self, label: &str) -> Result<StrHandle, InternError> {
        self.strings.intern(label)
    }

    fn restore<'a>(&'a self, handle: &StrHandle) -> &'a str {
        self.strings.resolve(*handle).unwrap_or_default()
    }
}
