#[cfg(not(feature = "std"))]
use alloc::collections::BTreeSet;
#[cfg(feature = "std")]
use std::collections::HashSet;

#[cfg(feature = "std")]
pub(crate) type ItemSet<T> = HashSet<T>;
#[cfg(not(feature = "std"))]
pub(crate) type ItemSet<T> = BTreeSet<T>;

/// The capability an item handle needs to live in a [`crate::CollectionView`].
///
/// Items are compared by identity: use a cheap handle (an id, an `Rc`/`Arc` wrapper with
/// pointer equality, ...). The engine clones handles into every group that contains the item
/// but never mutates the underlying value.
#[cfg(feature = "std")]
pub trait ViewItem: Clone + core::hash::Hash + Eq {}
#[cfg(feature = "std")]
impl<T: Clone + core::hash::Hash + Eq> ViewItem for T {}

#[cfg(not(feature = "std"))]
pub trait ViewItem: Clone + Ord {}
#[cfg(not(feature = "std"))]
impl<T: Clone + Ord> ViewItem for T {}
