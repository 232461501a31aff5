//! A headless grouping and row-wrapping engine for selectable item collections.
//!
//! For host-side utilities (display lists, scroll anchoring, a view controller), see the
//! `collection-view-adapter` crate.
//!
//! The engine turns a flat, mutable collection into a tree of groups and display rows:
//! - grouping criteria ([`GroupByItem`]) partition items into nested groups, possibly placing
//!   an item in several sibling groups;
//! - every leaf group packs its items into rows that fit the group width;
//! - inserts, updates, removals and filter changes patch the affected groups only.
//!
//! It is UI-agnostic. A host is expected to provide:
//! - per-item extents (`item_size`) and group widths
//! - visibility changes (updates are queued while hidden)
//! - rendering, driven by [`ViewEvent`]s
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod error;
mod group;
mod group_by;
mod key;
mod options;
mod pending;
mod row;
mod state;
mod types;
mod view;

#[cfg(test)]
mod tests;

pub use error::CollectionViewError;
pub use group::Group;
pub use group_by::{GroupByArena, GroupById, GroupByItem, GroupByNode, GroupByPredicate};
pub use key::ViewItem;
pub use options::{
    CollectionViewOptions, GroupByProvider, ItemFilter, ItemSizeFn, Listener, SortCompareFn,
};
pub use row::{Row, wrap_extents};
pub use state::{GroupLayout, LayoutSnapshot, ViewSettings};
pub use types::{
    GroupId, GroupMode, ItemMutation, ListenerId, RowRef, SelectionEvent, SelectionModifiers,
    TreeItemRef, ViewEvent, ViewMode,
};
pub use view::CollectionView;
