use alloc::string::String;
use alloc::vec::Vec;

use crate::ViewMode;

/// The plain, persistable part of [`crate::CollectionViewOptions`].
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewSettings {
    pub icon: String,
    pub name: String,
    pub view_modes: Vec<ViewMode>,
    pub item_border_size: u32,
    pub group_content_offset: u32,
    pub add_in_order: bool,
    pub can_open: bool,
    pub can_select: bool,
    pub is_multi_select: bool,
}

/// One group of a [`LayoutSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupLayout<T> {
    pub label: String,
    /// 0 for the root.
    pub depth: usize,
    pub source: Vec<T>,
    /// Number of items per row; empty for groups holding child groups.
    pub rows: Vec<usize>,
    pub is_expanded: bool,
}

/// An identity-free description of a group tree, in depth-first order.
///
/// Two trees with equal snapshots have the same groups, membership and row partitioning, even
/// when their group handles differ (e.g. after a rebuild).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutSnapshot<T> {
    pub groups: Vec<GroupLayout<T>>,
}

impl<T> LayoutSnapshot<T> {
    pub fn leaves(&self) -> impl Iterator<Item = &GroupLayout<T>> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(i, g)| {
                self.groups
                    .get(i + 1)
                    .is_none_or(|next| next.depth <= g.depth)
            })
            .map(|(_, g)| g)
    }
}
