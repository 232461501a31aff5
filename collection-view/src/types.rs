use alloc::vec::Vec;

slotmap::new_key_type! {
    /// A stable handle to a group in a [`crate::CollectionView`] tree.
    ///
    /// Handles of detached groups become stale; every API taking a `GroupId` treats a stale
    /// handle as a no-op.
    pub struct GroupId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViewMode {
    Content,
    Details,
    List,
    ThumbBig,
    ThumbMedium,
    ThumbSmall,
    Tiles,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Content => "Content",
            Self::Details => "Details",
            Self::List => "List",
            Self::ThumbBig => "Thumb big",
            Self::ThumbMedium => "Thumb medium",
            Self::ThumbSmall => "Thumb small",
            Self::Tiles => "Tiles",
        }
    }
}

/// How a grouping root applies its criteria.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupMode {
    /// Every criterion becomes a sibling group on one level.
    #[default]
    GroupBy,
    /// Like `GroupBy`, then nested criteria of each criterion group recursively.
    GroupByRecursive,
    /// The first criterion groups the first level, the next one the level below, etc.
    ThenBy,
    /// Like `ThenBy`, descending into nested criteria before moving to the next one.
    ThenByRecursive,
}

impl GroupMode {
    pub fn is_group_by(self) -> bool {
        matches!(self, Self::GroupBy | Self::GroupByRecursive)
    }

    pub fn is_then_by(self) -> bool {
        matches!(self, Self::ThenBy | Self::ThenByRecursive)
    }

    pub fn is_recursive(self) -> bool {
        matches!(self, Self::GroupByRecursive | Self::ThenByRecursive)
    }
}

/// A row inside a leaf group, addressed by position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowRef {
    pub group: GroupId,
    pub index: usize,
}

/// A node of the rendered tree: a group header or one of its rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TreeItemRef {
    Group(GroupId),
    Row(RowRef),
}

impl TreeItemRef {
    pub fn group(self) -> GroupId {
        match self {
            Self::Group(id) => id,
            Self::Row(row) => row.group,
        }
    }
}

/// Keyboard modifiers that accompany a selection gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionEvent<T> {
    /// The leaf group whose source the selection ranges over.
    pub group: GroupId,
    pub row: RowRef,
    pub item: T,
    pub modifiers: SelectionModifiers,
}

/// Notifications raised by a [`crate::CollectionView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent<T> {
    ItemOpened(T),
    ItemSelected(SelectionEvent<T>),
    FilterApplied,
    /// The rows of a leaf group were added, removed or refilled.
    RowsChanged(GroupId),
    /// The child groups of a group were added, removed or rebuilt.
    GroupsChanged(GroupId),
    /// `reload` replaced the whole tree.
    RootReplaced,
    ScrollToTop,
    /// The host should bring `path.last()` into view. `path` starts at the root.
    ScrollTo {
        path: Vec<TreeItemRef>,
        exactly: bool,
    },
}

/// A handle returned by [`crate::CollectionView::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// The tree patch that follows a successful external operation.
///
/// See [`crate::CollectionView::apply_external`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemMutation<T> {
    Insert(Vec<T>),
    Update(Vec<T>),
    Remove(Vec<T>),
    None,
}
