use collection_view::TreeItemRef;

use crate::DisplayList;

/// A scroll anchor that preserves the visual position across tree changes.
///
/// Typical use cases:
/// - items inserted or removed above the viewport
/// - groups expanded or collapsed above the viewport
/// - a re-wrap after a width change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollAnchor {
    pub node: TreeItemRef,
    /// The distance from the anchor entry's start to the viewport's scroll offset.
    pub offset_in_viewport: u64,
}

/// Captures an anchor for the first visible entry.
///
/// Returns `None` if the list is empty.
pub fn capture_first_visible_anchor(list: &DisplayList, scroll_offset: u64) -> Option<ScrollAnchor> {
    let index = list.index_at_offset(scroll_offset)?;
    let entry = list.get(index)?;
    let start = list.offset_of(index)?;
    Some(ScrollAnchor {
        node: entry.node,
        offset_in_viewport: scroll_offset.saturating_sub(start).min(entry.extent as u64),
    })
}

/// Resolves a previously captured anchor against the current list.
///
/// Returns the scroll offset that puts the anchor back in place, or `None` when its entry is
/// gone (detached group, row past the end, collapsed ancestor).
pub fn apply_anchor(list: &DisplayList, anchor: &ScrollAnchor) -> Option<u64> {
    let index = list.index_of(anchor.node)?;
    let start = list.offset_of(index)?;
    Some(start.saturating_add(anchor.offset_in_viewport))
}
