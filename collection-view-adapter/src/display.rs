use alloc::vec::Vec;

use collection_view::{CollectionView, Group, GroupId, RowRef, TreeItemRef, ViewItem};

/// One line of the flattened tree: a group header or a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayEntry {
    pub node: TreeItemRef,
    /// 0 for the root header.
    pub depth: usize,
    pub extent: u32,
}

/// The expanded part of a [`CollectionView`] tree, flattened for list virtualization.
///
/// Entries come in render order: every group contributes its header, then (when expanded) its
/// rows or child groups. Collapsed groups contribute their header only.
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    entries: Vec<DisplayEntry>,
    // starts[i] is the offset of entries[i]; starts[len] is the total extent
    starts: Vec<u64>,
}

/// Extent of a row: its tallest item plus the border on both sides.
pub fn row_extent<T: ViewItem>(view: &CollectionView<T>, group: &Group<T>, index: usize) -> u32 {
    let options = view.options();
    let border = options.item_border_size.saturating_mul(2);
    group
        .rows()
        .get(index)
        .and_then(|row| {
            row.leaves()
                .iter()
                .map(|item| (options.item_size)(item, group.view_mode(), false))
                .max()
        })
        .map_or(0, |h| h.saturating_add(border))
}

impl DisplayList {
    /// Flattens `view`, giving every group header `header_extent`.
    pub fn build<T: ViewItem>(view: &CollectionView<T>, header_extent: u32) -> Self {
        let mut entries = Vec::new();
        Self::push_group(view, view.root(), 0, header_extent, &mut entries);

        let mut starts = Vec::with_capacity(entries.len() + 1);
        let mut off = 0u64;
        for e in &entries {
            starts.push(off);
            off = off.saturating_add(e.extent as u64);
        }
        starts.push(off);
        Self { entries, starts }
    }

    fn push_group<T: ViewItem>(
        view: &CollectionView<T>,
        id: GroupId,
        depth: usize,
        header_extent: u32,
        out: &mut Vec<DisplayEntry>,
    ) {
        let Some(group) = view.group(id) else {
            return;
        };
        out.push(DisplayEntry {
            node: TreeItemRef::Group(id),
            depth,
            extent: header_extent,
        });
        if !group.is_expanded() {
            return;
        }
        for index in 0..group.rows().len() {
            out.push(DisplayEntry {
                node: TreeItemRef::Row(RowRef { group: id, index }),
                depth: depth + 1,
                extent: row_extent(view, group, index),
            });
        }
        for &child in group.groups() {
            Self::push_group(view, child, depth + 1, header_extent, out);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DisplayEntry> {
        self.entries.get(index)
    }

    pub fn total_extent(&self) -> u64 {
        self.starts.last().copied().unwrap_or(0)
    }

    /// Start offset of the entry at `index`.
    pub fn offset_of(&self, index: usize) -> Option<u64> {
        if index >= self.entries.len() {
            return None;
        }
        self.starts.get(index).copied()
    }

    /// The entry covering `offset`. Offsets past the end map to the last entry.
    pub fn index_at_offset(&self, offset: u64) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        // first start strictly greater than `offset`, minus one
        let after = self.starts[..self.entries.len()].partition_point(|&s| s <= offset);
        Some(after.saturating_sub(1))
    }

    pub fn index_of(&self, node: TreeItemRef) -> Option<usize> {
        self.entries.iter().position(|e| e.node == node)
    }

    /// Entries overlapping `[scroll_offset, scroll_offset + viewport)`.
    pub fn visible_range(&self, scroll_offset: u64, viewport: u32) -> core::ops::Range<usize> {
        if viewport == 0 {
            return 0..0;
        }
        let Some(start) = self.index_at_offset(scroll_offset) else {
            return 0..0;
        };
        let last = scroll_offset.saturating_add(viewport as u64 - 1);
        let end = self.index_at_offset(last).map_or(start, |i| i + 1);
        start..end.max(start + 1)
    }
}
