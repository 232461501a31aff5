use alloc::sync::Arc;
use core::ops::Range;
use core::sync::atomic::{AtomicU8, Ordering};

use collection_view::{CollectionView, GroupId, ListenerId, RowRef, TreeItemRef, ViewEvent, ViewItem};

use crate::{DisplayList, ScrollAnchor, apply_anchor, capture_first_visible_anchor};

const DIRTY: u8 = 1;
const SCROLL_TO_TOP: u8 = 1 << 1;
const SCROLL_TO_ANCHOR: u8 = 1 << 2;
const SCROLL_EXACTLY: u8 = 1 << 3;

/// A framework-neutral controller that wraps a [`CollectionView`] and keeps a [`DisplayList`]
/// of it in sync.
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_width` / `on_viewport_size` / `on_visibility` / `on_scroll` when UI events occur
/// - `sync()` after mutating the view through `view_mut()`
///
/// `sync()` rebuilds the display list only when the view reported changes, and returns the
/// scroll offset the UI should apply, if it changed.
pub struct Controller<T> {
    view: CollectionView<T>,
    list: DisplayList,
    listener: ListenerId,
    flags: Arc<AtomicU8>,
    header_extent: u32,
    viewport_size: u32,
    scroll_offset: u64,
    anchor: Option<ScrollAnchor>,
}

impl<T: ViewItem> Controller<T> {
    pub fn new(mut view: CollectionView<T>, header_extent: u32) -> Self {
        let flags = Arc::new(AtomicU8::new(0));
        let listener = view.subscribe({
            let flags = Arc::clone(&flags);
            move |_, event| {
                let bits = match event {
                    ViewEvent::RowsChanged(_)
                    | ViewEvent::GroupsChanged(_)
                    | ViewEvent::RootReplaced => DIRTY,
                    ViewEvent::ScrollToTop => DIRTY | SCROLL_TO_TOP,
                    ViewEvent::ScrollTo { exactly: true, .. } => {
                        DIRTY | SCROLL_TO_ANCHOR | SCROLL_EXACTLY
                    }
                    ViewEvent::ScrollTo { exactly: false, .. } => DIRTY | SCROLL_TO_ANCHOR,
                    _ => 0,
                };
                flags.fetch_or(bits, Ordering::Relaxed);
            }
        });
        let list = DisplayList::build(&view, header_extent);
        Self {
            view,
            list,
            listener,
            flags,
            header_extent,
            viewport_size: 0,
            scroll_offset: 0,
            anchor: None,
        }
    }

    pub fn view(&self) -> &CollectionView<T> {
        &self.view
    }

    /// Mutable access to the view. Call [`Controller::sync`] afterwards.
    pub fn view_mut(&mut self) -> &mut CollectionView<T> {
        &mut self.view
    }

    pub fn into_view(mut self) -> CollectionView<T> {
        self.view.unsubscribe(self.listener);
        self.view
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn viewport_size(&self) -> u32 {
        self.viewport_size
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.list
            .total_extent()
            .saturating_sub(self.viewport_size as u64)
    }

    fn clamp(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    /// Display entries overlapping the viewport.
    pub fn visible_range(&self) -> Range<usize> {
        self.list.visible_range(self.scroll_offset, self.viewport_size)
    }

    /// The host reported a new layout width for the root group.
    pub fn on_width(&mut self, width: u32) -> Option<u64> {
        let root = self.view.root();
        self.view.set_width(root, width);
        self.sync()
    }

    pub fn on_viewport_size(&mut self, viewport_size: u32) {
        self.viewport_size = viewport_size;
        self.scroll_offset = self.clamp(self.scroll_offset);
    }

    pub fn on_visibility(&mut self, visible: bool) -> Option<u64> {
        self.view.set_visible(visible);
        self.sync()
    }

    /// Call this when the UI reports a scroll offset change (e.g. user wheel/drag).
    ///
    /// Reports the first visible tree item to the view and remembers an anchor for it.
    pub fn on_scroll(&mut self, scroll_offset: u64) {
        self.scroll_offset = self.clamp(scroll_offset);
        self.anchor = capture_first_visible_anchor(&self.list, self.scroll_offset);
        if let Some(anchor) = self.anchor {
            self.view.set_top_tree_item(anchor.node);
        }
    }

    /// Expands or collapses `group` and its subtree, keeping the first visible entry in place.
    ///
    /// Collapsing does not change any rows, so the view raises no event for it.
    pub fn set_expanded(&mut self, group: GroupId, expanded: bool) -> Option<u64> {
        self.view.set_expanded(group, expanded);
        self.refresh()
    }

    /// Forces a display list rebuild, keeping the current anchor in place.
    pub fn refresh(&mut self) -> Option<u64> {
        self.flags.fetch_or(DIRTY, Ordering::Relaxed);
        self.sync()
    }

    /// Applies what the view reported since the last call.
    ///
    /// Returns the new scroll offset when it changed.
    pub fn sync(&mut self) -> Option<u64> {
        let flags = self.flags.swap(0, Ordering::Relaxed);
        if flags & DIRTY == 0 {
            return None;
        }
        self.list = DisplayList::build(&self.view, self.header_extent);

        let target = if flags & SCROLL_TO_TOP != 0 && flags & SCROLL_TO_ANCHOR == 0 {
            Some(0)
        } else if flags & SCROLL_TO_ANCHOR != 0 {
            self.view_anchor_offset(flags & SCROLL_EXACTLY != 0)
        } else {
            self.anchor.and_then(|a| apply_anchor(&self.list, &a))
        };

        let previous = self.scroll_offset;
        self.scroll_offset = self.clamp(target.unwrap_or(previous));
        self.anchor = capture_first_visible_anchor(&self.list, self.scroll_offset);
        (self.scroll_offset != previous).then_some(self.scroll_offset)
    }

    /// Offset of the view's top anchor (top item row, else top group header).
    ///
    /// When the view restores the entry this controller last reported, the captured offset
    /// within that entry is kept. Unless `exactly`, an entry that is already fully visible
    /// keeps the current offset.
    fn view_anchor_offset(&self, exactly: bool) -> Option<u64> {
        let index = self.top_anchor_index()?;
        let entry = self.list.get(index)?;
        if let Some(anchor) = self.anchor.filter(|a| a.node == entry.node) {
            return apply_anchor(&self.list, &anchor);
        }
        let start = self.list.offset_of(index)?;
        if !exactly {
            let end = start.saturating_add(entry.extent as u64);
            let viewport_end = self.scroll_offset.saturating_add(self.viewport_size as u64);
            if start >= self.scroll_offset && end <= viewport_end {
                return None;
            }
        }
        Some(start)
    }

    fn top_anchor_index(&self) -> Option<usize> {
        let group = self.view.top_group().unwrap_or(self.view.root());
        if let Some(item) = self.view.top_item() {
            let row = self.view.group(group)?.row_with_item(item);
            if let Some(index) = row {
                return self.list.index_of(TreeItemRef::Row(RowRef { group, index }));
            }
        }
        self.list.index_of(TreeItemRef::Group(group))
    }
}

impl<T> core::fmt::Debug for Controller<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("view", &self.view)
            .field("entries", &self.list.len())
            .field("viewport_size", &self.viewport_size)
            .field("scroll_offset", &self.scroll_offset)
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}
