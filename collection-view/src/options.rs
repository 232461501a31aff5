use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::view::CollectionView;
use crate::{GroupByItem, ViewEvent, ViewMode, ViewSettings};

/// The host's per-item extent: `(item, view_mode, want_width)`.
///
/// Must be deterministic for a given `(item, view_mode)`. With `want_width = true` it returns
/// the extent along the packing axis.
pub type ItemSizeFn<T> = Arc<dyn Fn(&T, ViewMode, bool) -> u32 + Send + Sync>;

/// Orders items inside a group (`add_in_order` insertion and `sort`).
pub type SortCompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Produces the grouping criteria that apply to a set of items.
///
/// Called when updated items are regrouped, so criteria derived from item data (tags, folders,
/// dates) can pick up values they did not know about yet.
pub type GroupByProvider<T> = Arc<dyn Fn(&[T]) -> Vec<GroupByItem<T>> + Send + Sync>;

/// Narrows the items shown by a view.
pub type ItemFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A view observer. Invoked synchronously, after the mutation that raised the event.
pub type Listener<T> = Arc<dyn Fn(&CollectionView<T>, &ViewEvent<T>) + Send + Sync>;

/// Configuration for [`crate::CollectionView`].
///
/// This type is cheap to clone: closures are stored in `Arc`s so a host can tweak a few fields
/// and call `CollectionView::set_options` without rebuilding them.
pub struct CollectionViewOptions<T> {
    pub icon: String,
    /// Label of the root group.
    pub name: String,
    /// Available view modes; the first one is used for new trees. Must not be empty.
    pub view_modes: Vec<ViewMode>,
    pub item_size: ItemSizeFn<T>,
    pub sort_compare: SortCompareFn<T>,
    pub group_by_items: Option<GroupByProvider<T>>,
    /// Added on both sides of every item when packing rows.
    pub item_border_size: u32,
    /// How much narrower a nested group is than its parent.
    pub group_content_offset: u32,
    /// Insert new items at their sorted position instead of appending them.
    pub add_in_order: bool,
    pub can_open: bool,
    pub can_select: bool,
    pub is_multi_select: bool,
}

impl<T> Clone for CollectionViewOptions<T> {
    fn clone(&self) -> Self {
        Self {
            icon: self.icon.clone(),
            name: self.name.clone(),
            view_modes: self.view_modes.clone(),
            item_size: Arc::clone(&self.item_size),
            sort_compare: Arc::clone(&self.sort_compare),
            group_by_items: self.group_by_items.clone(),
            item_border_size: self.item_border_size,
            group_content_offset: self.group_content_offset,
            add_in_order: self.add_in_order,
            can_open: self.can_open,
            can_select: self.can_select,
            is_multi_select: self.is_multi_select,
        }
    }
}

impl<T> CollectionViewOptions<T> {
    /// Creates options with a single `ThumbBig` view mode.
    ///
    /// `item_size(item, view_mode, want_width)` reports the item extent in pixels (or cells);
    /// `sort_compare` orders items within a group.
    pub fn new(
        item_size: impl Fn(&T, ViewMode, bool) -> u32 + Send + Sync + 'static,
        sort_compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self {
            icon: String::new(),
            name: String::new(),
            view_modes: alloc::vec![ViewMode::ThumbBig],
            item_size: Arc::new(item_size),
            sort_compare: Arc::new(sort_compare),
            group_by_items: None,
            item_border_size: 0,
            group_content_offset: 0,
            add_in_order: true,
            can_open: true,
            can_select: true,
            is_multi_select: true,
        }
    }

    pub fn with_label(mut self, icon: impl Into<String>, name: impl Into<String>) -> Self {
        self.icon = icon.into();
        self.name = name.into();
        self
    }

    pub fn with_view_modes(mut self, view_modes: impl Into<Vec<ViewMode>>) -> Self {
        self.view_modes = view_modes.into();
        self
    }

    pub fn with_group_by_items(
        mut self,
        provider: Option<impl Fn(&[T]) -> Vec<GroupByItem<T>> + Send + Sync + 'static>,
    ) -> Self {
        self.group_by_items = provider.map(|f| Arc::new(f) as _);
        self
    }

    pub fn with_item_border_size(mut self, item_border_size: u32) -> Self {
        self.item_border_size = item_border_size;
        self
    }

    pub fn with_group_content_offset(mut self, group_content_offset: u32) -> Self {
        self.group_content_offset = group_content_offset;
        self
    }

    pub fn with_add_in_order(mut self, add_in_order: bool) -> Self {
        self.add_in_order = add_in_order;
        self
    }

    pub fn with_can_open(mut self, can_open: bool) -> Self {
        self.can_open = can_open;
        self
    }

    pub fn with_can_select(mut self, can_select: bool) -> Self {
        self.can_select = can_select;
        self
    }

    pub fn with_multi_select(mut self, is_multi_select: bool) -> Self {
        self.is_multi_select = is_multi_select;
        self
    }

    /// Returns the persistable part of the options.
    pub fn settings(&self) -> ViewSettings {
        ViewSettings {
            icon: self.icon.clone(),
            name: self.name.clone(),
            view_modes: self.view_modes.clone(),
            item_border_size: self.item_border_size,
            group_content_offset: self.group_content_offset,
            add_in_order: self.add_in_order,
            can_open: self.can_open,
            can_select: self.can_select,
            is_multi_select: self.is_multi_select,
        }
    }

    /// Applies previously captured settings, keeping the closures.
    pub fn with_settings(mut self, settings: ViewSettings) -> Self {
        self.icon = settings.icon;
        self.name = settings.name;
        self.view_modes = settings.view_modes;
        self.item_border_size = settings.item_border_size;
        self.group_content_offset = settings.group_content_offset;
        self.add_in_order = settings.add_in_order;
        self.can_open = settings.can_open;
        self.can_select = settings.can_select;
        self.is_multi_select = settings.is_multi_select;
        self
    }
}

impl<T> core::fmt::Debug for CollectionViewOptions<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CollectionViewOptions")
            .field("icon", &self.icon)
            .field("name", &self.name)
            .field("view_modes", &self.view_modes)
            .field("item_border_size", &self.item_border_size)
            .field("group_content_offset", &self.group_content_offset)
            .field("add_in_order", &self.add_in_order)
            .field("can_open", &self.can_open)
            .field("can_select", &self.can_select)
            .field("is_multi_select", &self.is_multi_select)
            .finish_non_exhaustive()
    }
}
