use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use rand::Rng;

use crate::group::{GroupTree, TreeChange, TreeContext};
use crate::key::ItemSet;
use crate::pending::PendingQueue;
use crate::{
    CollectionViewError, CollectionViewOptions, Group, GroupByItem, GroupById, GroupByNode,
    GroupId, GroupLayout, GroupMode, ItemFilter, ItemMutation, LayoutSnapshot, Listener,
    ListenerId, Row, RowRef, SelectionEvent, SelectionModifiers, TreeItemRef, ViewEvent,
    ViewItem, ViewMode,
};

fn context<T>(options: &CollectionViewOptions<T>) -> TreeContext<T> {
    TreeContext {
        item_size: Arc::clone(&options.item_size),
        sort_compare: Arc::clone(&options.sort_compare),
        item_border_size: options.item_border_size,
        group_content_offset: options.group_content_offset,
        add_in_order: options.add_in_order,
    }
}

/// A grouped, row-wrapped view over a flat collection of items.
///
/// The view owns a tree of [`Group`]s. Grouping criteria partition the items into nested
/// groups; every leaf group packs its items into [`Row`]s that fit the group width.
/// Insertions, updates and removals patch the affected groups only.
///
/// The view is headless:
/// - The host reports widths (`set_width`), visibility (`set_visible`) and the first visible
///   tree item (`set_top_tree_item`).
/// - The host renders from `group`/`root` and listens for [`ViewEvent`]s.
///
/// While hidden, updates and removals are queued and applied once the view becomes visible.
pub struct CollectionView<T> {
    options: CollectionViewOptions<T>,
    tree: GroupTree<T>,
    grouping_roots: Vec<GroupId>,

    pending_remove: PendingQueue<T>,
    pending_update: PendingQueue<T>,
    is_visible: bool,

    filter: Option<ItemFilter<T>>,
    unfiltered_source: Option<Vec<T>>,
    filter_is_changing: bool,
    is_refilter_pending: bool,

    top_item: Option<T>,
    top_group: Option<GroupId>,
    last_selected_item: Option<T>,
    last_selected_row: Option<RowRef>,

    listeners: Vec<(ListenerId, Listener<T>)>,
    next_listener_id: u64,
    notify_depth: usize,
    notify_pending: Vec<ViewEvent<T>>,
}

impl<T: ViewItem> CollectionView<T> {
    /// Creates an empty, hidden view.
    ///
    /// Fails when `options.view_modes` is empty.
    pub fn new(options: CollectionViewOptions<T>) -> Result<Self, CollectionViewError> {
        let Some(&view_mode) = options.view_modes.first() else {
            return Err(CollectionViewError::NoViewModes);
        };
        cvdebug!(
            view_modes = options.view_modes.len(),
            add_in_order = options.add_in_order,
            "CollectionView::new"
        );
        let tree = GroupTree::new(context(&options), Vec::new(), view_mode);
        let root = tree.root();
        Ok(Self {
            options,
            tree,
            grouping_roots: alloc::vec![root],
            pending_remove: PendingQueue::default(),
            pending_update: PendingQueue::default(),
            is_visible: false,
            filter: None,
            unfiltered_source: None,
            filter_is_changing: false,
            is_refilter_pending: false,
            top_item: None,
            top_group: None,
            last_selected_item: None,
            last_selected_row: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            notify_depth: 0,
            notify_pending: Vec::new(),
        })
    }

    pub fn options(&self) -> &CollectionViewOptions<T> {
        &self.options
    }

    /// Replaces the options and re-lays out the tree with the new sizes and offsets.
    pub fn set_options(
        &mut self,
        options: CollectionViewOptions<T>,
    ) -> Result<(), CollectionViewError> {
        if options.view_modes.is_empty() {
            return Err(CollectionViewError::NoViewModes);
        }
        self.options = options;
        cvtrace!(
            item_border_size = self.options.item_border_size,
            group_content_offset = self.options.group_content_offset,
            "CollectionView::set_options"
        );
        self.batch_update(|v| {
            v.tree.set_context(context(&v.options));
            let root = v.tree.root();
            v.tree.relayout(root);
        });
        Ok(())
    }

    /// Clones the current options, applies `f`, then delegates to `set_options`.
    pub fn update_options(
        &mut self,
        f: impl FnOnce(&mut CollectionViewOptions<T>),
    ) -> Result<(), CollectionViewError> {
        let mut next = self.options.clone();
        f(&mut next);
        self.set_options(next)
    }

    /// The configured view modes, sorted by label.
    pub fn view_modes(&self) -> Vec<ViewMode> {
        let mut modes = self.options.view_modes.clone();
        modes.sort_by_key(|m| m.label());
        modes
    }

    pub fn has_more_than_one_view_mode(&self) -> bool {
        self.options.view_modes.len() > 1
    }

    pub fn root(&self) -> GroupId {
        self.tree.root()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group<T>> {
        self.tree.get(id)
    }

    pub fn contains_group(&self, id: GroupId) -> bool {
        self.tree.contains(id)
    }

    pub fn group_count(&self) -> usize {
        self.tree.len()
    }

    /// The label shown in a group header. The root uses `options.name`.
    pub fn group_label(&self, id: GroupId) -> &str {
        if id == self.tree.root() {
            return &self.options.name;
        }
        self.tree.label(id)
    }

    pub fn group_icon(&self, id: GroupId) -> Option<&str> {
        if id == self.tree.root() {
            return Some(self.options.icon.as_str()).filter(|icon| !icon.is_empty());
        }
        let criterion = self.tree.get(id)?.grouped_by()?;
        self.tree.criteria.get(criterion)?.icon()
    }

    pub fn group_by_item(&self, id: GroupById) -> Option<&GroupByNode<T>> {
        self.tree.criteria.get(id)
    }

    /// The criteria a grouping dialog would offer for `group`, from `options.group_by_items`.
    pub fn group_by_choices(&self, group: GroupId) -> Vec<GroupByItem<T>> {
        match (&self.options.group_by_items, self.tree.get(group)) {
            (Some(provider), Some(g)) => provider(g.source()),
            _ => Vec::new(),
        }
    }

    /// Whether `group` and all its ancestors are expanded.
    pub fn is_fully_expanded(&self, group: GroupId) -> bool {
        self.tree.is_fully_expanded(group)
    }

    /// Leaf groups below `group`, in depth-first order.
    pub fn leaf_groups(&self, group: GroupId) -> Vec<GroupId> {
        self.tree.leaves(group)
    }

    fn root_source(&self) -> &[T] {
        self.tree
            .get(self.tree.root())
            .map(|g| g.source())
            .unwrap_or(&[])
    }

    /// Rebuilds the whole tree from `source`.
    ///
    /// The active filter applies to `source`. Group handles of the previous tree become stale.
    pub fn reload(
        &mut self,
        source: Vec<T>,
        group_mode: GroupMode,
        group_by_items: &[GroupByItem<T>],
        expand_all: bool,
        remove_empty: bool,
    ) {
        cvdebug!(
            source = source.len(),
            criteria = group_by_items.len(),
            ?group_mode,
            "CollectionView::reload"
        );
        self.batch_update(|v| {
            let mut source = source;
            if let Some(filter) = v.filter.clone() {
                v.unfiltered_source = Some(source.clone());
                source.retain(|x| filter(x));
            }

            let width = v.group(v.root()).map_or(0, |g| g.width());
            let view_mode = v.options.view_modes.first().copied().unwrap_or(ViewMode::ThumbBig);
            v.tree.reset(source, view_mode);
            let root = v.tree.root();
            let criteria = v.tree.criteria.intern_all(group_by_items);
            v.tree.configure(
                root,
                Some(criteria),
                group_mode.is_group_by(),
                group_mode.is_then_by(),
                group_mode.is_recursive(),
            );
            v.tree.set_width(root, width);

            v.top_item = None;
            v.top_group = None;
            v.clear_last_selected();
            v.grouping_roots = alloc::vec![root];
            v.emit(ViewEvent::ScrollToTop);

            v.tree.group_it(root);
            v.tree.set_expanded(root, true);
            if remove_empty {
                let mut to_rewrap = Vec::new();
                v.tree.remove_empty_groups(root, &mut to_rewrap);
            }
            if expand_all {
                v.tree.set_expanded_recursive(root, true);
            }
            v.tree.rewrap_all(root);

            // the whole tree is new; per-group changes are covered by RootReplaced
            v.tree.take_changes();
            v.tree.take_detached();
            v.emit(ViewEvent::RootReplaced);
        });
    }

    pub fn insert(&mut self, items: &[T]) {
        self.batch_update(|v| v.regroup_items(items, false, false));
    }

    /// Re-evaluates items already in the view against the current criteria and filter.
    pub fn update(&mut self, items: &[T]) {
        self.batch_update(|v| v.regroup_items(items, false, true));
    }

    pub fn remove(&mut self, items: &[T]) {
        self.batch_update(|v| v.regroup_items(items, true, true));
    }

    /// Runs a fallible external operation and patches the tree with its outcome.
    ///
    /// On `Err` the tree is left untouched and the error is returned.
    pub fn apply_external<E>(
        &mut self,
        op: impl FnOnce() -> Result<ItemMutation<T>, E>,
    ) -> Result<(), E> {
        match op() {
            Ok(ItemMutation::Insert(items)) => self.insert(&items),
            Ok(ItemMutation::Update(items)) => self.update(&items),
            Ok(ItemMutation::Remove(items)) => self.remove(&items),
            Ok(ItemMutation::None) => {}
            Err(err) => {
                cvwarn!("external item operation failed, tree left unchanged");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    /// Shows or hides the view. Becoming visible flushes the pending queues and restores the
    /// top anchor.
    pub fn set_visible(&mut self, visible: bool) {
        if self.is_visible == visible {
            return;
        }
        self.is_visible = visible;
        cvdebug!(visible, pending = self.pending_count(), "CollectionView::set_visible");
        if !visible {
            return;
        }
        self.batch_update(|v| {
            v.regroup_pending_items();
            if core::mem::take(&mut v.is_refilter_pending) {
                v.refilter_now();
            }
            let item = v.top_item.clone();
            v.scroll_to(v.top_group, item.as_ref(), true);
        });
    }

    /// Number of queued removals and updates.
    pub fn pending_count(&self) -> usize {
        self.pending_remove.len() + self.pending_update.len()
    }

    /// Applies queued removals, then queued updates that were not removed.
    pub fn regroup_pending_items(&mut self) {
        let removed = self.pending_remove.take();
        let gone: ItemSet<T> = removed.iter().cloned().collect();
        let updated: Vec<T> = self
            .pending_update
            .take()
            .into_iter()
            .filter(|x| !gone.contains(x))
            .collect();
        if removed.is_empty() && updated.is_empty() {
            return;
        }
        cvdebug!(
            removed = removed.len(),
            updated = updated.len(),
            "regroup pending items"
        );
        self.batch_update(|v| {
            v.regroup_items(&removed, true, false);
            v.regroup_items(&updated, false, false);
        });
    }

    fn regroup_items(&mut self, items: &[T], remove: bool, if_contains: bool) {
        if items.is_empty() {
            return;
        }
        if !self.is_visible && remove {
            for item in items {
                self.pending_remove.push(item.clone());
            }
            return;
        }

        let items: Vec<T> = if if_contains {
            let wanted: ItemSet<T> = items.iter().cloned().collect();
            self.unfiltered_items()
                .iter()
                .filter(|x| wanted.contains(*x))
                .cloned()
                .collect()
        } else {
            items.to_vec()
        };
        if items.is_empty() {
            return;
        }

        if !self.is_visible {
            for item in items {
                self.pending_remove.remove(&item);
                self.pending_update.push(item);
            }
            return;
        }

        cvtrace!(count = items.len(), remove, "regroup items");
        if !self.filter_is_changing {
            self.update_unfiltered_source(&items, remove);
        }

        let root = self.tree.root();
        let mut to_rewrap = Vec::new();
        if remove {
            self.move_top_item_off(&items);
            for item in &items {
                self.tree.remove_item(root, item, &mut to_rewrap);
            }
        } else {
            self.refresh_criteria(&items);
            let shown: Vec<T> = match &self.filter {
                Some(filter) => items.into_iter().filter(|x| filter(x)).collect(),
                None => items,
            };
            for item in &shown {
                self.tree.insert_item(root, item, &mut to_rewrap);
            }
        }

        self.clear_last_selected();
        self.remove_empty_groups(root, to_rewrap);
    }

    fn update_unfiltered_source(&mut self, items: &[T], remove: bool) {
        let Some(unfiltered) = self.unfiltered_source.as_mut() else {
            return;
        };
        if remove {
            let gone: ItemSet<T> = items.iter().cloned().collect();
            unfiltered.retain(|x| !gone.contains(x));
            return;
        }

        let mut present: ItemSet<T> = unfiltered.iter().cloned().collect();
        let cmp = Arc::clone(&self.options.sort_compare);
        for item in items {
            if !present.insert(item.clone()) {
                continue;
            }
            if self.options.add_in_order {
                let at = unfiltered
                    .iter()
                    .position(|x| cmp(x, item) == core::cmp::Ordering::Greater)
                    .unwrap_or(unfiltered.len());
                unfiltered.insert(at, item.clone());
            } else {
                unfiltered.push(item.clone());
            }
        }
    }

    /// Moves the top anchor to the nearest surviving neighbor when it is about to be removed.
    fn move_top_item_off(&mut self, removed: &[T]) {
        let Some(top) = self.top_item.as_ref() else {
            return;
        };
        let gone: ItemSet<T> = removed.iter().cloned().collect();
        if !gone.contains(top) {
            return;
        }
        let group = self.top_group.unwrap_or(self.tree.root());
        let source = self.tree.get(group).map(|g| g.source()).unwrap_or(&[]);
        let next = source.iter().position(|x| x == top).and_then(|pos| {
            source[pos + 1..]
                .iter()
                .find(|x| !gone.contains(*x))
                .or_else(|| source[..pos].iter().rev().find(|x| !gone.contains(*x)))
        });
        self.top_item = next.cloned();
    }

    fn refresh_criteria(&mut self, items: &[T]) {
        let Some(provider) = self.options.group_by_items.clone() else {
            return;
        };
        let fresh = provider(items);
        if fresh.is_empty() {
            return;
        }
        let ids: Vec<GroupById> = self
            .grouping_roots
            .iter()
            .filter_map(|&g| self.tree.get(g))
            .filter_map(|g| g.group_by_items())
            .flatten()
            .copied()
            .collect();
        for id in ids {
            self.tree.criteria.update(id, &fresh);
        }
    }

    /// Prunes empty groups below `group` and re-wraps the groups that lost children.
    fn remove_empty_groups(&mut self, group: GroupId, mut to_rewrap: Vec<GroupId>) {
        self.tree.remove_empty_groups(group, &mut to_rewrap);
        self.sync_detached();
        if to_rewrap.is_empty() {
            return;
        }

        let mut restore_scroll = false;
        for id in to_rewrap {
            self.tree.rewrap(id);
            restore_scroll |= self.tree.is_fully_expanded(id);
        }
        if restore_scroll {
            let item = self.top_item.clone();
            self.scroll_to(self.top_group, item.as_ref(), true);
        }
    }

    /// Re-anchors state that pointed into groups detached since the last call.
    fn sync_detached(&mut self) {
        let detached = self.tree.take_detached();
        if detached.is_empty() {
            return;
        }

        if let Some(top) = self.top_group.filter(|&g| !self.tree.contains(g)) {
            let mut cur = Some(top);
            while let Some(g) = cur.filter(|&g| !self.tree.contains(g)) {
                cur = detached
                    .iter()
                    .find(|&&(id, _)| id == g)
                    .and_then(|&(_, parent)| parent);
            }
            cvtrace!("top group detached, anchoring to its nearest surviving ancestor");
            self.top_group = cur;
            self.top_item = None;
        }
        if self
            .last_selected_row
            .is_some_and(|row| !self.tree.contains(row.group))
        {
            self.clear_last_selected();
        }
        let tree = &self.tree;
        self.grouping_roots.retain(|&g| tree.contains(g));
    }

    pub fn filter(&self) -> Option<&ItemFilter<T>> {
        self.filter.as_ref()
    }

    /// Sets or clears the filter.
    ///
    /// Setting a filter snapshots the full source (an existing snapshot is kept when one filter
    /// replaces another); clearing it brings back every item the filter excluded.
    pub fn set_filter(&mut self, filter: Option<ItemFilter<T>>) {
        cvdebug!(enabled = filter.is_some(), "CollectionView::set_filter");
        self.batch_update(|v| match filter {
            Some(filter) => {
                if v.unfiltered_source.is_none() {
                    v.unfiltered_source = Some(v.root_source().to_vec());
                }
                v.filter = Some(filter);
                v.refilter_now();
            }
            None => {
                v.filter = None;
                v.is_refilter_pending = false;
                let Some(unfiltered) = v.unfiltered_source.take() else {
                    return;
                };
                let shown: ItemSet<T> = v.root_source().iter().cloned().collect();
                let missing: Vec<T> = unfiltered
                    .into_iter()
                    .filter(|x| !shown.contains(x))
                    .collect();
                v.regroup_items(&missing, false, false);
                v.emit(ViewEvent::FilterApplied);
            }
        });
    }

    /// Re-applies the current filter after its criteria changed.
    pub fn refilter(&mut self) {
        self.batch_update(|v| v.refilter_now());
    }

    fn refilter_now(&mut self) {
        if !self.is_visible {
            self.is_refilter_pending = self.filter.is_some();
            return;
        }
        let (Some(filter), Some(unfiltered)) =
            (self.filter.clone(), self.unfiltered_source.as_ref())
        else {
            return;
        };

        let kept: Vec<T> = unfiltered.iter().filter(|x| filter(*x)).cloned().collect();
        let kept_set: ItemSet<T> = kept.iter().cloned().collect();
        let shown: ItemSet<T> = self.root_source().iter().cloned().collect();
        let to_insert: Vec<T> = kept.into_iter().filter(|x| !shown.contains(x)).collect();
        let to_remove: Vec<T> = self
            .root_source()
            .iter()
            .filter(|x| !kept_set.contains(*x))
            .cloned()
            .collect();
        cvdebug!(
            insert = to_insert.len(),
            remove = to_remove.len(),
            "refilter"
        );

        self.filter_is_changing = true;
        self.regroup_items(&to_insert, false, false);
        self.regroup_items(&to_remove, true, false);
        self.filter_is_changing = false;
        self.emit(ViewEvent::FilterApplied);
    }

    /// Every item of the view, ignoring the filter.
    pub fn unfiltered_items(&self) -> &[T] {
        match &self.unfiltered_source {
            Some(items) => items,
            None => self.root_source(),
        }
    }

    pub fn top_item(&self) -> Option<&T> {
        self.top_item.as_ref()
    }

    pub fn top_group(&self) -> Option<GroupId> {
        self.top_group
    }

    /// Records the first visible tree item reported by the host.
    ///
    /// A group sets the top group; a row sets its group and its first item.
    pub fn set_top_tree_item(&mut self, node: TreeItemRef) {
        match node {
            TreeItemRef::Group(id) => {
                if !self.tree.contains(id) {
                    return;
                }
                self.top_group = Some(id);
                self.top_item = None;
            }
            TreeItemRef::Row(row) => {
                let Some(group) = self.tree.get(row.group) else {
                    return;
                };
                self.top_item = group
                    .rows()
                    .get(row.index)
                    .and_then(|r| r.leaves().first())
                    .cloned();
                self.top_group = Some(row.group);
            }
        }
    }

    /// Brings `item` (searched below `group`, or the whole tree) or `group` into view.
    ///
    /// Groups on the way are expanded. Raises [`ViewEvent::ScrollTo`] and moves the top anchor.
    pub fn scroll_to(&mut self, group: Option<GroupId>, item: Option<&T>, exactly: bool) {
        if group.is_none() && item.is_none() {
            return;
        }
        self.batch_update(|v| {
            let root = v.tree.root();
            let mut group = group.filter(|&g| v.tree.contains(g));
            let mut row = None;
            if let Some(item) = item {
                if let Some((found, found_row)) = v.tree.find_item(group.unwrap_or(root), item) {
                    group = Some(found);
                    row = found_row;
                }
            }
            let target = match row {
                Some(row) => TreeItemRef::Row(row),
                None => TreeItemRef::Group(group.unwrap_or(root)),
            };
            v.scroll_to_tree_item(target, exactly);
        });
    }

    /// Expands the ancestors of `target` and asks the host to bring it into view.
    pub fn scroll_to_tree_item(&mut self, target: TreeItemRef, exactly: bool) {
        let group = target.group();
        if !self.tree.contains(group) {
            return;
        }
        self.batch_update(|v| {
            let branch = v.tree.branch(group);
            let expand = match target {
                TreeItemRef::Group(_) => &branch[..branch.len().saturating_sub(1)],
                TreeItemRef::Row(_) => &branch[..],
            };
            for &id in expand {
                v.tree.set_expanded(id, true);
            }
            v.set_top_tree_item(target);

            let mut path: Vec<TreeItemRef> = branch.into_iter().map(TreeItemRef::Group).collect();
            if let TreeItemRef::Row(_) = target {
                path.push(target);
            }
            v.emit(ViewEvent::ScrollTo { path, exactly });
        });
    }

    pub fn last_selected_item(&self) -> Option<&T> {
        self.last_selected_item.as_ref()
    }

    pub fn last_selected_row(&self) -> Option<RowRef> {
        self.last_selected_row
    }

    fn clear_last_selected(&mut self) {
        self.last_selected_item = None;
        self.last_selected_row = None;
    }

    /// Selects `item` shown in `row`. Modifiers are dropped unless multi-select is enabled.
    pub fn select_item(&mut self, row: RowRef, item: &T, modifiers: SelectionModifiers) {
        if !self.options.can_select {
            return;
        }
        let shown = self
            .tree
            .get(row.group)
            .and_then(|g| g.rows().get(row.index))
            .is_some_and(|r| r.contains(item));
        if !shown {
            cvwarn!(index = row.index, "select_item: item is not in the given row");
            return;
        }
        let modifiers = if self.options.is_multi_select {
            modifiers
        } else {
            SelectionModifiers::default()
        };

        self.last_selected_item = Some(item.clone());
        self.last_selected_row = Some(row);
        self.batch_update(|v| {
            v.emit(ViewEvent::ItemSelected(SelectionEvent {
                group: row.group,
                row,
                item: item.clone(),
                modifiers,
            }));
        });
    }

    pub fn open_item(&mut self, item: &T) {
        if !self.options.can_open {
            return;
        }
        self.batch_update(|v| v.emit(ViewEvent::ItemOpened(item.clone())));
    }

    /// Selects the first item of the first leaf group.
    pub fn select_first_item(&mut self) -> Option<T> {
        let root = self.tree.root();
        let group = self.tree.next_branch_end(root).unwrap_or(root);
        self.select_in(group, 0)
    }

    /// Selects the item after the last selected one.
    ///
    /// At the end of a group, wraps to its first item (`in_group`) or continues with the next
    /// leaf group. With `first`, or without a previous selection, selects the first item.
    pub fn select_next_item(&mut self, in_group: bool, first: bool) -> Option<T> {
        let (Some(item), Some(row)) = (self.last_selected_item.clone(), self.last_selected_row)
        else {
            return self.select_first_item();
        };
        if first {
            return self.select_first_item();
        }
        let Some(group) = self.tree.get(row.group) else {
            return self.select_first_item();
        };

        let index = group
            .source()
            .iter()
            .position(|x| *x == item)
            .map_or(0, |i| i + 1);
        if index < group.source_count() {
            return self.select_in(row.group, index);
        }
        if in_group {
            return self.select_in(row.group, 0);
        }
        let next = self.tree.next_branch_end(row.group)?;
        self.select_in(next, 0)
    }

    pub fn select_next_or_first_item(&mut self, in_group: bool, first: bool) -> Option<T> {
        self.select_next_item(in_group, first)
            .or_else(|| self.select_first_item())
    }

    fn select_in(&mut self, group: GroupId, index: usize) -> Option<T> {
        if !self.options.can_select {
            return None;
        }
        let item = self.tree.get(group)?.item_by_index(index)?.clone();
        for id in self.tree.branch(group) {
            self.tree.set_expanded(id, true);
        }
        let row = self.tree.get(group)?.row_with_item(&item)?;
        self.select_item(RowRef { group, index: row }, &item, SelectionModifiers::default());
        Some(item)
    }

    /// Status text for the last selection: `pos/group count/total`, `pos/total` when the
    /// group holds everything, or just the total when nothing is selected.
    pub fn position_slash_count(&self) -> String {
        let total = self.root_source().len();
        let selected = self.last_selected_item.as_ref().zip(
            self.last_selected_row
                .and_then(|row| self.tree.get(row.group)),
        );
        let Some((item, group)) = selected else {
            return format!("{total}");
        };
        let Some(pos) = group.source().iter().position(|x| x == item) else {
            return format!("{total}");
        };
        let count = group.source_count();
        if count == total {
            format!("{}/{}", pos + 1, total)
        } else {
            format!("{}/{}/{}", pos + 1, count, total)
        }
    }

    /// Expands or collapses `group` and its whole subtree.
    pub fn set_expanded(&mut self, group: GroupId, expanded: bool) {
        if !self.tree.contains(group) {
            return;
        }
        self.batch_update(|v| v.tree.set_expanded_recursive(group, expanded));
    }

    /// Sets the layout width of `group`; child groups get `width - group_content_offset`.
    pub fn set_width(&mut self, group: GroupId, width: u32) {
        self.batch_update(|v| v.tree.set_width(group, width));
    }

    pub fn sort(&mut self, group: GroupId, recursive: bool) {
        self.batch_update(|v| {
            v.tree.sort(group, recursive);
            v.clear_last_selected();
        });
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, group: GroupId, recursive: bool, rng: &mut R) {
        self.batch_update(|v| {
            v.tree.shuffle(group, recursive, rng);
            v.clear_last_selected();
        });
    }

    /// Switches the view mode of `group` (or every leaf below it), refreshing all their rows.
    pub fn set_view_mode(&mut self, group: GroupId, view_mode: ViewMode, recursive: bool) {
        self.batch_update(|v| {
            v.tree.set_view_mode(group, view_mode, recursive);
            v.clear_last_selected();
        });
    }

    /// Re-wraps every leaf group, e.g. after item sizes changed.
    pub fn rewrap_all(&mut self) {
        self.batch_update(|v| {
            let root = v.tree.root();
            v.tree.rewrap_all(root);
            let item = v.top_item.clone();
            v.scroll_to(v.top_group, item.as_ref(), true);
        });
    }

    /// Re-wraps the leaf groups that contain any of `items`.
    pub fn rewrap_all_if_contains(&mut self, items: &[T]) {
        if items.is_empty() {
            return;
        }
        let wanted: ItemSet<T> = items.iter().cloned().collect();
        self.batch_update(|v| {
            let root = v.tree.root();
            for leaf in v.tree.leaves(root) {
                let hit = v
                    .tree
                    .get(leaf)
                    .is_some_and(|g| g.source().iter().any(|x| wanted.contains(x)));
                if hit {
                    v.tree.rewrap(leaf);
                }
            }
        });
    }

    /// Re-groups `group` by `items`, e.g. with the outcome of a grouping dialog.
    ///
    /// `group` becomes a grouping root; its criteria are refreshed on later updates.
    ///
    /// `items` are interned as new criteria on every call. Criteria they replace stay in the
    /// arena, since other groups may still refer to them, until the next `reload`.
    pub fn apply_group_by(&mut self, group: GroupId, mode: GroupMode, items: &[GroupByItem<T>]) {
        if !self.tree.contains(group) {
            return;
        }
        cvdebug!(criteria = items.len(), ?mode, "CollectionView::apply_group_by");
        self.batch_update(|v| {
            let criteria = v.tree.criteria.intern_all(items);
            v.tree.configure(
                group,
                Some(criteria),
                mode.is_group_by(),
                mode.is_then_by(),
                mode.is_recursive(),
            );
            if !v.grouping_roots.contains(&group) {
                v.grouping_roots.push(group);
            }
            v.tree.group_it(group);
            v.tree.set_expanded_recursive(group, true);
            v.tree.rewrap_all(group);
            v.clear_last_selected();

            let mut to_rewrap = Vec::new();
            v.tree.remove_empty_groups(group, &mut to_rewrap);
            v.sync_detached();
            for id in to_rewrap {
                v.tree.rewrap(id);
            }
        });
    }

    /// An identity-free description of the current tree.
    pub fn layout_snapshot(&self) -> LayoutSnapshot<T> {
        let mut groups = Vec::new();
        self.snapshot_into(self.tree.root(), 0, &mut groups);
        LayoutSnapshot { groups }
    }

    fn snapshot_into(&self, id: GroupId, depth: usize, out: &mut Vec<GroupLayout<T>>) {
        let Some(g) = self.tree.get(id) else {
            return;
        };
        out.push(GroupLayout {
            label: String::from(self.group_label(id)),
            depth,
            source: g.source().to_vec(),
            rows: g.rows().iter().map(Row::len).collect(),
            is_expanded: g.is_expanded(),
        });
        for &child in g.groups() {
            self.snapshot_into(child, depth + 1, out);
        }
    }

    /// Registers a listener for [`ViewEvent`]s.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&CollectionView<T>, &ViewEvent<T>) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        let listener: Listener<T> = Arc::new(listener);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: ViewEvent<T>) {
        self.notify_pending.push(event);
        if self.notify_depth == 0 {
            self.flush_events();
        }
    }

    fn collect_tree_changes(&mut self) {
        self.sync_detached();
        for change in self.tree.take_changes() {
            let (id, event) = match change {
                TreeChange::Rows(id) => (id, ViewEvent::RowsChanged(id)),
                TreeChange::Groups(id) => (id, ViewEvent::GroupsChanged(id)),
            };
            if self.tree.contains(id) && !self.notify_pending.contains(&event) {
                self.notify_pending.push(event);
            }
        }
    }

    fn flush_events(&mut self) {
        self.collect_tree_changes();
        let events = core::mem::take(&mut self.notify_pending);
        for event in &events {
            for (_, listener) in &self.listeners {
                listener(self, event);
            }
        }
    }

    /// Batches multiple mutations: events raised inside `f` are delivered after it returns.
    ///
    /// Row and group change events are collapsed per group. Every public mutation already runs
    /// batched; nesting is fine.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        self.notify_depth = self.notify_depth.saturating_add(1);

        f(self);

        debug_assert!(self.notify_depth > 0, "notify_depth underflow");
        self.notify_depth = self.notify_depth.saturating_sub(1);
        if self.notify_depth == 0 {
            self.flush_events();
        }
    }
}

impl<T> fmt::Debug for CollectionView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("options", &self.options)
            .field("is_visible", &self.is_visible)
            .field("pending_remove", &self.pending_remove.len())
            .field("pending_update", &self.pending_update.len())
            .field("is_filtered", &self.filter.is_some())
            .field("top_group", &self.top_group)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
