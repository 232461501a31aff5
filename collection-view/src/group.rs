use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use rand::Rng;
use rand::seq::SliceRandom;
use slotmap::SlotMap;

use crate::group_by::{GroupByArena, GroupById};
use crate::options::{ItemSizeFn, SortCompareFn};
use crate::row::{Row, wrap_extents};
use crate::{GroupId, RowRef, ViewItem, ViewMode};

/// What a group lays out: child groups or rows, never both.
#[derive(Clone, Debug)]
pub(crate) enum Content<T> {
    /// Never empty: a group that loses its last child group falls back to rows.
    Groups(Vec<GroupId>),
    Rows(Vec<Row<T>>),
}

/// A node of the group tree.
///
/// `source` holds every item assigned to the group, in insertion or sort order. Child groups
/// partition it, except that an item matching several criteria is repeated in each of them.
#[derive(Clone, Debug)]
pub struct Group<T> {
    source: Vec<T>,
    parent: Option<GroupId>,
    content: Content<T>,
    grouped_by: Option<GroupById>,
    group_by_items: Option<Vec<GroupById>>,
    is_grouping_root: bool,
    is_group_by: bool,
    is_then_by: bool,
    is_recursive: bool,
    width: u32,
    view_mode: ViewMode,
    is_expanded: bool,
    is_rewrap_pending: bool,
    is_view_mode_pending: bool,
}

impl<T> Group<T> {
    fn new(source: Vec<T>, grouped_by: Option<GroupById>, view_mode: ViewMode) -> Self {
        Self {
            source,
            parent: None,
            content: Content::Rows(Vec::new()),
            grouped_by,
            group_by_items: None,
            is_grouping_root: false,
            is_group_by: false,
            is_then_by: false,
            is_recursive: false,
            width: 0,
            view_mode,
            is_expanded: false,
            is_rewrap_pending: true,
            is_view_mode_pending: false,
        }
    }

    pub fn source(&self) -> &[T] {
        &self.source
    }

    pub fn source_count(&self) -> usize {
        self.source.len()
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Child groups; empty for a leaf group.
    pub fn groups(&self) -> &[GroupId] {
        match &self.content {
            Content::Groups(groups) => groups,
            Content::Rows(_) => &[],
        }
    }

    /// Rows; empty for a group that holds child groups.
    pub fn rows(&self) -> &[Row<T>] {
        match &self.content {
            Content::Groups(_) => &[],
            Content::Rows(rows) => rows,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Rows(_))
    }

    /// The criterion that produced this group; `None` for the root and ungrouped buckets.
    pub fn grouped_by(&self) -> Option<GroupById> {
        self.grouped_by
    }

    /// Criteria this group was configured with, if any.
    pub fn group_by_items(&self) -> Option<&[GroupById]> {
        self.group_by_items.as_deref()
    }

    pub fn is_grouping_root(&self) -> bool {
        self.is_grouping_root
    }

    pub fn is_group_by(&self) -> bool {
        self.is_group_by
    }

    pub fn is_then_by(&self) -> bool {
        self.is_then_by
    }

    pub fn is_recursive(&self) -> bool {
        self.is_recursive
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn is_expanded(&self) -> bool {
        self.is_expanded
    }

    pub fn is_rewrap_pending(&self) -> bool {
        self.is_rewrap_pending
    }

    pub fn item_by_index(&self, index: usize) -> Option<&T> {
        self.source.get(index)
    }
}

impl<T: PartialEq> Group<T> {
    pub fn row_with_item(&self, item: &T) -> Option<usize> {
        self.rows().iter().position(|row| row.contains(item))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TreeChange {
    Rows(GroupId),
    Groups(GroupId),
}

/// The per-tree layout context, copied out of the view options.
#[derive(Clone)]
pub(crate) struct TreeContext<T> {
    pub(crate) item_size: ItemSizeFn<T>,
    pub(crate) sort_compare: SortCompareFn<T>,
    pub(crate) item_border_size: u32,
    pub(crate) group_content_offset: u32,
    pub(crate) add_in_order: bool,
}

/// Arena-backed group tree with a stable root.
pub(crate) struct GroupTree<T> {
    groups: SlotMap<GroupId, Group<T>>,
    pub(crate) criteria: GroupByArena<T>,
    root: GroupId,
    ctx: TreeContext<T>,
    changes: Vec<TreeChange>,
    detached: Vec<(GroupId, Option<GroupId>)>,
}

pub(crate) fn mark(set: &mut Vec<GroupId>, id: GroupId) {
    if !set.contains(&id) {
        set.push(id);
    }
}

impl<T: ViewItem> GroupTree<T> {
    pub(crate) fn new(ctx: TreeContext<T>, source: Vec<T>, view_mode: ViewMode) -> Self {
        let mut groups = SlotMap::with_key();
        let root = groups.insert(Group::new(source, None, view_mode));
        Self {
            groups,
            criteria: GroupByArena::new(),
            root,
            ctx,
            changes: Vec::new(),
            detached: Vec::new(),
        }
    }

    /// Drops every group and criterion and starts over with a new root.
    ///
    /// Handles into the previous tree become stale instead of aliasing new groups.
    pub(crate) fn reset(&mut self, source: Vec<T>, view_mode: ViewMode) {
        self.groups.clear();
        self.criteria.clear();
        self.changes.clear();
        self.detached.clear();
        self.root = self.groups.insert(Group::new(source, None, view_mode));
    }

    pub(crate) fn root(&self) -> GroupId {
        self.root
    }

    pub(crate) fn get(&self, id: GroupId) -> Option<&Group<T>> {
        self.groups.get(id)
    }

    pub(crate) fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn set_context(&mut self, ctx: TreeContext<T>) {
        self.ctx = ctx;
    }

    pub(crate) fn take_changes(&mut self) -> Vec<TreeChange> {
        core::mem::take(&mut self.changes)
    }

    pub(crate) fn take_detached(&mut self) -> Vec<(GroupId, Option<GroupId>)> {
        core::mem::take(&mut self.detached)
    }

    fn record(&mut self, change: TreeChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    /// Configures `id` as a grouping root.
    pub(crate) fn configure(
        &mut self,
        id: GroupId,
        group_by_items: Option<Vec<GroupById>>,
        is_group_by: bool,
        is_then_by: bool,
        is_recursive: bool,
    ) {
        let Some(g) = self.groups.get_mut(id) else {
            return;
        };
        g.is_grouping_root = true;
        g.is_group_by = is_group_by;
        g.is_then_by = is_then_by;
        g.is_recursive = is_recursive;
        g.group_by_items = group_by_items.filter(|items| !items.is_empty());
    }

    pub(crate) fn label(&self, id: GroupId) -> &str {
        self.groups
            .get(id)
            .and_then(|g| g.grouped_by)
            .map_or("", |c| self.criteria.label(c))
    }

    fn criteria_for_subgroup(&self, parent: &Group<T>) -> Option<Vec<GroupById>> {
        let items = parent.group_by_items.as_ref()?;
        if !parent.is_then_by {
            return None;
        }
        if parent.is_recursive
            && !parent.is_grouping_root
            && parent
                .grouped_by
                .is_some_and(|c| self.criteria.has_children(c))
        {
            return Some(items.clone());
        }
        if items.len() > 1 {
            return Some(items[1..].to_vec());
        }
        None
    }

    /// The criteria `id` partitions its source by.
    pub(crate) fn active_criteria(&self, id: GroupId) -> Option<Vec<GroupById>> {
        let g = self.groups.get(id)?;
        let own_has_children = g
            .grouped_by
            .is_some_and(|c| self.criteria.has_children(c));

        if let Some(items) = &g.group_by_items {
            if g.is_grouping_root || !own_has_children {
                if g.is_group_by {
                    return Some(items.clone());
                }
                if g.is_then_by && !items.is_empty() {
                    return Some(alloc::vec![items[0]]);
                }
                return None;
            }
        }

        if g.is_recursive && !g.is_grouping_root && own_has_children {
            return g.grouped_by.map(|c| self.criteria.children(c).to_vec());
        }
        None
    }

    fn new_child(&mut self, parent: GroupId, source: Vec<T>, grouped_by: Option<GroupById>) -> GroupId {
        let p = &self.groups[parent];
        let mut child = Group::new(source, grouped_by, p.view_mode);
        child.parent = Some(parent);
        child.is_recursive = p.is_recursive;
        child.is_group_by = p.is_group_by;
        child.is_then_by = p.is_then_by;
        child.width = p.width.saturating_sub(self.ctx.group_content_offset);
        child.group_by_items = self.criteria_for_subgroup(p);
        self.groups.insert(child)
    }

    /// Drops the child groups and rows of `id`, leaving it an empty leaf.
    fn clear_content(&mut self, id: GroupId) {
        let Some(g) = self.groups.get_mut(id) else {
            return;
        };
        let content = core::mem::replace(&mut g.content, Content::Rows(Vec::new()));
        g.is_rewrap_pending = true;
        match content {
            Content::Groups(children) => {
                for child in children {
                    self.delete_subtree(child);
                }
                self.record(TreeChange::Groups(id));
            }
            Content::Rows(rows) => {
                if !rows.is_empty() {
                    self.record(TreeChange::Rows(id));
                }
            }
        }
    }

    fn delete_subtree(&mut self, id: GroupId) {
        let Some(g) = self.groups.remove(id) else {
            return;
        };
        self.detached.push((id, g.parent));
        if let Content::Groups(children) = g.content {
            for child in children {
                self.delete_subtree(child);
            }
        }
    }

    /// Removes `id` from its parent and frees its subtree. The root is never detached.
    fn detach(&mut self, id: GroupId) {
        if id == self.root {
            return;
        }
        let Some(parent) = self.groups.get(id).and_then(|g| g.parent) else {
            return;
        };
        self.delete_subtree(id);

        let mut orphaned = false;
        if let Some(p) = self.groups.get_mut(parent) {
            if let Content::Groups(children) = &mut p.content {
                children.retain(|&c| c != id);
                if children.is_empty() {
                    p.content = Content::Rows(Vec::new());
                    p.is_rewrap_pending = true;
                    orphaned = true;
                }
            }
        }
        self.record(TreeChange::Groups(parent));
        if orphaned {
            self.rewrap(parent);
        }
    }

    /// Partitions the source of `id` into child groups and recurses into them.
    pub(crate) fn group_it(&mut self, id: GroupId) {
        self.clear_content(id);
        let Some(criteria) = self.active_criteria(id) else {
            return;
        };

        // slot 0 collects items that fit no criterion
        let mut buckets: Vec<Option<Vec<T>>> = alloc::vec![None; criteria.len() + 1];
        for item in &self.groups[id].source {
            let mut fit = false;
            for (i, &c) in criteria.iter().enumerate() {
                if !self.criteria.fit(c, item) {
                    continue;
                }
                buckets[i + 1].get_or_insert_with(Vec::new).push(item.clone());
                fit = true;
            }
            if !fit {
                buckets[0].get_or_insert_with(Vec::new).push(item.clone());
            }
        }

        let mut children = Vec::new();
        for (slot, bucket) in buckets.into_iter().enumerate() {
            let Some(source) = bucket else {
                continue;
            };
            let grouped_by = slot.checked_sub(1).map(|i| criteria[i]);
            let child = self.new_child(id, source, grouped_by);
            self.group_it(child);
            children.push(child);
        }

        if !children.is_empty() {
            self.groups[id].content = Content::Groups(children);
            self.record(TreeChange::Groups(id));
        }
    }

    fn is_empty_group(&self, id: GroupId) -> bool {
        let Some(g) = self.groups.get(id) else {
            return false;
        };
        if g.source.is_empty() {
            return true;
        }
        if !g.is_leaf() {
            return false;
        }
        match g.grouped_by {
            Some(c) => self.criteria.is_group(c),
            None => g
                .parent
                .and_then(|p| self.groups.get(p))
                .is_some_and(|p| p.groups().len() == 1),
        }
    }

    /// Prunes empty groups below `id`, bottom-up.
    ///
    /// Surviving ancestors of a pruned group are added to `to_rewrap`.
    pub(crate) fn remove_empty_groups(&mut self, id: GroupId, to_rewrap: &mut Vec<GroupId>) {
        let Some(g) = self.groups.get(id) else {
            return;
        };
        if !g.is_leaf() {
            for child in g.groups().to_vec() {
                self.remove_empty_groups(child, to_rewrap);
            }
            return;
        }

        let mut removed = false;
        let mut cur = Some(id);
        while let Some(g_id) = cur {
            let Some(g) = self.groups.get(g_id) else {
                break;
            };
            let parent = g.parent;
            if g_id != self.root && self.is_empty_group(g_id) {
                self.detach(g_id);
                removed = true;
            } else if removed {
                mark(to_rewrap, g_id);
            }
            cur = parent;
        }
    }

    fn add_to_source(&mut self, id: GroupId, item: T) {
        let cmp = self.ctx.sort_compare.clone();
        let in_order = self.ctx.add_in_order;
        let g = &mut self.groups[id];
        if in_order {
            let at = g
                .source
                .iter()
                .position(|x| cmp(x, &item) == Ordering::Greater)
                .unwrap_or(g.source.len());
            g.source.insert(at, item);
        } else {
            g.source.push(item);
        }
    }

    fn attach_in_label_order(&mut self, parent: GroupId, child: GroupId) {
        let label = String::from(self.label(child));
        let at = self.groups[parent]
            .groups()
            .iter()
            .position(|&c| self.label(c) > label.as_str());
        let Some(p) = self.groups.get_mut(parent) else {
            return;
        };
        match &mut p.content {
            Content::Groups(children) => match at {
                Some(at) => children.insert(at, child),
                None => children.push(child),
            },
            Content::Rows(_) => p.content = Content::Groups(alloc::vec![child]),
        }
        self.record(TreeChange::Groups(parent));
    }

    /// Adds `item` below `id`, creating the groups it needs.
    pub(crate) fn insert_item(&mut self, id: GroupId, item: &T, to_rewrap: &mut Vec<GroupId>) {
        if !self.groups.contains_key(id) {
            return;
        }
        let criteria = self.active_criteria(id);

        if !self.groups[id].source.contains(item) {
            self.add_to_source(id, item.clone());
            if criteria.is_none() {
                mark(to_rewrap, id);
                return;
            }
        }

        let Some(criteria) = criteria else {
            return;
        };

        // groups between this one and its first criterion group may have been pruned as empty
        let first_grouped = self.groups[id]
            .groups()
            .iter()
            .find_map(|&c| self.groups[c].grouped_by);
        if !criteria.iter().any(|&c| Some(c) == first_grouped) {
            self.group_it(id);
            self.set_expanded_recursive(id, true);
            return;
        }

        let children = self.groups[id].groups().to_vec();
        let mut in_groups = Vec::new();

        for &c in &criteria {
            if !self.criteria.fit(c, item) {
                continue;
            }
            let existing = children
                .iter()
                .copied()
                .find(|&g| self.groups[g].grouped_by == Some(c));
            let group = match existing {
                Some(group) => {
                    self.insert_item(group, item, to_rewrap);
                    group
                }
                None => {
                    let group = self.new_child(id, alloc::vec![item.clone()], Some(c));
                    self.group_it(group);
                    self.set_expanded_recursive(group, true);
                    self.attach_in_label_order(id, group);
                    group
                }
            };
            in_groups.push(group);
        }

        if in_groups.is_empty() {
            let ungrouped = children
                .iter()
                .copied()
                .find(|&g| self.groups[g].grouped_by.is_none());
            let ungrouped = match ungrouped {
                Some(group) => group,
                None => {
                    let group = self.new_child(id, Vec::new(), None);
                    self.groups[group].is_expanded = true;
                    if let Content::Groups(list) = &mut self.groups[id].content {
                        list.insert(0, group);
                    }
                    self.record(TreeChange::Groups(id));
                    group
                }
            };
            self.insert_item(ungrouped, item, to_rewrap);
            in_groups.push(ungrouped);
        }

        for group in children {
            if !in_groups.contains(&group) {
                self.remove_item(group, item, to_rewrap);
            }
        }
    }

    /// Removes `item` from `id` and its subtree. A non-root group left empty is detached.
    pub(crate) fn remove_item(&mut self, id: GroupId, item: &T, to_rewrap: &mut Vec<GroupId>) {
        let Some(g) = self.groups.get_mut(id) else {
            return;
        };
        let Some(pos) = g.source.iter().position(|x| x == item) else {
            return;
        };
        g.source.remove(pos);

        if g.source.is_empty() {
            if id == self.root {
                self.clear_content(id);
            } else {
                self.detach(id);
            }
            return;
        }

        if !g.rows().is_empty() {
            mark(to_rewrap, id);
            return;
        }
        for child in g.groups().to_vec() {
            self.remove_item(child, item, to_rewrap);
        }
    }

    /// Repacks the source of a leaf group into rows that fit its width.
    ///
    /// Rows whose content is unchanged are left alone. A collapsed group only gets a placeholder
    /// row and stays pending until expanded.
    pub(crate) fn rewrap(&mut self, id: GroupId) {
        let Some(g) = self.groups.get(id) else {
            return;
        };
        if !g.is_leaf() || g.width == 0 {
            return;
        }

        if !g.is_expanded {
            let g = &mut self.groups[id];
            g.is_rewrap_pending = true;
            if let Content::Rows(rows) = &mut g.content {
                if rows.is_empty() {
                    rows.push(Row::new());
                    self.record(TreeChange::Rows(id));
                }
            }
            return;
        }

        let border = self.ctx.item_border_size.saturating_mul(2);
        let lines = wrap_extents(
            g.source
                .iter()
                .map(|item| (self.ctx.item_size)(item, g.view_mode, true).saturating_add(border)),
            g.width,
        );

        let g = &mut self.groups[id];
        let force = g.is_view_mode_pending;
        g.is_view_mode_pending = false;
        g.is_rewrap_pending = false;
        let Content::Rows(rows) = &mut g.content else {
            return;
        };

        let mut changed = rows.len() != lines.len();
        rows.truncate(lines.len());
        while rows.len() < lines.len() {
            rows.push(Row::new());
        }
        for (row, line) in rows.iter_mut().zip(lines) {
            let leaves = &g.source[line];
            if !force && row.leaves() == leaves {
                continue;
            }
            row.replace_leaves(leaves);
            changed = true;
        }

        if changed {
            cvtrace!(rows = rows.len(), width = g.width, "rewrap");
            self.record(TreeChange::Rows(id));
        }
    }

    pub(crate) fn set_width(&mut self, id: GroupId, width: u32) {
        let Some(g) = self.groups.get_mut(id) else {
            return;
        };
        if g.width == width {
            return;
        }
        g.width = width;
        let children = g.groups().to_vec();
        self.rewrap(id);

        let child_width = width.saturating_sub(self.ctx.group_content_offset);
        for child in children {
            self.set_width(child, child_width);
        }
    }

    /// Recomputes nested widths from the width of `id` and re-wraps every leaf below it.
    pub(crate) fn relayout(&mut self, id: GroupId) {
        let Some(g) = self.groups.get(id) else {
            return;
        };
        let child_width = g.width.saturating_sub(self.ctx.group_content_offset);
        let children = g.groups().to_vec();
        self.rewrap(id);
        for child in children {
            if let Some(c) = self.groups.get_mut(child) {
                c.width = child_width;
            }
            self.relayout(child);
        }
    }

    /// Expands or collapses a single group. Expanding re-wraps a pending group.
    pub(crate) fn set_expanded(&mut self, id: GroupId, expanded: bool) {
        let Some(g) = self.groups.get_mut(id) else {
            return;
        };
        if g.is_expanded == expanded {
            return;
        }
        g.is_expanded = expanded;
        if !expanded || !g.is_rewrap_pending {
            return;
        }
        self.rewrap(id);
        if let Some(g) = self.groups.get_mut(id) {
            g.is_rewrap_pending = false;
        }
    }

    pub(crate) fn set_expanded_recursive(&mut self, id: GroupId, expanded: bool) {
        let Some(g) = self.groups.get(id) else {
            return;
        };
        let children = g.groups().to_vec();
        self.set_expanded(id, expanded);
        for child in children {
            self.set_expanded_recursive(child, expanded);
        }
    }

    /// Whether `id` and all its ancestors are expanded.
    pub(crate) fn is_fully_expanded(&self, id: GroupId) -> bool {
        let mut cur = Some(id);
        while let Some(g_id) = cur {
            let Some(g) = self.groups.get(g_id) else {
                return false;
            };
            if !g.is_expanded {
                return false;
            }
            cur = g.parent;
        }
        true
    }

    /// Leaf groups of the subtree rooted at `id`, in depth-first order.
    pub(crate) fn leaves(&self, id: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves(&self, id: GroupId, out: &mut Vec<GroupId>) {
        let Some(g) = self.groups.get(id) else {
            return;
        };
        if g.is_leaf() {
            out.push(id);
            return;
        }
        for &child in g.groups() {
            self.collect_leaves(child, out);
        }
    }

    pub(crate) fn rewrap_all(&mut self, id: GroupId) {
        for leaf in self.leaves(id) {
            self.rewrap(leaf);
        }
    }

    fn first_leaf(&self, mut id: GroupId) -> GroupId {
        while let Some(&first) = self.groups.get(id).and_then(|g| g.groups().first()) {
            id = first;
        }
        id
    }

    /// The next leaf group in depth-first order: the first leaf below `id`, or the first leaf
    /// after it when `id` is itself a leaf.
    pub(crate) fn next_branch_end(&self, id: GroupId) -> Option<GroupId> {
        let g = self.groups.get(id)?;
        if let Some(&first) = g.groups().first() {
            return Some(self.first_leaf(first));
        }

        let mut cur = id;
        loop {
            let parent = self.groups.get(cur)?.parent?;
            let siblings = self.groups.get(parent)?.groups();
            let at = siblings.iter().position(|&c| c == cur)?;
            if let Some(&next) = siblings.get(at + 1) {
                return Some(self.first_leaf(next));
            }
            cur = parent;
        }
    }

    /// Ids from the root down to `id`.
    pub(crate) fn branch(&self, id: GroupId) -> Vec<GroupId> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(g_id) = cur {
            let Some(g) = self.groups.get(g_id) else {
                break;
            };
            path.push(g_id);
            cur = g.parent;
        }
        path.reverse();
        path
    }

    /// Finds the deepest group containing `item` below `id`, expanding the way down.
    pub(crate) fn find_item(&mut self, id: GroupId, item: &T) -> Option<(GroupId, Option<RowRef>)> {
        if !self.groups.get(id)?.source.contains(item) {
            return None;
        }
        self.set_expanded(id, true);

        for child in self.groups.get(id)?.groups().to_vec() {
            if let Some(found) = self.find_item(child, item) {
                return Some(found);
            }
        }

        let row = self.groups[id]
            .row_with_item(item)
            .map(|index| RowRef { group: id, index });
        Some((id, row))
    }

    pub(crate) fn sort(&mut self, id: GroupId, recursive: bool) {
        let targets = if recursive { self.leaves(id) } else { alloc::vec![id] };
        let cmp = self.ctx.sort_compare.clone();
        for target in targets {
            if let Some(g) = self.groups.get_mut(target) {
                g.source.sort_by(|a, b| cmp(a, b));
                self.rewrap(target);
            }
        }
    }

    pub(crate) fn shuffle<R: Rng + ?Sized>(&mut self, id: GroupId, recursive: bool, rng: &mut R) {
        let targets = if recursive { self.leaves(id) } else { alloc::vec![id] };
        for target in targets {
            if let Some(g) = self.groups.get_mut(target) {
                g.source.shuffle(rng);
                self.rewrap(target);
            }
        }
    }

    pub(crate) fn set_view_mode(&mut self, id: GroupId, view_mode: ViewMode, recursive: bool) {
        let targets = if recursive { self.leaves(id) } else { alloc::vec![id] };
        for target in targets {
            if let Some(g) = self.groups.get_mut(target) {
                g.view_mode = view_mode;
                g.is_view_mode_pending = true;
                self.rewrap(target);
            }
        }
    }
}
