use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

/// A predicate deciding whether an item belongs to a group.
pub type GroupByPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A labeled grouping criterion, as handed over by a grouping configuration provider.
///
/// Predicates of sibling criteria may overlap: an item matching several of them lands in every
/// matching group (fan-out grouping, e.g. by tag).
pub struct GroupByItem<T> {
    pub label: String,
    pub icon: Option<String>,
    /// Marks a pure category header. A group produced by a category that ends up without
    /// sub-groups is pruned.
    pub is_group: bool,
    pub predicate: GroupByPredicate<T>,
    /// Nested criteria used by recursive grouping modes.
    pub children: Vec<GroupByItem<T>>,
}

impl<T> GroupByItem<T> {
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            icon: None,
            is_group: false,
            predicate: Arc::new(predicate),
            children: Vec::new(),
        }
    }

    /// Creates a category header criterion.
    pub fn category(
        label: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            is_group: true,
            ..Self::new(label, predicate)
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_children(mut self, children: Vec<GroupByItem<T>>) -> Self {
        self.children = children;
        self
    }

    pub fn fit(&self, item: &T) -> bool {
        (self.predicate)(item)
    }
}

impl<T> Clone for GroupByItem<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            icon: self.icon.clone(),
            is_group: self.is_group,
            predicate: Arc::clone(&self.predicate),
            children: self.children.clone(),
        }
    }
}

impl<T> fmt::Debug for GroupByItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupByItem")
            .field("label", &self.label)
            .field("icon", &self.icon)
            .field("is_group", &self.is_group)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// A stable handle to a criterion interned in a [`GroupByArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupById(u32);

impl GroupById {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// An interned criterion. Groups refer to it by [`GroupById`].
pub struct GroupByNode<T> {
    label: String,
    icon: Option<String>,
    is_group: bool,
    predicate: GroupByPredicate<T>,
    children: Vec<GroupById>,
}

impl<T> GroupByNode<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn children(&self) -> &[GroupById] {
        &self.children
    }

    pub fn fit(&self, item: &T) -> bool {
        (self.predicate)(item)
    }
}

impl<T> fmt::Debug for GroupByNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupByNode")
            .field("label", &self.label)
            .field("is_group", &self.is_group)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Append-only storage for grouping criteria.
///
/// Criteria are shared by every group that was produced by them or groups by them; interning
/// keeps those references as plain ids instead of shared ownership.
pub struct GroupByArena<T> {
    nodes: Vec<GroupByNode<T>>,
}

impl<T> Default for GroupByArena<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<T> fmt::Debug for GroupByArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupByArena")
            .field("len", &self.nodes.len())
            .finish()
    }
}

impl<T> GroupByArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: GroupById) -> Option<&GroupByNode<T>> {
        self.nodes.get(id.index())
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Interns `item` and its nested criteria, returning the id of `item`.
    pub fn intern(&mut self, item: &GroupByItem<T>) -> GroupById {
        let children = item.children.iter().map(|c| self.intern(c)).collect();
        let id = GroupById(self.nodes.len() as u32);
        self.nodes.push(GroupByNode {
            label: item.label.clone(),
            icon: item.icon.clone(),
            is_group: item.is_group,
            predicate: Arc::clone(&item.predicate),
            children,
        });
        id
    }

    pub fn intern_all(&mut self, items: &[GroupByItem<T>]) -> Vec<GroupById> {
        items.iter().map(|item| self.intern(item)).collect()
    }

    pub fn fit(&self, id: GroupById, item: &T) -> bool {
        self.get(id).is_some_and(|node| node.fit(item))
    }

    pub fn label(&self, id: GroupById) -> &str {
        self.get(id).map_or("", |node| node.label())
    }

    pub fn is_group(&self, id: GroupById) -> bool {
        self.get(id).is_some_and(|node| node.is_group)
    }

    pub fn children(&self, id: GroupById) -> &[GroupById] {
        self.get(id).map(|node| node.children()).unwrap_or(&[])
    }

    pub fn has_children(&self, id: GroupById) -> bool {
        !self.children(id).is_empty()
    }

    /// Refreshes `id` from a freshly provided set of criteria.
    ///
    /// The criterion with the same label in `new_items` replaces the predicate of `id`; its
    /// nested criteria are merged by label (known ones keep their ids, new ones are appended).
    /// Criteria missing from `new_items` are left untouched.
    pub fn update(&mut self, id: GroupById, new_items: &[GroupByItem<T>]) {
        let Some(node) = self.get(id) else {
            return;
        };
        if let Some(fresh) = new_items.iter().find(|x| x.label == node.label) {
            self.merge(id, fresh);
        }
    }

    fn merge(&mut self, id: GroupById, fresh: &GroupByItem<T>) {
        self.nodes[id.index()].predicate = Arc::clone(&fresh.predicate);
        for child in &fresh.children {
            let existing = self.nodes[id.index()]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c.index()].label == child.label);
            match existing {
                Some(c) => self.merge(c, child),
                None => {
                    let c = self.intern(child);
                    self.nodes[id.index()].children.push(c);
                }
            }
        }
    }
}
