use alloc::vec::Vec;

use crate::ViewItem;
use crate::key::ItemSet;

/// A de-duplicated, insertion-ordered queue of items awaiting regrouping.
#[derive(Clone, Debug)]
pub(crate) struct PendingQueue<T> {
    items: Vec<T>,
    members: ItemSet<T>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            members: ItemSet::new(),
        }
    }
}

impl<T> PendingQueue<T> {
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T: ViewItem> PendingQueue<T> {
    pub(crate) fn push(&mut self, item: T) {
        if self.members.insert(item.clone()) {
            self.items.push(item);
        }
    }

    pub(crate) fn remove(&mut self, item: &T) {
        if self.members.remove(item) {
            self.items.retain(|x| x != item);
        }
    }

    pub(crate) fn take(&mut self) -> Vec<T> {
        self.members.clear();
        core::mem::take(&mut self.items)
    }
}
