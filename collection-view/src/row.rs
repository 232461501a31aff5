use alloc::vec::Vec;
use core::ops::Range;

/// One line of items inside a leaf group.
///
/// Rows are a layout artifact: they are rebuilt by re-wrapping and never decide group
/// membership. A collapsed leaf group keeps a single empty placeholder row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row<T> {
    leaves: Vec<T>,
}

impl<T> Row<T> {
    pub(crate) fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    pub fn leaves(&self) -> &[T] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub(crate) fn replace_leaves(&mut self, leaves: &[T])
    where
        T: Clone,
    {
        self.leaves.clear();
        self.leaves.extend_from_slice(leaves);
    }
}

impl<T: PartialEq> Row<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.leaves.contains(item)
    }
}

/// Greedily packs consecutive extents into lines no wider than `width`.
///
/// Returns one index range per line. A line is closed as soon as the next extent would
/// overflow it; an extent wider than `width` gets a line of its own.
pub fn wrap_extents(extents: impl IntoIterator<Item = u32>, width: u32) -> Vec<Range<usize>> {
    let width = width as u64;
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut used = 0u64;
    let mut count = 0usize;

    for (i, extent) in extents.into_iter().enumerate() {
        let extent = extent as u64;
        if i > start && used.saturating_add(extent) > width {
            lines.push(start..i);
            start = i;
            used = 0;
        }
        used = used.saturating_add(extent);
        count = i + 1;
    }

    if start < count {
        lines.push(start..count);
    }
    lines
}
