//! Size-sorted index over the free suballocations of a block
//!
//! Only free ranges at least `threshold` bytes long are registered. A block
//! that accumulates many tiny fragments would otherwise pay an O(n) vector
//! shift for every one of them on each split and merge.

use crate::allocator::arena::NodeId;
use crate::allocator::list::SuballocationList;

#[derive(Debug, Clone)]
pub struct FreeSizeIndex {
    // Sorted ascending by the size of the referenced node.
    entries: Vec<NodeId>,
    threshold: u64,
}

impl FreeSizeIndex {
    pub fn new(threshold: u64) -> Self {
        FreeSizeIndex {
            entries: Vec::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Whether a free range of `size` bytes belongs in the index
    pub fn tracks(&self, size: u64) -> bool {
        size >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.entries
    }

    /// The largest registered free range
    pub fn largest(&self) -> Option<NodeId> {
        self.entries.last().copied()
    }

    /// Index of the first entry whose size is `>= size`
    pub fn lower_bound<H>(&self, list: &SuballocationList<H>, size: u64) -> usize {
        self.entries.partition_point(|&id| list[id].size() < size)
    }

    pub fn register<H>(&mut self, list: &SuballocationList<H>, id: NodeId) {
        let node = &list[id];
        debug_assert!(node.is_free());
        debug_assert!(node.size() > 0);

        if !self.tracks(node.size()) {
            return;
        }
        debug_assert!(!self.entries.contains(&id));

        let index = self.lower_bound(list, node.size());
        self.entries.insert(index, id);
    }

    pub fn unregister<H>(&mut self, list: &SuballocationList<H>, id: NodeId) {
        let size = list[id].size();
        if !self.tracks(size) {
            return;
        }

        // Several entries may share the size, so scan the run of equal sizes.
        let start = self.lower_bound(list, size);
        for index in start..self.entries.len() {
            let candidate = self.entries[index];
            if candidate == id {
                self.entries.remove(index);
                return;
            }
            if list[candidate].size() != size {
                break;
            }
        }

        panic!("free suballocation {:?} of size {} missing from size index", id, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::list::Suballocation;

    fn sizes(index: &FreeSizeIndex, list: &SuballocationList<()>) -> Vec<u64> {
        index.as_slice().iter().map(|&id| list[id].size()).collect()
    }

    #[test]
    fn test_register_keeps_order() {
        let mut list: SuballocationList<()> = SuballocationList::new(64);
        let root = list.first().unwrap();
        let b = list.insert_after(root, Suballocation::free(64, 32));
        let c = list.insert_after(b, Suballocation::free(96, 48));

        let mut index = FreeSizeIndex::new(16);
        index.register(&list, root);
        index.register(&list, b);
        index.register(&list, c);

        assert_eq!(sizes(&index, &list), vec![32, 48, 64]);
        assert_eq!(index.largest(), Some(root));
        assert_eq!(index.lower_bound(&list, 40), 1);
        assert_eq!(index.lower_bound(&list, 65), 3);
    }

    #[test]
    fn test_small_ranges_not_registered() {
        let mut list: SuballocationList<()> = SuballocationList::new(8);
        let root = list.first().unwrap();

        let mut index = FreeSizeIndex::new(16);
        assert_eq!(index.threshold(), 16);
        assert!(!index.tracks(8));
        index.register(&list, root);
        assert!(index.is_empty());

        // Unregistering an untracked range is a no-op.
        index.unregister(&list, root);
        assert!(index.is_empty());
    }

    #[test]
    fn test_unregister_among_equal_sizes() {
        let mut list: SuballocationList<()> = SuballocationList::new(32);
        let a = list.first().unwrap();
        let b = list.insert_after(a, Suballocation::free(32, 32));
        let c = list.insert_after(b, Suballocation::free(64, 32));

        let mut index = FreeSizeIndex::new(16);
        for id in [a, b, c] {
            index.register(&list, id);
        }

        index.unregister(&list, b);
        assert_eq!(index.len(), 2);
        assert!(!index.as_slice().contains(&b));
        index.unregister(&list, a);
        index.unregister(&list, c);
        assert!(index.is_empty());
    }

    #[test]
    #[should_panic(expected = "missing from size index")]
    fn test_unregister_unknown_panics() {
        let list: SuballocationList<()> = SuballocationList::new(32);
        let mut index = FreeSizeIndex::new(16);
        index.unregister(&list, list.first().unwrap());
    }
}
