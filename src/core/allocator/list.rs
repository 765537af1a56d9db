//! Offset-ordered list of suballocations
//!
//! A doubly linked list threaded through an [`Arena`], so splitting and
//! merging never move a node and ids held by the free-size index stay valid.

use crate::allocator::arena::{Arena, NodeId};
use crate::allocator::suballocation::SuballocationType;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// One contiguous byte range of a block
#[derive(Debug)]
pub struct Suballocation<H> {
    offset: u64,
    size: u64,
    ty: SuballocationType,
    handle: Option<Arc<H>>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<H> Suballocation<H> {
    pub(crate) fn free(offset: u64, size: u64) -> Self {
        Suballocation {
            offset,
            size,
            ty: SuballocationType::Free,
            handle: None,
            prev: None,
            next: None,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn ty(&self) -> SuballocationType {
        self.ty
    }

    pub fn is_free(&self) -> bool {
        self.ty.is_free()
    }

    pub fn handle(&self) -> Option<&Arc<H>> {
        self.handle.as_ref()
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.end()
    }

    /// Turn this range into an occupied one
    pub(crate) fn occupy(&mut self, offset: u64, size: u64, ty: SuballocationType, handle: Arc<H>) {
        debug_assert!(!ty.is_free());
        self.offset = offset;
        self.size = size;
        self.ty = ty;
        self.handle = Some(handle);
    }

    /// Drop the handle and mark the range free, returning the old handle
    pub(crate) fn release(&mut self) -> Option<Arc<H>> {
        self.ty = SuballocationType::Free;
        self.handle.take()
    }

    pub(crate) fn grow(&mut self, bytes: u64) {
        self.size += bytes;
    }
}

#[derive(Debug)]
pub struct SuballocationList<H> {
    nodes: Arena<Suballocation<H>>,
    first: Option<NodeId>,
    last: Option<NodeId>,
}

impl<H> SuballocationList<H> {
    /// A list holding a single free range `[0, size)`
    pub fn new(size: u64) -> Self {
        let mut nodes = Arena::with_capacity(16);
        let root = nodes.insert(Suballocation::free(0, size));
        SuballocationList {
            nodes,
            first: Some(root),
            last: Some(root),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub fn get(&self, id: NodeId) -> Option<&Suballocation<H>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self[id].next
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self[id].prev
    }

    /// Insert `value` directly after `id`
    pub fn insert_after(&mut self, id: NodeId, mut value: Suballocation<H>) -> NodeId {
        let next = self[id].next;
        value.prev = Some(id);
        value.next = next;
        let new_id = self.nodes.insert(value);

        self[id].next = Some(new_id);
        match next {
            Some(next) => self[next].prev = Some(new_id),
            None => self.last = Some(new_id),
        }
        new_id
    }

    /// Insert `value` directly before `id`
    pub fn insert_before(&mut self, id: NodeId, mut value: Suballocation<H>) -> NodeId {
        let prev = self[id].prev;
        value.prev = prev;
        value.next = Some(id);
        let new_id = self.nodes.insert(value);

        self[id].prev = Some(new_id);
        match prev {
            Some(prev) => self[prev].next = Some(new_id),
            None => self.first = Some(new_id),
        }
        new_id
    }

    /// Unlink and return the node
    pub fn remove(&mut self, id: NodeId) -> Suballocation<H> {
        let (prev, next) = {
            let node = &self[id];
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self[prev].next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => self[next].prev = prev,
            None => self.last = prev,
        }

        match self.nodes.remove(id) {
            Some(node) => node,
            None => panic!("stale suballocation id {:?}", id),
        }
    }

    /// Walk the list in ascending offset order
    pub fn iter(&self) -> Iter<'_, H> {
        Iter {
            list: self,
            cursor: self.first,
        }
    }
}

impl<H> Index<NodeId> for SuballocationList<H> {
    type Output = Suballocation<H>;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.nodes.get(id) {
            Some(node) => node,
            None => panic!("stale suballocation id {:?}", id),
        }
    }
}

impl<H> IndexMut<NodeId> for SuballocationList<H> {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.nodes.get_mut(id) {
            Some(node) => node,
            None => panic!("stale suballocation id {:?}", id),
        }
    }
}

pub struct Iter<'a, H> {
    list: &'a SuballocationList<H>,
    cursor: Option<NodeId>,
}

impl<'a, H> Iterator for Iter<'a, H> {
    type Item = (NodeId, &'a Suballocation<H>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let list = self.list;
        let node = &list[id];
        self.cursor = node.next;
        Some((id, node))
    }
}
