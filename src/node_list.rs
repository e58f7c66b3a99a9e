//! NodeList: arena-backed circular doubly-linked list with a sentinel.
//!
//! Nodes live in one slot vector whose buffer comes from the list's
//! allocator, and link to each other through generational keys. Vacant slots
//! form a free list and are reused before the vector grows; a slot's version
//! is bumped on every reuse so keys of erased nodes never resolve again. The
//! sentinel is not stored in the arena; its `next`/`prev` links are the
//! list's `head`/`tail` fields and it is addressed as `Link::End`. An empty
//! list is the sentinel linked to itself (`head == tail == End`).
//!
//! Keys handed out by the list stay valid across any insertion or removal
//! other than the removal of that node, including `detach_all`/`relink_before`
//! cycles, which move links but never move nodes between slots.

use crate::error::AllocError;
use allocator_api2::alloc::Allocator;
use allocator_api2::vec::Vec as SlotVec;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeKey {
    index: u32,
    version: u32,
}

impl NodeKey {
    #[cfg(test)]
    pub(crate) fn from_raw(index: u32, version: u32) -> Self {
        Self { index, version }
    }
}

/// A position in the list: a data node or the sentinel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Link {
    End,
    Node(NodeKey),
}

impl Link {
    #[inline]
    pub(crate) fn node(self) -> Option<NodeKey> {
        match self {
            Link::End => None,
            Link::Node(k) => Some(k),
        }
    }
}

#[derive(Clone, Debug)]
struct Node<T> {
    prev: Link,
    next: Link,
    value: T,
}

#[derive(Clone, Debug)]
enum Slot<T> {
    Occupied { version: u32, node: Node<T> },
    Vacant { version: u32, next_free: Option<u32> },
}

impl<T> Slot<T> {
    fn version(&self) -> u32 {
        match *self {
            Slot::Occupied { version, .. } | Slot::Vacant { version, .. } => version,
        }
    }
}

pub(crate) struct NodeList<T, A: Allocator> {
    slots: SlotVec<Slot<T>, A>,
    free: Option<u32>,
    len: usize,
    head: Link,
    tail: Link,
}

impl<T, A: Allocator> NodeList<T, A> {
    pub(crate) fn new_in(alloc: A) -> Self {
        Self {
            slots: SlotVec::new_in(alloc),
            free: None,
            len: 0,
            head: Link::End,
            tail: Link::End,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn allocator(&self) -> &A {
        self.slots.allocator()
    }

    #[inline]
    pub(crate) fn begin(&self) -> Link {
        self.head
    }

    #[inline]
    pub(crate) fn end(&self) -> Link {
        Link::End
    }

    #[inline]
    fn node(&self, key: NodeKey) -> Option<&Node<T>> {
        match self.slots.get(key.index as usize)? {
            Slot::Occupied { version, node } if *version == key.version => Some(node),
            _ => None,
        }
    }

    #[inline]
    fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node<T>> {
        match self.slots.get_mut(key.index as usize)? {
            Slot::Occupied { version, node } if *version == key.version => Some(node),
            _ => None,
        }
    }

    // For keys reached through links, which are live by construction.
    fn linked_mut(&mut self, key: NodeKey) -> &mut Node<T> {
        self.node_mut(key).expect("linked node must be live")
    }

    #[inline]
    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.node(key).is_some()
    }

    /// Whether `link` can be used as a position (sentinel or live node).
    #[inline]
    pub(crate) fn is_valid(&self, link: Link) -> bool {
        match link {
            Link::End => true,
            Link::Node(k) => self.contains(k),
        }
    }

    /// Successor of `link`; the sentinel's successor is the first node.
    /// `None` for a stale key.
    #[inline]
    pub(crate) fn next(&self, link: Link) -> Option<Link> {
        match link {
            Link::End => Some(self.head),
            Link::Node(k) => self.node(k).map(|n| n.next),
        }
    }

    #[cfg(test)]
    pub(crate) fn prev(&self, link: Link) -> Option<Link> {
        match link {
            Link::End => Some(self.tail),
            Link::Node(k) => self.node(k).map(|n| n.prev),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: NodeKey) -> Option<&T> {
        self.node(key).map(|n| &n.value)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut T> {
        self.node_mut(key).map(|n| &mut n.value)
    }

    fn set_next(&mut self, at: Link, to: Link) {
        match at {
            Link::End => self.head = to,
            Link::Node(k) => self.linked_mut(k).next = to,
        }
    }

    fn set_prev(&mut self, at: Link, to: Link) {
        match at {
            Link::End => self.tail = to,
            Link::Node(k) => self.linked_mut(k).prev = to,
        }
    }

    // `key` must be live and not currently linked; `pos` must be valid.
    fn link_before(&mut self, pos: Link, key: NodeKey) {
        let prev = match pos {
            Link::End => self.tail,
            Link::Node(k) => self.linked_mut(k).prev,
        };
        {
            let node = self.linked_mut(key);
            node.prev = prev;
            node.next = pos;
        }
        self.set_next(prev, Link::Node(key));
        self.set_prev(pos, Link::Node(key));
    }

    /// Make sure the next `occupy` needs no allocation.
    fn reserve_slot(&mut self) -> Result<(), AllocError> {
        if self.free.is_some() {
            return Ok(());
        }
        if self.slots.len() >= u32::MAX as usize {
            return Err(AllocError { nodes: 1 });
        }
        self.slots
            .try_reserve(1)
            .map_err(|_| AllocError { nodes: 1 })
    }

    // Place `node` in a vacant slot, or push one; `reserve_slot` must have
    // succeeded first.
    fn occupy(&mut self, node: Node<T>) -> NodeKey {
        match self.free {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let (version, next_free) = match *slot {
                    Slot::Vacant { version, next_free } => (version.wrapping_add(1), next_free),
                    Slot::Occupied { .. } => unreachable!("free list points at a live slot"),
                };
                *slot = Slot::Occupied { version, node };
                self.free = next_free;
                NodeKey { index, version }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { version: 0, node });
                NodeKey { index, version: 0 }
            }
        }
    }

    fn vacate(&mut self, key: NodeKey) -> Option<Node<T>> {
        self.node(key)?;
        let vacant = Slot::Vacant {
            version: key.version,
            next_free: self.free,
        };
        let old = core::mem::replace(&mut self.slots[key.index as usize], vacant);
        self.free = Some(key.index);
        match old {
            Slot::Occupied { node, .. } => Some(node),
            Slot::Vacant { .. } => None,
        }
    }

    /// Construct a node right before `pos`.
    ///
    /// Room for the node is secured before `make` runs. If either step fails
    /// nothing is linked and the list's contents are exactly as they were.
    pub(crate) fn try_insert_before_with<E, F>(&mut self, pos: Link, make: F) -> Result<NodeKey, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<AllocError>,
    {
        debug_assert!(self.is_valid(pos), "insert position is stale");
        self.reserve_slot()?;
        let value = make()?;
        let key = self.occupy(Node {
            prev: Link::End,
            next: Link::End,
            value,
        });
        self.link_before(pos, key);
        self.len += 1;
        Ok(key)
    }

    #[cfg(test)]
    pub(crate) fn insert_before(&mut self, pos: Link, value: T) -> Result<NodeKey, AllocError> {
        self.try_insert_before_with(pos, || Ok(value))
    }

    /// Unlink and destroy `key`, returning its value and the position that
    /// followed it. `None` if the key is stale.
    pub(crate) fn erase(&mut self, key: NodeKey) -> Option<(T, Link)> {
        let (prev, next) = {
            let node = self.node(key)?;
            (node.prev, node.next)
        };
        self.set_next(prev, next);
        self.set_prev(next, prev);
        let node = self.vacate(key)?;
        self.len -= 1;
        Some((node.value, next))
    }

    /// Unlink every node without freeing any, returning the keys in
    /// front-to-back order. The list reads as empty until the nodes are put
    /// back with `relink_before`; `len()` still counts them.
    pub(crate) fn detach_all(&mut self) -> Vec<NodeKey> {
        let mut order = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Link::Node(k) = cur {
            order.push(k);
            cur = self.linked_mut(k).next;
        }
        self.head = Link::End;
        self.tail = Link::End;
        order
    }

    /// Link a node previously returned by `detach_all` before `pos`.
    pub(crate) fn relink_before(&mut self, pos: Link, key: NodeKey) {
        debug_assert!(self.contains(key));
        self.link_before(pos, key);
    }

    /// Drop every value. Slots are kept (with their versions) for reuse.
    pub(crate) fn clear(&mut self) {
        let mut free = None;
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            let version = slot.version();
            *slot = Slot::Vacant {
                version,
                next_free: free,
            };
            free = Some(index as u32);
        }
        self.free = free;
        self.len = 0;
        self.head = Link::End;
        self.tail = Link::End;
    }

    pub(crate) fn iter(&self) -> ListIter<'_, T, A> {
        ListIter {
            list: self,
            cur: self.head,
            remaining: self.len,
        }
    }

    /// Mutable traversal in list order.
    ///
    /// The arena is split into disjoint `(next, &mut value)` pairs up front so
    /// the walk needs no aliasing tricks. That costs one heap allocation of
    /// one entry per arena slot for every call.
    pub(crate) fn iter_mut(&mut self) -> ListIterMut<'_, T> {
        let parts: Vec<Option<(Link, &mut T)>> = self
            .slots
            .iter_mut()
            .map(|slot| match slot {
                Slot::Occupied { node, .. } => Some((node.next, &mut node.value)),
                Slot::Vacant { .. } => None,
            })
            .collect();
        ListIterMut {
            parts,
            cur: self.head,
            remaining: self.len,
        }
    }

    /// Consume the list, yielding values front to back. The arena buffer goes
    /// back to the allocator when the returned iterator is dropped, after
    /// every value has been yielded or dropped.
    pub(crate) fn into_ordered(self) -> IntoOrdered<T, A> {
        IntoOrdered {
            slots: self.slots,
            cur: self.head,
            remaining: self.len,
        }
    }

    /// Clone through the same allocator, preserving keys and links.
    pub(crate) fn try_clone(&self) -> Result<Self, AllocError>
    where
        T: Clone,
        A: Clone,
    {
        let mut slots = SlotVec::new_in(self.allocator().clone());
        slots
            .try_reserve_exact(self.slots.len())
            .map_err(|_| AllocError { nodes: self.len })?;
        slots.extend(self.slots.iter().cloned());
        Ok(Self {
            slots,
            free: self.free,
            len: self.len,
            head: self.head,
            tail: self.tail,
        })
    }

    /// Panics unless the ring is closed through the sentinel and every node
    /// is reachable exactly once.
    #[cfg(test)]
    pub(crate) fn assert_linked(&self) {
        let mut seen = 0usize;
        let mut cur = Link::End;
        loop {
            let next = self.next(cur).expect("live link");
            assert_eq!(self.prev(next), Some(cur), "prev(next(n)) != n");
            if next == Link::End {
                break;
            }
            seen += 1;
            assert!(seen <= self.len(), "cycle that skips the sentinel");
            cur = next;
        }
        assert_eq!(seen, self.len());
        let occupied = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied { .. }))
            .count();
        assert_eq!(occupied, self.len(), "occupied slots vs len");
    }
}

pub(crate) struct ListIter<'a, T, A: Allocator> {
    list: &'a NodeList<T, A>,
    cur: Link,
    remaining: usize,
}

impl<'a, T, A: Allocator> Clone for ListIter<'a, T, A> {
    fn clone(&self) -> Self {
        Self {
            list: self.list,
            cur: self.cur,
            remaining: self.remaining,
        }
    }
}

impl<'a, T, A: Allocator> Iterator for ListIter<'a, T, A> {
    type Item = (NodeKey, &'a T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur.node()?;
        let node = self.list.node(k)?;
        self.cur = node.next;
        self.remaining -= 1;
        Some((k, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

pub(crate) struct ListIterMut<'a, T> {
    parts: Vec<Option<(Link, &'a mut T)>>,
    cur: Link,
    remaining: usize,
}

impl<'a, T> Iterator for ListIterMut<'a, T> {
    type Item = (NodeKey, &'a mut T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur.node()?;
        let (next, value) = self.parts.get_mut(k.index as usize)?.take()?;
        self.cur = next;
        self.remaining -= 1;
        Some((k, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

pub(crate) struct IntoOrdered<T, A: Allocator> {
    slots: SlotVec<Slot<T>, A>,
    cur: Link,
    remaining: usize,
}

impl<T, A: Allocator> Iterator for IntoOrdered<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let k = self.cur.node()?;
        let slot = self.slots.get_mut(k.index as usize)?;
        let vacant = Slot::Vacant {
            version: k.version,
            next_free: None,
        };
        match core::mem::replace(slot, vacant) {
            Slot::Occupied { node, .. } => {
                self.cur = node.next;
                self.remaining -= 1;
                Some(node.value)
            }
            Slot::Vacant { .. } => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{Global, NodePool};

    fn values<T: Clone, A: Allocator>(l: &NodeList<T, A>) -> std::vec::Vec<T> {
        l.iter().map(|(_, v)| v.clone()).collect()
    }

    #[test]
    fn empty_list_is_sentinel_ring() {
        let l: NodeList<i32, Global> = NodeList::new_in(Global);
        assert!(l.is_empty());
        assert_eq!(l.begin(), l.end());
        assert_eq!(l.next(Link::End), Some(Link::End));
        assert_eq!(l.prev(Link::End), Some(Link::End));
        l.assert_linked();
    }

    /// Invariant: insert_before places the value immediately before the
    /// position, for both interior nodes and the sentinel.
    #[test]
    fn insert_before_orders_values() {
        let mut l = NodeList::new_in(Global);
        let b = l.insert_before(Link::End, 'b').unwrap();
        l.insert_before(Link::End, 'd').unwrap();
        l.insert_before(Link::Node(b), 'a').unwrap();
        let d = l.prev(Link::End).unwrap();
        l.insert_before(d, 'c').unwrap();
        assert_eq!(values(&l), vec!['a', 'b', 'c', 'd']);
        l.assert_linked();
    }

    /// Invariant: erasing one node leaves every other key valid and returns
    /// the following position.
    #[test]
    fn erase_keeps_other_keys() {
        let mut l = NodeList::new_in(Global);
        let keys: std::vec::Vec<_> = (0..5)
            .map(|i| l.insert_before(Link::End, i).unwrap())
            .collect();
        let (v, next) = l.erase(keys[2]).unwrap();
        assert_eq!(v, 2);
        assert_eq!(next, Link::Node(keys[3]));
        assert!(l.get(keys[2]).is_none());
        for &i in &[0usize, 1, 3, 4] {
            assert_eq!(l.get(keys[i]), Some(&(i as i32)));
        }
        assert!(l.erase(keys[2]).is_none(), "stale key must not erase twice");
        let (_, next) = l.erase(keys[4]).unwrap();
        assert_eq!(next, Link::End);
        assert_eq!(values(&l), vec![0, 1, 3]);
        l.assert_linked();
    }

    /// Invariant: a reused slot gets a new version; the erased node's key
    /// stays dead.
    #[test]
    fn reused_slot_does_not_revive_old_key() {
        let mut l = NodeList::new_in(Global);
        let old = l.insert_before(Link::End, 1).unwrap();
        l.erase(old).unwrap();
        let new = l.insert_before(Link::End, 2).unwrap();
        assert_ne!(old, new);
        assert!(l.get(old).is_none());
        assert_eq!(l.get(new), Some(&2));

        l.clear();
        let after_clear = l.insert_before(Link::End, 3).unwrap();
        assert!(l.get(new).is_none(), "clear keeps versions");
        assert_eq!(l.get(after_clear), Some(&3));
        l.assert_linked();
    }

    /// Invariant: detach/relink keeps keys stable and rebuilds any order.
    #[test]
    fn detach_and_relink_preserves_keys() {
        let mut l = NodeList::new_in(Global);
        let keys: std::vec::Vec<_> = (0..4)
            .map(|i| l.insert_before(Link::End, i).unwrap())
            .collect();
        let order = l.detach_all();
        assert_eq!(order, keys);
        assert_eq!(l.begin(), Link::End);
        for k in order {
            let front = l.begin();
            l.relink_before(front, k);
        }
        assert_eq!(values(&l), vec![3, 2, 1, 0]);
        assert_eq!(l.get(keys[1]), Some(&1));
        l.assert_linked();
    }

    /// Invariant: storage refusal or constructor failure leaves the list
    /// unchanged.
    #[test]
    fn failed_insert_is_a_no_op() {
        let pool = NodePool::with_capacity(0);
        let mut l: NodeList<u64, NodePool> = NodeList::new_in(pool.clone());
        assert_eq!(l.insert_before(Link::End, 2), Err(AllocError { nodes: 1 }));
        assert!(l.is_empty());
        assert_eq!(pool.used(), 0);

        let mut l2: NodeList<i32, Global> = NodeList::new_in(Global);
        l2.insert_before(Link::End, 1).unwrap();
        let r: Result<NodeKey, crate::MapError> =
            l2.try_insert_before_with(Link::End, || Err(crate::MapError::KeyNotFound));
        assert!(r.is_err());
        assert_eq!(values(&l2), vec![1]);
        l2.assert_linked();
    }

    /// Invariant: node storage is drawn from the list's allocator and goes
    /// back to it when the list drops.
    #[test]
    fn nodes_live_in_the_pool() {
        let pool = NodePool::with_capacity(4096);
        {
            let mut l = NodeList::new_in(pool.clone());
            for i in 0..3u64 {
                l.insert_before(Link::End, i).unwrap();
            }
            let per_node = core::mem::size_of::<Slot<u64>>();
            assert!(pool.used() >= 3 * per_node);
            l.clear();
            assert!(pool.used() >= 3 * per_node, "clear keeps slots for reuse");
            l.insert_before(Link::End, 9).unwrap();
        }
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn iter_mut_follows_links_after_churn() {
        let mut l = NodeList::new_in(Global);
        let keys: std::vec::Vec<_> = (0..6)
            .map(|i| l.insert_before(Link::End, i * 10).unwrap())
            .collect();
        l.erase(keys[1]).unwrap();
        l.erase(keys[4]).unwrap();
        // Reuses the freed slots; list order now differs from slot order.
        l.insert_before(Link::Node(keys[0]), -1).unwrap();
        l.insert_before(Link::Node(keys[3]), 25).unwrap();
        let it = l.iter_mut();
        assert_eq!(it.size_hint(), (6, Some(6)));
        for (_, v) in it {
            *v += 1;
        }
        assert_eq!(values(&l), vec![0, 1, 21, 26, 31, 51]);
        l.assert_linked();
    }

    /// Invariant: the owning walk keeps the arena until the iterator drops.
    #[test]
    fn into_ordered_releases_storage_on_drop() {
        let pool = NodePool::with_capacity(4096);
        let mut l = NodeList::new_in(pool.clone());
        let first = l.insert_before(Link::End, 10u64).unwrap();
        l.insert_before(Link::End, 30).unwrap();
        l.insert_before(Link::Node(first), 0).unwrap();
        let used = pool.used();
        let mut it = l.into_ordered();
        assert_eq!(it.next(), Some(0));
        assert_eq!(pool.used(), used, "storage stays while values are alive");
        assert_eq!(it.size_hint(), (2, Some(2)));
        assert_eq!(it.by_ref().collect::<std::vec::Vec<_>>(), vec![10, 30]);
        drop(it);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn try_clone_allocates_from_the_same_pool() {
        let pool = NodePool::with_capacity(4096);
        let mut l = NodeList::new_in(pool.clone());
        for i in 0..3u64 {
            l.insert_before(Link::End, i).unwrap();
        }
        l.erase(l.begin().node().unwrap()).unwrap();
        let before = pool.used();
        let c = l.try_clone().unwrap();
        assert_eq!(values(&c), vec![1, 2]);
        assert!(pool.used() > before);
        c.assert_linked();

        let tiny = NodePool::with_capacity(0);
        let t: NodeList<u64, NodePool> = NodeList::new_in(tiny);
        assert!(t.try_clone().is_ok(), "cloning an empty list needs no storage");
    }
}
