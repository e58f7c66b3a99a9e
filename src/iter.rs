//! Iteration over `ChainedHashMap` in list order.
//!
//! Borrowing iterators (`Iter`, `IterMut`, `Keys`, `Values`, `ValuesMut`),
//! the owning `IntoIter`, and positional cursors. `CursorMut` converts into
//! `Cursor`; there is no way back.

use crate::alloc::Global;
use crate::chained_hash_map::{ChainedHashMap, Entry, Position};
use crate::node_list::{IntoOrdered, ListIter, ListIterMut};
use allocator_api2::alloc::Allocator;

impl<K, V, S, A: Allocator> ChainedHashMap<K, V, S, A> {
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter {
            it: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.entries.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys { it: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values { it: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut { it: self.iter_mut() }
    }

    /// Read-only cursor at `pos`.
    pub fn cursor(&self, pos: Position) -> Cursor<'_, K, V, S, A> {
        Cursor { map: self, pos }
    }

    pub fn cursor_front(&self) -> Cursor<'_, K, V, S, A> {
        self.cursor(self.begin())
    }

    pub fn cursor_mut(&mut self, pos: Position) -> CursorMut<'_, K, V, S, A> {
        CursorMut { map: self, pos }
    }

    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, K, V, S, A> {
        let pos = self.begin();
        self.cursor_mut(pos)
    }
}

pub struct Iter<'a, K, V, A: Allocator> {
    it: ListIter<'a, Entry<K, V>, A>,
}

impl<'a, K, V, A: Allocator> Clone for Iter<'a, K, V, A> {
    fn clone(&self) -> Self {
        Self {
            it: self.it.clone(),
        }
    }
}

impl<'a, K, V, A: Allocator> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<'a, K, V, A: Allocator> ExactSizeIterator for Iter<'a, K, V, A> {}

pub struct IterMut<'a, K, V> {
    it: ListIterMut<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}

pub struct Keys<'a, K, V, A: Allocator> {
    it: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Keys<'a, K, V, A> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.it.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct Values<'a, K, V, A: Allocator> {
    it: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Values<'a, K, V, A> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.it.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct ValuesMut<'a, K, V> {
    it: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.it.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Owning iterator; entries come out in list order.
///
/// Node storage is handed back to the map's allocator when the iterator is
/// dropped, after the remaining entries have been dropped.
pub struct IntoIter<K, V, A: Allocator = Global> {
    it: IntoOrdered<Entry<K, V>, A>,
}

impl<K, V, A: Allocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.it.next().map(|e| (e.key, e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IntoIter<K, V, A> {}

impl<K, V, S, A: Allocator> IntoIterator for ChainedHashMap<K, V, S, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    fn into_iter(self) -> IntoIter<K, V, A> {
        IntoIter {
            it: self.entries.into_ordered(),
        }
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a ChainedHashMap<K, V, S, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator> IntoIterator for &'a mut ChainedHashMap<K, V, S, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Read-only position walker over a map.
pub struct Cursor<'a, K, V, S, A: Allocator> {
    map: &'a ChainedHashMap<K, V, S, A>,
    pos: Position,
}

impl<'a, K, V, S, A: Allocator> Clone for Cursor<'a, K, V, S, A> {
    fn clone(&self) -> Self {
        Self {
            map: self.map,
            pos: self.pos,
        }
    }
}

impl<'a, K, V, S, A: Allocator> Cursor<'a, K, V, S, A> {
    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos.is_end()
    }

    pub fn key(&self) -> Option<&'a K> {
        self.pos.key(self.map)
    }

    pub fn value(&self) -> Option<&'a V> {
        self.pos.value(self.map)
    }

    pub fn entry(&self) -> Option<(&'a K, &'a V)> {
        self.map.entry_at(self.pos)
    }

    /// Step forward; stays on the end once there. Returns false if the
    /// current position is stale.
    pub fn move_next(&mut self) -> bool {
        match self.map.next(self.pos) {
            Some(next) => {
                self.pos = next;
                true
            }
            None => false,
        }
    }
}

/// Position walker that can edit and erase entries.
pub struct CursorMut<'a, K, V, S, A: Allocator> {
    map: &'a mut ChainedHashMap<K, V, S, A>,
    pos: Position,
}

impl<'a, K, V, S, A: Allocator> CursorMut<'a, K, V, S, A> {
    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos.is_end()
    }

    pub fn key(&self) -> Option<&K> {
        self.pos.key(self.map)
    }

    pub fn value(&self) -> Option<&V> {
        self.pos.value(self.map)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.map.value_at_mut(self.pos)
    }

    pub fn move_next(&mut self) -> bool {
        match self.map.next(self.pos) {
            Some(next) => {
                self.pos = next;
                true
            }
            None => false,
        }
    }

    /// Erase the current entry and move to the one that followed it.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let key = self.pos.0.node()?;
        let (entry, next) = self.map.unlink(key)?;
        self.pos = Position(next);
        Some((entry.key, entry.value))
    }

    pub fn as_cursor(&self) -> Cursor<'_, K, V, S, A> {
        Cursor {
            map: &*self.map,
            pos: self.pos,
        }
    }

    pub fn into_cursor(self) -> Cursor<'a, K, V, S, A> {
        Cursor {
            map: self.map,
            pos: self.pos,
        }
    }
}

impl<'a, K, V, S, A: Allocator> From<CursorMut<'a, K, V, S, A>> for Cursor<'a, K, V, S, A> {
    fn from(c: CursorMut<'a, K, V, S, A>) -> Self {
        c.into_cursor()
    }
}

impl<'a, K, V, S, A: Allocator> PartialEq for Cursor<'a, K, V, S, A> {
    /// Same map, same position.
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.map, other.map) && self.pos == other.pos
    }
}
