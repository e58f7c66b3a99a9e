//! ChainedHashMap: bucket heads over one shared node list.
//!
//! Every entry lives in a single `NodeList`. Entries of the same bucket form a
//! contiguous run in that list and the `BucketIndex` remembers only where each
//! run starts. Lookup scans from the head of the key's bucket until the first
//! node that belongs elsewhere; insertion links the new node in front of its
//! bucket's head (or at the list front for an empty bucket); erasure moves the
//! head forward when needed. Rehash relinks the existing nodes under the new
//! bucket count, so positions of resident entries remain valid.

use crate::alloc::Global;
use crate::bucket_index::BucketIndex;
use crate::config::{buckets_for, check_load_factor, MapConfig};
use crate::error::{AllocError, MapError};
use crate::node_list::{Link, NodeKey, NodeList};
use allocator_api2::alloc::Allocator;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use hashbrown::hash_map::DefaultHashBuilder;

/// Opaque position of an entry, or of the end of the map.
///
/// Positions are plain copyable handles. A position stays valid until the
/// entry it names is erased, across any number of unrelated inserts, erasures
/// and rehashes. After that it never resolves again, even if its storage is
/// reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(pub(crate) Link);

impl Position {
    pub fn is_end(&self) -> bool {
        self.0 == Link::End
    }

    pub fn key<'a, K, V, S, A>(&self, map: &'a ChainedHashMap<K, V, S, A>) -> Option<&'a K>
    where
        A: Allocator,
    {
        map.entry_at(*self).map(|(k, _)| k)
    }

    pub fn value<'a, K, V, S, A>(&self, map: &'a ChainedHashMap<K, V, S, A>) -> Option<&'a V>
    where
        A: Allocator,
    {
        map.entry_at(*self).map(|(_, v)| v)
    }

    pub fn value_mut<'a, K, V, S, A>(
        &self,
        map: &'a mut ChainedHashMap<K, V, S, A>,
    ) -> Option<&'a mut V>
    where
        A: Allocator,
    {
        map.value_at_mut(*self)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
}

pub struct ChainedHashMap<K, V, S = DefaultHashBuilder, A: Allocator = Global> {
    pub(crate) hasher: S,
    pub(crate) buckets: BucketIndex,
    pub(crate) entries: NodeList<Entry<K, V>, A>,
    pub(crate) config: MapConfig,
}

impl<K, V> ChainedHashMap<K, V> {
    pub fn new() -> Self {
        Self::from_parts(MapConfig::default(), DefaultHashBuilder::default(), Global)
    }

    /// Empty map with enough buckets for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut m = Self::new();
        m.reserve(capacity);
        m
    }

    pub fn with_config(config: MapConfig) -> Result<Self, MapError> {
        Self::with_config_and_hasher_in(config, DefaultHashBuilder::default(), Global)
    }
}

impl<K, V> Default for ChainedHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainedHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(MapConfig::default(), hasher, Global)
    }
}

impl<K, V, A: Allocator> ChainedHashMap<K, V, DefaultHashBuilder, A> {
    /// Empty map whose node storage comes from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self::from_parts(MapConfig::default(), DefaultHashBuilder::default(), alloc)
    }
}

// Structural operations: none of these hash or compare keys.
impl<K, V, S, A: Allocator> ChainedHashMap<K, V, S, A> {
    pub fn with_config_and_hasher_in(
        config: MapConfig,
        hasher: S,
        alloc: A,
    ) -> Result<Self, MapError> {
        config.validate()?;
        Ok(Self::from_parts(config, hasher, alloc))
    }

    fn from_parts(config: MapConfig, hasher: S, alloc: A) -> Self {
        Self {
            hasher,
            buckets: BucketIndex::new(),
            entries: NodeList::new_in(alloc),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// `len / bucket_count`, or 0.0 before the first bucket exists.
    pub fn load_factor(&self) -> f64 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.len() as f64 / self.buckets.len() as f64
        }
    }

    pub fn max_load_factor(&self) -> f64 {
        self.config.max_load_factor
    }

    /// Takes effect on the next growth check; does not rehash by itself.
    pub fn set_max_load_factor(&mut self, factor: f64) -> Result<(), MapError> {
        check_load_factor(factor)?;
        self.config.max_load_factor = factor;
        Ok(())
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        self.entries.allocator()
    }

    pub fn begin(&self) -> Position {
        Position(self.entries.begin())
    }

    pub fn end(&self) -> Position {
        Position(self.entries.end())
    }

    /// Position after `pos`. `None` for a stale position; the end's successor
    /// is `end()` itself so traversal never wraps into the front.
    pub fn next(&self, pos: Position) -> Option<Position> {
        match pos.0 {
            Link::End => Some(pos),
            link => self.entries.next(link).map(Position),
        }
    }

    pub fn entry_at(&self, pos: Position) -> Option<(&K, &V)> {
        let e = self.entries.get(pos.0.node()?)?;
        Some((&e.key, &e.value))
    }

    pub fn value_at_mut(&mut self, pos: Position) -> Option<&mut V> {
        let e = self.entries.get_mut(pos.0.node()?)?;
        Some(&mut e.value)
    }

    /// Rebuild with at least `buckets` buckets.
    ///
    /// The request is raised to the smallest count that respects the max
    /// load factor; if that equals the current count nothing happens.
    /// Entries are relinked, not moved: positions stay valid, iteration order
    /// may change.
    pub fn rehash(&mut self, buckets: usize) {
        let buckets = buckets.max(buckets_for(self.len(), self.config.max_load_factor));
        if buckets == self.buckets.len() {
            return;
        }
        self.rebuild(buckets);
    }

    /// Make room for `entries` entries without exceeding the max load factor.
    pub fn reserve(&mut self, entries: usize) {
        self.rehash(buckets_for(entries, self.config.max_load_factor));
    }

    /// Shrink to the smallest bucket count the current length allows.
    pub fn shrink_to_fit(&mut self) {
        self.rehash(0);
    }

    // Drain the list in order and relink every node under `buckets` buckets
    // with the insertion placement rule. Runs no user code.
    fn rebuild(&mut self, buckets: usize) {
        let before = self.buckets.len();
        let order = self.entries.detach_all();
        self.buckets.reset(buckets);
        for key in order {
            let b = self.buckets.bucket_of(self.hash_of(key));
            let pos = self.placement(b);
            self.entries.relink_before(pos, key);
            self.buckets.set_head(b, Some(key));
        }
        log::debug!(
            "rehash: {} -> {} buckets, {} entries",
            before,
            buckets,
            self.len()
        );
    }

    fn hash_of(&self, key: NodeKey) -> u64 {
        self.entries
            .get(key)
            .map(|e| e.hash)
            .expect("linked node must be live")
    }

    // Where a new node of bucket `b` goes: before the bucket's head, or at the
    // list front when the bucket is empty.
    #[inline]
    fn placement(&self, bucket: usize) -> Link {
        match self.buckets.head(bucket) {
            Some(head) => Link::Node(head),
            None => self.entries.begin(),
        }
    }

    fn needs_growth(&self) -> bool {
        (self.len() + 1) as f64 > self.buckets.len() as f64 * self.config.max_load_factor
    }

    fn growth_target(&self) -> usize {
        let scaled = (self.buckets.len() as f64 * self.config.growth_factor).ceil() as usize;
        self.config
            .min_buckets
            .max(scaled)
            .max(buckets_for(self.len() + 1, self.config.max_load_factor))
    }

    // Unlink `key`, first handing its bucket head to the next node when that
    // node continues the same run.
    pub(crate) fn unlink(&mut self, key: NodeKey) -> Option<(Entry<K, V>, Link)> {
        let hash = self.entries.get(key)?.hash;
        let b = self.buckets.bucket_of(hash);
        if self.buckets.head(b) == Some(key) {
            let successor = match self.entries.next(Link::Node(key))? {
                Link::Node(n) if self.buckets.bucket_of(self.hash_of(n)) == b => Some(n),
                _ => None,
            };
            log::trace!("bucket {} head moves to {:?}", b, successor);
            self.buckets.set_head(b, successor);
        }
        self.entries.erase(key)
    }

    /// Erase the entry at `pos`, returning the position that followed it.
    /// `None` when `pos` is `end()` or stale.
    pub fn erase(&mut self, pos: Position) -> Option<Position> {
        let key = pos.0.node()?;
        self.unlink(key).map(|(_, next)| Position(next))
    }

    /// Like `erase`, but hands back the owned entry.
    pub fn remove_at(&mut self, pos: Position) -> Option<(K, V)> {
        let key = pos.0.node()?;
        self.unlink(key).map(|(e, _)| (e.key, e.value))
    }

    /// Erase `[first, last)` and return `last`. Stops early at a stale
    /// position or at the end, returning where it stopped.
    pub fn erase_range(&mut self, first: Position, last: Position) -> Position {
        let mut cur = first;
        while cur != last {
            match self.erase(cur) {
                Some(next) => cur = next,
                None => break,
            }
        }
        cur
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut cur = self.entries.begin();
        while let Link::Node(k) = cur {
            let retained = match self.entries.get_mut(k) {
                Some(e) => keep(&e.key, &mut e.value),
                None => break,
            };
            let next = if retained {
                self.entries.next(cur)
            } else {
                self.unlink(k).map(|(_, next)| next)
            };
            match next {
                Some(next) => cur = next,
                None => break,
            }
        }
    }

    /// Drop every entry. The bucket count is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.reset(self.buckets.len());
    }

    /// Number of entries in bucket `bucket`, found by walking its run.
    pub fn bucket_size(&self, bucket: usize) -> usize {
        if bucket >= self.buckets.len() {
            return 0;
        }
        let mut n = 0;
        let mut cur = self.buckets.head(bucket).map(Link::Node).unwrap_or(Link::End);
        while let Link::Node(k) = cur {
            match self.entries.get(k) {
                Some(e) if self.buckets.bucket_of(e.hash) == bucket => n += 1,
                _ => break,
            }
            cur = self.entries.next(cur).unwrap_or(Link::End);
        }
        n
    }

    /// Entry-by-entry comparison in iteration order.
    ///
    /// Two maps holding the same pairs can differ here when they were built in
    /// a different order or went through different rehashes; `==` compares
    /// contents only.
    pub fn iter_eq<S2, A2>(&self, other: &ChainedHashMap<K, V, S2, A2>) -> bool
    where
        K: PartialEq,
        V: PartialEq,
        A2: Allocator,
    {
        self.len() == other.len() && self.iter().eq(other.iter())
    }

    /// Copy through the same allocator; fails if it cannot supply `len()`
    /// more nodes.
    pub fn try_clone(&self) -> Result<Self, MapError>
    where
        K: Clone,
        V: Clone,
        S: Clone,
        A: Clone,
    {
        Ok(Self {
            hasher: self.hasher.clone(),
            buckets: self.buckets.clone(),
            entries: self.entries.try_clone()?,
            config: self.config,
        })
    }

    /// Check the list ring, bucket heads, run contiguity and size accounting.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        use std::collections::HashSet;

        self.entries.assert_linked();
        assert_eq!(self.iter().count(), self.len(), "size accounting");
        if self.buckets.is_empty() {
            assert!(self.is_empty(), "entries without buckets");
            return;
        }
        for (b, head) in self.buckets.heads() {
            assert_eq!(
                self.buckets.bucket_of(self.hash_of(head)),
                b,
                "head of bucket {b} hashes elsewhere"
            );
        }
        let mut finished: HashSet<usize> = HashSet::new();
        let mut current: Option<usize> = None;
        for (key, e) in self.entries.iter() {
            let b = self.buckets.bucket_of(e.hash);
            if current != Some(b) {
                if let Some(prev) = current {
                    finished.insert(prev);
                }
                assert!(!finished.contains(&b), "bucket {b} is split into two runs");
                assert_eq!(self.buckets.head(b), Some(key), "run of {b} starts at its head");
                current = Some(b);
            }
        }
        if let Some(last) = current {
            finished.insert(last);
        }
        for b in 0..self.buckets.len() {
            assert_eq!(
                self.buckets.head(b).is_some(),
                finished.contains(&b),
                "bucket {b} head does not match its run"
            );
        }
    }
}

// Operations that hash or compare keys.
impl<K, V, S, A> ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    // Scan the run of `hash`'s bucket. Relies on run contiguity: the first
    // node of another bucket (or the end) ends the search.
    fn find_hashed<Q>(&self, hash: u64, q: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let b = self.buckets.bucket_of(hash);
        let mut cur = self.buckets.head(b)?;
        loop {
            let e = self.entries.get(cur)?;
            if self.buckets.bucket_of(e.hash) != b {
                return None;
            }
            if e.hash == hash && e.key.borrow() == q {
                return Some(cur);
            }
            cur = self.entries.next(Link::Node(cur))?.node()?;
        }
    }

    /// Position of `q`, or `None` on a miss.
    pub fn find<Q>(&self, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_hashed(hash, q).map(|k| Position(Link::Node(k)))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.find(q)?;
        self.entry_at(pos)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.find(q)?;
        self.value_at_mut(pos)
    }

    /// Like `get`, but a miss is an error.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(MapError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(MapError::KeyNotFound)
    }

    /// Bucket `q` would live in, or `None` before the first bucket exists.
    pub fn bucket_of<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        if self.buckets.is_empty() {
            return None;
        }
        Some(self.buckets.bucket_of(self.make_hash(q)))
    }

    /// Insert unless the key is present, building the value only when it is
    /// actually inserted. Returns the entry's position and whether it is new.
    ///
    /// The capacity check comes first: an insert at the growth threshold
    /// grows the table even when the key turns out to be present.
    ///
    /// Failure of the node allocator or of `make` leaves the map exactly as
    /// it was, bucket count included. For a new key growth happens after the
    /// node exists: the node is parked at the list front and the rebuild
    /// under the new bucket count places it together with every other entry.
    pub fn try_emplace_with<E, F>(&mut self, key: K, make: F) -> Result<(Position, bool), E>
    where
        F: FnOnce() -> Result<V, E>,
        E: From<AllocError>,
    {
        let hash = self.make_hash(&key);
        let grow_to = self.needs_growth().then(|| self.growth_target());
        if let Some(found) = self.find_hashed(hash, &key) {
            if let Some(target) = grow_to {
                self.rebuild(target);
            }
            return Ok((Position(Link::Node(found)), false));
        }
        let make_entry = move || make().map(|value| Entry { key, value, hash });
        let node = if let Some(target) = grow_to {
            log::trace!(
                "growth: {} entries over {} buckets exceeds {}, target {}",
                self.len() + 1,
                self.buckets.len(),
                self.config.max_load_factor,
                target
            );
            let front = self.entries.begin();
            let node = self.entries.try_insert_before_with(front, make_entry)?;
            self.rebuild(target);
            node
        } else {
            let b = self.buckets.bucket_of(hash);
            let pos = self.placement(b);
            let node = self.entries.try_insert_before_with(pos, make_entry)?;
            self.buckets.set_head(b, Some(node));
            node
        };
        Ok((Position(Link::Node(node)), true))
    }

    pub fn try_insert(&mut self, key: K, value: V) -> Result<(Position, bool), MapError> {
        self.try_emplace_with(key, || Ok(value))
    }

    /// Insert unless the key is present; an existing value is left alone.
    ///
    /// Panics if the node allocator is exhausted; see `try_insert`.
    pub fn insert(&mut self, key: K, value: V) -> (Position, bool) {
        match self.try_insert(key, value) {
            Ok(r) => r,
            Err(e) => panic!("ChainedHashMap::insert: {e}"),
        }
    }

    /// `insert` with a lazily built value.
    pub fn emplace_with<F>(&mut self, key: K, make: F) -> (Position, bool)
    where
        F: FnOnce() -> V,
    {
        match self.try_emplace_with::<MapError, _>(key, || Ok(make())) {
            Ok(r) => r,
            Err(e) => panic!("ChainedHashMap::emplace_with: {e}"),
        }
    }

    /// Insert, overwriting an existing value. Returns the previous value.
    pub fn insert_or_replace(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(&key) {
            return Some(core::mem::replace(slot, value));
        }
        self.insert(key, value);
        None
    }

    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let (pos, _) = self.emplace_with(key, make);
        self.value_at_mut(pos)
            .expect("entry must exist right after emplace")
    }

    /// Look up `key`, inserting `V::default()` on a miss.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.find(q)?;
        self.remove_at(pos)
    }
}

impl<K, V, S, A> Clone for ChainedHashMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: Allocator + Clone,
{
    /// Panics if the allocator cannot supply the nodes; see `try_clone`.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(m) => m,
            Err(e) => panic!("ChainedHashMap::clone: {e}"),
        }
    }
}

impl<K, V, S, A> fmt::Debug for ChainedHashMap<K, V, S, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Content equality: same length and every pair of `self` present in
/// `other`. Iteration order is ignored; see `iter_eq` for the ordered form.
impl<K, V, S, A> PartialEq for ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
    A: Allocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, S, A> Eq for ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
    A: Allocator,
{
}

impl<K, Q, V, S, A> Index<&Q> for ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
    A: Allocator,
{
    type Output = V;

    /// Panics if the key is missing; use `at` for a fallible lookup.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in ChainedHashMap")
    }
}

impl<K, V, S, A> Extend<(K, V)> for ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S, A> FromIterator<(K, V)> for ChainedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    A: Allocator + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::from_parts(MapConfig::default(), S::default(), A::default());
        m.extend(iter);
        m
    }
}
