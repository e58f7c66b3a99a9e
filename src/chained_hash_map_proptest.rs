#![cfg(test)]

// Property tests for ChainedHashMap kept inside the crate so they can check
// structural invariants (ring links, bucket heads, run contiguity) that the
// public API does not expose.

use crate::chained_hash_map::{ChainedHashMap, Position};
use proptest::prelude::*;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Operations index into a small key pool so shrinking converges on short
// scenarios with few distinct keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    EmplaceWith(usize, i32),
    Remove(usize),
    EraseAt(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    GetOrDefault(usize),
    Reserve(usize),
    Rehash(usize),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::EmplaceWith(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::EraseAt),
            1 => idx.clone().prop_map(Op::Find),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(Op::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => idx.clone().prop_map(Op::GetOrDefault),
            1 => (0usize..80).prop_map(Op::Reserve),
            1 => (0usize..80).prop_map(Op::Rehash),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    mut sut: ChainedHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Position> = HashMap::new();
    let mut stale: Vec<Position> = Vec::new();
    let ctor_calls = Rc::new(Cell::new(0));

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let (pos, inserted) = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already, "insert reports newness");
                if inserted {
                    live.insert(k.clone(), pos);
                    model.insert(k, v);
                } else {
                    prop_assert_eq!(Some(&pos), live.get(&k));
                }
            }
            Op::EmplaceWith(i, v) => {
                let k = key_from(&pool, i);
                let already = model.contains_key(&k);
                let counter = ctor_calls.clone();
                let before = counter.get();
                let (pos, inserted) = sut.emplace_with(k.clone(), move || {
                    counter.set(counter.get() + 1);
                    v
                });
                prop_assert_eq!(inserted, !already);
                if inserted {
                    prop_assert_eq!(ctor_calls.get(), before + 1);
                    live.insert(k.clone(), pos);
                    model.insert(k, v);
                } else {
                    prop_assert_eq!(ctor_calls.get(), before, "value built for a duplicate");
                }
            }
            Op::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                if let Some(p) = live.remove(&k) {
                    stale.push(p);
                }
            }
            Op::EraseAt(i) => {
                let k = key_from(&pool, i);
                if let Some(p) = live.remove(&k) {
                    let expected_next = sut.next(p).expect("live position has a successor");
                    let next = sut.erase(p).expect("live position erases");
                    prop_assert_eq!(next, expected_next);
                    model.remove(&k);
                    stale.push(p);
                } else {
                    prop_assert!(sut.erase(sut.end()).is_none());
                }
            }
            Op::Find(i) => {
                let k = key_from(&pool, i);
                let found = sut.find(&k);
                prop_assert_eq!(found.is_some(), model.contains_key(&k));
                if let Some(p) = found {
                    prop_assert_eq!(Some(&p), live.get(&k), "position is stable");
                    prop_assert_eq!(p.value(&sut), model.get(&k));
                }
            }
            Op::Contains(s) => {
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(sut.contains_key(s.as_str()), has_model);
            }
            Op::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(&p) = live.get(&k) {
                    let v = p.value_mut(&mut sut).expect("live position resolves");
                    *v = v.saturating_add(d);
                    let mv = model.get_mut(&k).expect("model has live key");
                    *mv = mv.saturating_add(d);
                }
            }
            Op::GetOrDefault(i) => {
                let k = key_from(&pool, i);
                let v = *sut.get_or_insert_default(k.clone());
                let mv = *model.entry(k.clone()).or_default();
                prop_assert_eq!(v, mv);
                if !live.contains_key(&k) {
                    live.insert(k.clone(), sut.find(&k).expect("just inserted"));
                }
            }
            Op::Reserve(n) => {
                sut.reserve(n);
                prop_assert!(sut.load_factor() <= sut.max_load_factor());
            }
            Op::Rehash(n) => {
                sut.rehash(n);
                let floor = (sut.len() as f64 / sut.max_load_factor()).ceil() as usize;
                prop_assert_eq!(sut.bucket_count(), n.max(floor));
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        // Post-conditions after each op.
        sut.assert_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.load_factor() <= sut.max_load_factor());
        for &p in &stale {
            prop_assert!(p.value(&sut).is_none(), "stale position resolved");
        }
        for (k, &p) in &live {
            prop_assert_eq!(p.key(&sut), Some(k), "live position drifted");
        }
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Duplicate keys are no-ops; the returned position is the existing one.
// - Lazily built values are constructed only for new keys.
// - Positions stay attached to their entry through growth and explicit
//   rehash, and never resolve after erasure.
// - Ring links, bucket heads and run contiguity hold after every operation.
// - `load_factor() <= max_load_factor()` after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(ChainedHashMap::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key lands in one bucket,
// so the whole map is a single run and equality does all the work.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same state machine under worst-case collisions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(ChainedHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}

// Low-entropy hasher: keys fall into a handful of hash values, producing many
// short runs that interleave in the list as buckets grow.
#[derive(Clone, Default)]
struct LengthBuildHasher;
#[derive(Default)]
struct LengthHasher(u64);
impl BuildHasher for LengthBuildHasher {
    type Hasher = LengthHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LengthHasher::default()
    }
}
impl Hasher for LengthHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0 = self.0.wrapping_add(bytes.len() as u64);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_clustered_hashes((pool, ops) in arb_scenario()) {
        run_scenario(ChainedHashMap::with_hasher(LengthBuildHasher), pool, ops)?;
    }
}
