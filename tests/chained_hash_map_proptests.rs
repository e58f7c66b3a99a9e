// ChainedHashMap property tests against the public API.
//
// Property 1: bulk construction and filtering match std::collections::HashMap.
//  - Model: HashMap built from the same pairs (first occurrence wins, since
//    duplicate inserts keep the stored value).
//  - Invariant: same key set and values; `==` between two maps built from
//    the same pairs in different order.
//  - Operations: from_iter, retain, remove.
//
// Property 2: two maps sharing one fixed pool region.
//  - Model: a BTreeMap per map, updated only by operations that succeed.
//  - Invariant: an exhausted pool leaves len, bucket_count and contents
//    untouched; contents always equal the model; the region is fully
//    returned once both maps are dropped.
//  - Operations: try_insert, remove, clear, rehash.
//
// Property 3: cursor walk equals iteration order, and removing through a
// cursor yields exactly the removed keys.
use chained_hashmap::{ChainedHashMap, MapError, NodePool};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// Property 1: model equivalence for bulk operations.
proptest! {
    #[test]
    fn prop_bulk_matches_model(
        pairs in proptest::collection::vec((0u16..200, any::<i32>()), 0..300),
        modulus in 1u16..7,
    ) {
        let m: ChainedHashMap<u16, i32> = pairs.iter().copied().collect();
        let mut model: HashMap<u16, i32> = HashMap::new();
        for &(k, v) in &pairs {
            model.entry(k).or_insert(v);
        }
        prop_assert_eq!(m.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(m.get(k), Some(v));
        }
        prop_assert!(m.load_factor() <= m.max_load_factor());

        // Same content, different insertion order.
        let reversed: ChainedHashMap<u16, i32> =
            model.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>().into_iter().rev().collect();
        prop_assert!(m == reversed);

        let mut filtered = m.clone();
        filtered.retain(|k, _| k % modulus == 0);
        let kept: BTreeSet<u16> = filtered.keys().copied().collect();
        let expected: BTreeSet<u16> = model.keys().copied().filter(|k| k % modulus == 0).collect();
        prop_assert_eq!(kept, expected);

        for k in 0u16..200 {
            if k % 3 == 0 {
                let expected = model.get(&k).copied().filter(|_| k % modulus == 0);
                prop_assert_eq!(filtered.remove(&k), expected);
            }
        }
        prop_assert!(filtered.keys().all(|k| k % 3 != 0 && k % modulus == 0));
    }
}

// Property 2: a shared region never leaks into or corrupts either map.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_pool_sharing(
        capacity in 0usize..4096,
        ops in proptest::collection::vec((0u8..=4u8, any::<bool>(), 0u32..64), 1..200),
    ) {
        let pool = NodePool::with_capacity(capacity);
        let mut maps = [
            ChainedHashMap::<u32, u32, _, NodePool>::new_in(pool.clone()),
            ChainedHashMap::<u32, u32, _, NodePool>::new_in(pool.clone()),
        ];
        let mut models = [BTreeMap::new(), BTreeMap::new()];
        for (op, which, k) in ops {
            let i = usize::from(which);
            let (m, model) = (&mut maps[i], &mut models[i]);
            match op {
                0 | 1 => {
                    let (len, buckets) = (m.len(), m.bucket_count());
                    let present = model.contains_key(&k);
                    match m.try_insert(k, k) {
                        Ok((pos, inserted)) => {
                            prop_assert_eq!(inserted, !present);
                            prop_assert_eq!(pos.key(&*m), Some(&k));
                            model.insert(k, k);
                        }
                        Err(MapError::Alloc(_)) => {
                            prop_assert!(!present, "duplicates need no storage");
                            prop_assert_eq!(m.len(), len);
                            prop_assert_eq!(m.bucket_count(), buckets);
                            prop_assert!(!m.contains_key(&k));
                        }
                        Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                    }
                }
                2 => {
                    prop_assert_eq!(m.remove(&k), model.remove(&k));
                }
                3 => m.rehash(k as usize),
                _ => {
                    if k % 8 == 0 {
                        m.clear();
                        model.clear();
                    }
                }
            }
            for (m, model) in maps.iter().zip(&models) {
                let got: BTreeMap<u32, u32> = m.iter().map(|(k, v)| (*k, *v)).collect();
                prop_assert_eq!(&got, model);
            }
        }
        drop(maps);
        prop_assert_eq!(pool.used(), 0);
    }
}

// Property 3: cursors walk in iteration order and remove what they visit.
proptest! {
    #[test]
    fn prop_cursor_walk(
        keys in proptest::collection::btree_set(any::<u32>(), 0..100),
        drop_every in 1usize..5,
    ) {
        let mut m: ChainedHashMap<u32, ()> = keys.iter().map(|&k| (k, ())).collect();
        let order: Vec<u32> = m.keys().copied().collect();

        let mut walked = Vec::new();
        let mut c = m.cursor_front();
        while let Some(k) = c.key() {
            walked.push(*k);
            prop_assert!(c.move_next());
        }
        prop_assert!(c.is_end());
        prop_assert_eq!(&walked, &order);

        let mut removed = BTreeMap::new();
        let mut i = 0usize;
        let mut cm = m.cursor_front_mut();
        while !cm.is_end() {
            if i % drop_every == 0 {
                let (k, v) = cm.remove_current().expect("cursor on a live entry");
                removed.insert(k, v);
            } else {
                cm.move_next();
            }
            i += 1;
        }
        let expected: BTreeSet<u32> = order.iter().copied().step_by(drop_every).collect();
        prop_assert_eq!(removed.keys().copied().collect::<BTreeSet<_>>(), expected);
        prop_assert_eq!(m.len(), keys.len() - removed.len());
    }
}
