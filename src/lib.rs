//! chained-hashmap: a separate-chaining HashMap whose chains are contiguous
//! runs of one shared doubly-linked list.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: classic bucket-chained hashing without one allocation-owning list
//!   per bucket. All entries live in a single node list; a bucket only
//!   remembers where its run starts.
//! - Layers:
//!   - NodeList<T, A>: arena-backed circular doubly-linked list with a
//!     sentinel. O(1) insert-before and erase, generational node keys. The
//!     node arena is one vector whose buffer comes from the map's
//!     `Allocator` (`Global`, a `NodePool` region, `&bumpalo::Bump`, ...).
//!   - BucketIndex: one optional chain head per bucket. No counts, no
//!     lengths.
//!   - ChainedHashMap<K, V, S, A>: public API coordinating the two; owns the
//!     growth policy (`MapConfig`).
//!   - Iteration: borrowing/owning iterators and cursors in list order.
//!
//! Constraints
//! - Single-threaded: every mutation goes through `&mut self`; no locking.
//! - Run contiguity: entries that hash to the same bucket are adjacent in
//!   the list. Lookup stops at the first node of another bucket; insertion
//!   links in front of the bucket head; erasure moves the head forward when
//!   the head itself goes.
//! - Unique keys: a duplicate insert leaves the entry alone and reports the
//!   existing position. The capacity check runs first, so an insert at the
//!   growth threshold grows the table even when the key is present.
//! - Stable positions: a `Position` names one node until that node is
//!   erased. Rehash relinks nodes instead of moving them, so it invalidates
//!   nothing.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its full `u64` hash; `K: Hash` runs once per insert
//!   and per lookup. Rehash uses the stored hashes and calls no user code.
//!
//! Failure semantics
//! - `try_*` methods surface node-storage exhaustion (and, for
//!   `try_emplace_with`, the value constructor's own error) without changing
//!   the map, bucket count included. The plain forms panic on exhaustion.
//! - Stale or end positions are answered with `None`, never undefined
//!   behavior.
//!
//! Equality
//! - `==` compares contents regardless of order. `iter_eq` compares entry by
//!   entry in iteration order, which depends on insertion and rehash
//!   history.
//!
//! Logging
//! - Through the `log` facade: rehashes at `debug`, growth decisions and
//!   bucket-head moves at `trace`, requests a `NodePool` refuses at `warn`.

pub mod alloc;
mod bucket_index;
pub mod chained_hash_map;
mod chained_hash_map_proptest;
pub mod config;
pub mod error;
pub mod iter;
mod node_list;

// Public surface
pub use alloc::{Global, NodePool};
pub use allocator_api2::alloc::Allocator;
pub use chained_hash_map::{ChainedHashMap, Position};
pub use config::MapConfig;
pub use error::{AllocError, MapError};
pub use iter::{Cursor, CursorMut, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
