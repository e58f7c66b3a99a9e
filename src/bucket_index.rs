//! BucketIndex: one chain-head slot per bucket.
//!
//! A slot holds the key of the first node of that bucket's run in the shared
//! list, or nothing. Slots never own nodes and carry no lengths; the run ends
//! at the first node whose hash maps to a different bucket.

use crate::node_list::NodeKey;

#[derive(Clone, Debug, Default)]
pub(crate) struct BucketIndex {
    heads: Vec<Option<NodeKey>>,
}

impl BucketIndex {
    pub(crate) fn new() -> Self {
        Self { heads: Vec::new() }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Bucket for a full hash. Requires at least one bucket.
    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        debug_assert!(!self.heads.is_empty(), "bucket_of with zero buckets");
        (hash % self.heads.len() as u64) as usize
    }

    #[inline]
    pub(crate) fn head(&self, bucket: usize) -> Option<NodeKey> {
        self.heads[bucket]
    }

    #[inline]
    pub(crate) fn set_head(&mut self, bucket: usize, head: Option<NodeKey>) {
        self.heads[bucket] = head;
    }

    /// Drop every head and resize to `buckets` empty slots.
    pub(crate) fn reset(&mut self, buckets: usize) {
        self.heads.clear();
        self.heads.resize(buckets, None);
    }

    #[cfg(test)]
    pub(crate) fn heads(&self) -> impl Iterator<Item = (usize, NodeKey)> + '_ {
        self.heads
            .iter()
            .enumerate()
            .filter_map(|(b, h)| h.map(|k| (b, k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_and_resizes() {
        let k = NodeKey::from_raw(3, 1);
        let mut idx = BucketIndex::new();
        assert!(idx.is_empty());
        idx.reset(4);
        assert_eq!(idx.len(), 4);
        idx.set_head(2, Some(k));
        assert_eq!(idx.head(2), Some(k));
        assert_eq!(idx.heads().collect::<Vec<_>>(), vec![(2, k)]);
        idx.reset(8);
        assert_eq!(idx.len(), 8);
        assert!((0..8).all(|b| idx.head(b).is_none()));
    }

    #[test]
    fn bucket_of_is_hash_mod_len() {
        let mut idx = BucketIndex::new();
        idx.reset(16);
        assert_eq!(idx.bucket_of(0), 0);
        assert_eq!(idx.bucket_of(17), 1);
        assert_eq!(idx.bucket_of(u64::MAX), (u64::MAX % 16) as usize);
    }
}
