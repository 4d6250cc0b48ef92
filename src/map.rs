use alloc::{boxed::Box, vec::Vec};
use core::{borrow::Borrow, fmt, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{Error, Links, Result, TreeNode, WavlTree};

/// An ordered map based on a [WAVL tree], with logarithmic order-statistic queries.
///
/// Positions used by [`select`](WavlMap::select) and [`position`](WavlMap::position) are
/// 1-based: `select(1)` is the value of the smallest key.
///
/// [WAVL tree]: https://en.wikipedia.org/wiki/WAVL_tree
pub struct WavlMap<K: Ord, V> {
    tree: WavlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

impl<K, V> MapNode<K, V> {
    fn new(key: K, value: V) -> Box<Self> {
        Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        // SAFETY: `ptr` is non-null, so a pointer to one of its fields is too.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

// SAFETY: The map uniquely owns every node, and nodes are only reachable through it.
unsafe impl<K: Ord + Send, V: Send> Send for WavlMap<K, V> {}

// SAFETY: Shared access never mutates nodes.
unsafe impl<K: Ord + Sync, V: Sync> Sync for WavlMap<K, V> {}

impl<K: Ord, V> WavlMap<K, V> {
    /// Creates a new, empty `WavlMap`.
    pub const fn new() -> Self {
        Self {
            tree: WavlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Alias of [`is_empty`](Self::is_empty).
    #[inline]
    pub const fn empty(&self) -> bool {
        self.is_empty()
    }

    /// Returns the number of elements in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Alias of [`len`](Self::len).
    #[inline]
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a reference to the value associated with `key`, or [`Error::KeyNotFound`].
    pub fn search<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // SAFETY: Only the value is handed out; links and key stay untouched, and pinning is not
        // structural for `node.value`.
        unsafe {
            self.tree
                .get_mut(key)
                .map(|node| &mut node.get_unchecked_mut().value)
        }
    }

    /// Inserts `value` under `key`.
    ///
    /// Returns the number of rebalancing steps taken, or [`Error::KeyExists`] without touching
    /// the map if `key` is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<usize> {
        self.tree
            .insert(MapNode::new(key, value))
            .map_err(|_| Error::KeyExists)
    }

    /// Removes the entry for `key`.
    ///
    /// Returns the number of rebalancing steps taken, or [`Error::KeyNotFound`] without touching
    /// the map if `key` is absent.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .remove(key)
            .map(|(_, ops)| ops)
            .ok_or(Error::KeyNotFound)
    }

    /// Removes the value associated with `key` from the map and returns it.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|(node, _)| node.value)
    }

    /// Returns the value associated with the smallest key, or [`Error::Empty`].
    pub fn min(&self) -> Result<&V> {
        self.first_key_value()
            .map(|(_, value)| value)
            .ok_or(Error::Empty)
    }

    /// Returns the value associated with the largest key, or [`Error::Empty`].
    pub fn max(&self) -> Result<&V> {
        self.last_key_value()
            .map(|(_, value)| value)
            .ok_or(Error::Empty)
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the value whose key is the `index`-th smallest, counting from 1.
    ///
    /// Fails with [`Error::OutOfRange`] unless `1 <= index <= len()`. This operation completes
    /// in _O(log(n))_ time.
    pub fn select(&self, index: usize) -> Result<&V> {
        self.select_key_value(index)
            .map(|(_, value)| value)
            .ok_or(Error::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Returns the key-value pair whose key is the `index`-th smallest, counting from 1.
    pub fn select_key_value(&self, index: usize) -> Option<(&K, &V)> {
        self.tree.select(index).map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns the 1-based position of `key` in ascending key order.
    ///
    /// This is the inverse of [`select`](Self::select).
    pub fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.position_of(key)
    }

    /// Returns the key-value pair stored at the root of the tree.
    pub fn root(&self) -> Option<(&K, &V)> {
        self.tree.root().map(|node| {
            let node = node.get_ref();
            (&node.key, &node.value)
        })
    }

    /// Returns an iterator over the entries of the map, in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator {
        self.tree.iter().map(|node| (&node.key, &node.value))
    }

    /// Returns an iterator over the keys of the map, in ascending order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator {
        self.tree.iter().map(|node| &node.key)
    }

    /// Returns an iterator over the values of the map, in ascending key order.
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator {
        self.tree.iter().map(|node| &node.value)
    }

    /// Returns the keys of the map in ascending order.
    pub fn keys_in_order(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.keys().cloned().collect()
    }

    /// Returns the values of the map, sorted by their keys.
    pub fn values_in_order(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.values().cloned().collect()
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord, V> Default for WavlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for WavlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::{format, prelude::v1::*};

    use super::*;

    fn map_from(keys: &[u32]) -> WavlMap<u32, u32> {
        let mut map = WavlMap::new();
        for &key in keys {
            map.insert(key, key * 10).expect("keys are distinct");
            map.assert_invariants();
        }
        map
    }

    #[test]
    fn small_scenario() {
        let mut map = WavlMap::new();
        assert!(map.empty());

        map.insert(10, "a").unwrap();
        map.insert(5, "b").unwrap();
        map.insert(15, "c").unwrap();
        map.insert(3, "d").unwrap();
        map.assert_invariants();

        assert_eq!(map.keys_in_order(), [3, 5, 10, 15]);
        assert_eq!(map.values_in_order(), ["d", "b", "a", "c"]);
        assert_eq!(map.select(1), Ok(&"d"));
        assert_eq!(map.select(4), Ok(&"c"));
        assert_eq!(map.size(), 4);
        assert!(!map.empty());
    }

    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut map = WavlMap::new();
        let ops: Vec<usize> = (1..=7u32)
            .map(|key| map.insert(key, key * 10).unwrap())
            .collect();

        map.assert_invariants();
        assert_eq!(ops, [0, 1, 3, 2, 3, 4, 3]);
        assert_eq!(map.height(), 3);
        assert_eq!(map.root(), Some((&4, &40)));
        assert_eq!(map.min(), Ok(&10));
        assert_eq!(map.max(), Ok(&70));
    }

    #[test]
    fn zig_zag_insert_double_rotates() {
        let mut map = WavlMap::new();

        assert_eq!(map.insert(3, ()), Ok(0));
        assert_eq!(map.insert(1, ()), Ok(1));
        assert_eq!(map.insert(2, ()), Ok(6));
        map.assert_invariants();

        assert_eq!(map.root(), Some((&2, &())));
    }

    #[test]
    fn delete_binary_root() {
        let mut map = map_from(&[2, 1, 3]);
        assert_eq!(map.root(), Some((&2, &20)));

        assert_eq!(map.delete(&2), Ok(0));
        map.assert_invariants();

        // The in-order successor takes the root's place.
        assert_eq!(map.root(), Some((&3, &30)));
        assert_eq!(map.size(), 2);
        assert_eq!(map.keys_in_order(), [1, 3]);
    }

    #[test]
    fn delete_demotes_2_2_leaf() {
        let mut map = map_from(&[2, 1, 3]);

        assert_eq!(map.delete(&1), Ok(0));
        assert_eq!(map.delete(&3), Ok(1));
        map.assert_invariants();

        assert_eq!(map.keys_in_order(), [2]);
    }

    #[test]
    fn delete_single_rotation() {
        let mut map = map_from(&[1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(map.delete(&1), Ok(0));
        assert_eq!(map.delete(&3), Ok(1));
        assert_eq!(map.delete(&2), Ok(3));
        map.assert_invariants();

        assert_eq!(map.root(), Some((&6, &60)));
        assert_eq!(map.keys_in_order(), [4, 5, 6, 7]);
    }

    #[test]
    fn delete_single_rotation_demotes_2_2_leaf() {
        let mut map = map_from(&[2, 1, 3, 4]);

        // Rotating 3 up leaves 2 as a rank 1 leaf, which takes one more demotion.
        assert_eq!(map.delete(&1), Ok(4));
        map.assert_invariants();

        assert_eq!(map.root(), Some((&3, &30)));
        assert_eq!(map.height(), 2);
        assert_eq!(map.keys_in_order(), [2, 3, 4]);
    }

    #[test]
    fn map_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<WavlMap<u32, u64>>();
        assert_send_sync::<WavlMap<String, Vec<u8>>>();
    }

    #[test]
    fn delete_double_rotation() {
        let mut map = WavlMap::new();
        assert_eq!(map.insert(4, ()), Ok(0));
        assert_eq!(map.insert(2, ()), Ok(1));
        assert_eq!(map.insert(6, ()), Ok(0));
        assert_eq!(map.insert(5, ()), Ok(2));

        assert_eq!(map.delete(&2), Ok(7));
        map.assert_invariants();

        assert_eq!(map.root(), Some((&5, &())));
        assert_eq!(map.keys_in_order(), [4, 5, 6]);
    }

    #[test]
    fn delete_last_element() {
        let mut map = map_from(&[1]);

        assert_eq!(map.delete(&1), Ok(0));
        assert!(map.is_empty());
        assert_eq!(map.root(), None);
        assert_eq!(map.min(), Err(Error::Empty));
        assert_eq!(map.max(), Err(Error::Empty));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut map = map_from(&[5, 2, 8]);

        assert_eq!(map.insert(2, 0), Err(Error::KeyExists));
        assert_eq!(map.size(), 3);
        assert_eq!(map.get(&2), Some(&20));
        map.assert_invariants();
    }

    #[test]
    fn missing_delete_is_a_no_op() {
        let mut map = map_from(&[5, 2, 8, 1, 9]);
        let keys = map.keys_in_order();
        let values = map.values_in_order();

        assert_eq!(map.delete(&7), Err(Error::KeyNotFound));
        assert_eq!(map.search(&7), Err(Error::KeyNotFound));
        assert_eq!(map.keys_in_order(), keys);
        assert_eq!(map.values_in_order(), values);
    }

    #[test]
    fn select_bounds() {
        let map = map_from(&[5, 2, 8]);

        assert_eq!(map.select(0), Err(Error::OutOfRange { index: 0, len: 3 }));
        assert_eq!(map.select(4), Err(Error::OutOfRange { index: 4, len: 3 }));
        assert_eq!(map.select(2), Ok(&50));

        let empty: WavlMap<u32, u32> = WavlMap::new();
        assert_eq!(empty.select(1), Err(Error::OutOfRange { index: 1, len: 0 }));
    }

    #[test]
    fn select_and_position_agree() {
        let keys: Vec<u32> = (0..200).map(|i| (i * 37) % 211).collect();
        let map = map_from(&keys);

        let mut sorted = keys.clone();
        sorted.sort_unstable();

        for (i, key) in sorted.iter().enumerate() {
            assert_eq!(map.select(i + 1), Ok(&(key * 10)));
            assert_eq!(map.select_key_value(i + 1).map(|(k, _)| k), Some(key));
            assert_eq!(map.position(key), Some(i + 1));
        }

        assert_eq!(map.position(&1000), None);
    }

    #[test]
    fn insert_then_delete_restores_contents() {
        let mut map = map_from(&[50, 20, 80, 10, 30, 70, 90]);
        let keys = map.keys_in_order();

        map.insert(25, 0).unwrap();
        map.delete(&25).unwrap();
        map.assert_invariants();

        assert_eq!(map.keys_in_order(), keys);
        assert_eq!(map.size(), keys.len());
    }

    #[test]
    fn get_mut_and_remove() {
        let mut map = map_from(&[1, 2, 3]);

        *map.get_mut(&2).unwrap() = 99;
        assert_eq!(map.search(&2), Ok(&99));
        assert!(map.contains_key(&2));

        assert_eq!(map.remove(&2), Some(99));
        assert_eq!(map.remove(&2), None);
        assert!(!map.contains_key(&2));
        map.assert_invariants();
    }

    #[test]
    fn pops_and_iterators() {
        let mut map = map_from(&[4, 2, 6, 1, 3, 5, 7]);

        assert_eq!(map.iter().len(), 7);
        assert_eq!(map.keys().rev().copied().collect::<Vec<_>>(), [7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(map.first_key_value(), Some((&1, &10)));
        assert_eq!(map.last_key_value(), Some((&7, &70)));

        assert_eq!(map.pop_first(), Some((1, 10)));
        assert_eq!(map.pop_last(), Some((7, 70)));
        map.assert_invariants();

        assert_eq!(map.keys_in_order(), [2, 3, 4, 5, 6]);

        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.pop_first(), None);
    }

    #[test]
    fn debug_format() {
        let map = map_from(&[2, 1]);
        assert_eq!(format!("{map:?}"), "{1: 10, 2: 20}");
    }

    #[test]
    fn string_keys_borrow_as_str() {
        let mut map = WavlMap::new();
        map.insert(String::from("b"), 2).unwrap();
        map.insert(String::from("a"), 1).unwrap();

        assert_eq!(map.search("a"), Ok(&1));
        assert_eq!(map.delete("b"), Ok(0));
        assert_eq!(map.keys_in_order(), ["a"]);
    }
}
