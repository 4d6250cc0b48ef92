extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::{
    model::{self, TestNode},
    TreeNode, WavlTree,
};

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut [u32], k: usize, f: &mut impl FnMut(&[u32])) {
    if k == keys.len() {
        f(keys);
        return;
    }

    for i in k..keys.len() {
        keys.swap(k, i);
        for_each_permutation(keys, k + 1, f);
        keys.swap(k, i);
    }
}

fn insert_all(keys: &[u32]) -> WavlTree<TestNode> {
    let mut tree: WavlTree<TestNode> = WavlTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_ok());
        tree.assert_invariants();
    }

    tree
}

fn insert_find_all(keys: &[u32]) {
    let tree = insert_all(keys);
    assert_eq!(tree.len(), keys.len());

    for key in keys {
        let node = tree.get(key).expect("item not found");
        assert_eq!(node.key(), key);
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = insert_all(keys);

    for key in keys {
        let (node, _) = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_ok());
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert!(tree.remove(key).is_some());
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn all_permutations_find() {
    for n in 2..=6 {
        let mut keys: Vec<u32> = (0..n).collect();
        for_each_permutation(&mut keys, 0, &mut |keys| insert_find_all(keys));
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn all_permutations_remove() {
    for n in 2..=6 {
        let mut keys: Vec<u32> = (0..n).collect();
        for_each_permutation(&mut keys, 0, &mut |keys| insert_remove_all(keys));
    }
}

#[test]
fn remove_each_from_larger_tree() {
    // Exercises removal of leaves, unary and binary nodes at every depth.
    let keys: Vec<u32> = (0..64).map(|i| (i * 29) % 64).collect();

    for victim in 0..64 {
        let mut tree = insert_all(&keys);

        let (node, _) = tree.remove(&victim).expect("item not found");
        assert_eq!(node.key, victim);
        tree.assert_invariants();

        assert_eq!(tree.len(), 63);
        assert!(tree.get(&victim).is_none());
    }
}

#[test]
fn duplicate_insert_returns_item() {
    let mut tree = insert_all(&[1, 2, 3]);

    let rejected = tree.insert(TestNode::new(2)).expect_err("key 2 is present");
    assert_eq!(rejected.key, 2);
    assert_eq!(tree.len(), 3);
    tree.assert_invariants();
}

#[test]
fn empty_tree_queries() {
    let mut tree: WavlTree<TestNode> = WavlTree::new();

    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.root_rank(), -1);
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert!(tree.select(1).is_none());
    assert!(tree.pop_first().is_none());
    assert!(tree.pop_last().is_none());
    assert!(tree.remove(&0).is_none());
    assert_eq!(tree.iter().count(), 0);
}

#[test]
fn select_every_index() {
    let keys: Vec<u32> = (0..100).map(|i| (i * 41) % 101).collect();
    let tree = insert_all(&keys);

    let mut sorted = keys.clone();
    sorted.sort_unstable();

    assert!(tree.select(0).is_none());
    assert!(tree.select(keys.len() + 1).is_none());

    for (i, key) in sorted.iter().enumerate() {
        assert_eq!(tree.select(i + 1).map(|node| node.key), Some(*key));
        assert_eq!(tree.position_of(key), Some(i + 1));
    }
}

#[test]
fn iter_both_ends() {
    let tree = insert_all(&[5, 3, 8, 1, 4, 7, 9]);

    let mut iter = tree.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next().map(|n| n.key), Some(1));
    assert_eq!(iter.next_back().map(|n| n.key), Some(9));
    assert_eq!(iter.len(), 5);

    let middle: Vec<u32> = iter.map(|n| n.key).collect();
    assert_eq!(middle, [3, 4, 5, 7, 8]);

    let reversed: Vec<u32> = tree.iter().rev().map(|n| n.key).collect();
    assert_eq!(reversed, [9, 8, 7, 5, 4, 3, 1]);
}

#[test]
fn first_and_last() {
    let mut tree = insert_all(&[5, 3, 8, 1]);

    assert_eq!(tree.first().map(|n| n.key), Some(1));
    assert_eq!(tree.last().map(|n| n.key), Some(8));

    assert_eq!(tree.pop_first().map(|n| n.key), Some(1));
    assert_eq!(tree.pop_last().map(|n| n.key), Some(8));
    tree.assert_invariants();

    assert_eq!(tree.first().map(|n| n.key), Some(3));
    assert_eq!(tree.last().map(|n| n.key), Some(5));
}

#[test]
fn cursor_walk_and_index() {
    let tree = insert_all(&[20, 10, 30]);

    let mut curs = tree.cursor_first();
    assert_eq!(curs.get().map(|n| n.key), Some(10));
    assert_eq!(curs.index(), Some(1));
    assert!(curs.peek_prev().is_none());

    curs.move_next();
    curs.move_next();
    assert_eq!(curs.get().map(|n| n.key), Some(30));
    assert_eq!(curs.index(), Some(3));

    // Off the end onto the ghost element, then around to the start.
    curs.move_next();
    assert!(curs.get().is_none());
    assert_eq!(curs.index(), None);
    assert_eq!(curs.peek_next().map(|n| n.key), Some(10));

    let mut back = tree.cursor_last();
    back.move_prev();
    assert_eq!(back.get().map(|n| n.key), Some(20));
}

#[test]
fn cursor_remove() {
    let mut tree = insert_all(&[1, 2, 3, 4]);

    {
        let mut curs = tree.cursor_last_mut();
        curs.move_prev();

        // 3 is unary: 4 takes its place without any rank change.
        let (node, ops) = curs.remove_current().expect("cursor is on 3");
        assert_eq!((node.key, ops), (3, 0));
        assert_eq!(curs.get().map(|n| n.key), Some(4));

        // Removing the leaf 4 leaves the root a 3,2 node, fixed by one demotion.
        let (node, ops) = curs.remove_current_and_move_prev().expect("cursor is on 4");
        assert_eq!((node.key, ops), (4, 1));
        assert_eq!(curs.as_cursor().get().map(|n| n.key), Some(2));
        assert_eq!(curs.index(), Some(2));
    }

    tree.assert_invariants();
    assert_eq!(tree.iter().map(|n| n.key).collect::<Vec<_>>(), [1, 2]);
}

#[test]
fn cursor_remove_on_ghost_is_noop() {
    let mut tree = insert_all(&[1, 2]);

    let mut curs = tree.cursor_at_mut(0);
    assert!(curs.get().is_none());
    assert!(curs.remove_current().is_none());
    assert!(curs.remove_current_and_move_prev().is_none());
    assert!(curs.get().is_none());

    drop(curs);
    assert_eq!(tree.len(), 2);
}

#[test]
fn cursor_seek_by_index() {
    let keys: Vec<u32> = (0..50).map(|i| (i * 7) % 50 * 10).collect();
    let tree = insert_all(&keys);

    let mut curs = tree.cursor_at(1);
    assert_eq!(curs.get().map(|n| n.key), Some(0));

    for index in (1..=50).rev() {
        curs.seek(index);
        assert_eq!(curs.get().map(|n| n.key), Some((index as u32 - 1) * 10));
        assert_eq!(curs.index(), Some(index));
    }

    for out_of_range in [0, 51, usize::MAX] {
        curs.seek(out_of_range);
        assert!(curs.get().is_none());
        assert_eq!(curs.index(), None);
    }

    // From the ghost, a step in either direction wraps to an end.
    assert_eq!(curs.peek_next().map(|n| n.key), Some(0));
    assert_eq!(curs.peek_prev().map(|n| n.key), Some(490));

    curs.seek(25);
    curs.move_next();
    assert_eq!(curs.get().map(|n| n.key), Some(250));
    assert_eq!(tree.cursor_at(26).get().map(|n| n.key), Some(250));
}

#[test]
fn cursor_seek_then_remove() {
    let mut tree = insert_all(&[10, 20, 30, 40, 50, 60, 70]);

    let mut curs = tree.cursor_at_mut(4);
    curs.seek(2);

    let (node, _) = curs.remove_current().expect("cursor is on 20");
    assert_eq!(node.key, 20);

    // The successor slides into the vacated index.
    assert_eq!(curs.get().map(|n| n.key), Some(30));
    assert_eq!(curs.index(), Some(2));

    drop(curs);
    tree.assert_invariants();
    assert_eq!(tree.len(), 6);
}

#[test]
fn clear_empties_tree() {
    let mut tree = insert_all(&[4, 2, 6, 1, 3, 5, 7]);

    tree.clear();
    assert!(tree.is_empty());

    // Cleared nodes can be reinserted from scratch.
    assert!(matches!(tree.insert(TestNode::new(1)), Ok(0)));
    tree.assert_invariants();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..1000, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
    ) {
        model::run_cursor_equivalence(values, ops);
    }

    #[test]
    fn height_is_logarithmic(keys in proptest::collection::vec(any::<u32>(), 1..2000)) {
        let mut tree: WavlTree<TestNode> = WavlTree::new();
        for key in keys {
            let _ = tree.insert(TestNode::new(key));
        }

        let n = tree.len();
        let log2_ceil = (usize::BITS - n.leading_zeros()) as usize;

        tree.assert_invariants();
        prop_assert!(tree.height() <= 2 * log2_ceil, "height {} for {} keys", tree.height(), n);
        prop_assert!(usize::try_from(tree.root_rank()).unwrap() < 2 * log2_ceil);
    }

    #[test]
    fn select_matches_sorted(keys in proptest::collection::btree_set(any::<u32>(), 0..300)) {
        let mut tree: WavlTree<TestNode> = WavlTree::new();
        for &key in &keys {
            prop_assert!(tree.insert(TestNode::new(key)).is_ok());
        }

        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(tree.select(i + 1).map(|node| node.key), Some(*key));
        }

        let in_order: Vec<u32> = tree.iter().map(|node| node.key).collect();
        prop_assert!(in_order.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(in_order.len(), tree.len());
    }
}
