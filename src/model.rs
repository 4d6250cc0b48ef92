//! Differential test harness comparing the tree against the standard library.
//!
//! Shared by the in-crate proptests and the `cargo fuzz` targets.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{Error, Links, TreeNode, WavlMap, WavlTree};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Search(ItemValue),
    Delete(ItemValue),
    Position(ItemValue),
    Select(usize),
    Min,
    PopFirst,
    Max,
    PopLast,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Search(item) => FinalOp::Search(get_value(sorted, item)),
            Op::Delete(item) => FinalOp::Delete(get_value(sorted, item)),
            Op::Position(item) => FinalOp::Position(get_value(sorted, item)),
            // Mostly in range, with the occasional index just past either end.
            Op::Select(index) => FinalOp::Select(index % (sorted.len() + 2)),
            Op::Min => FinalOp::Min,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Max => FinalOp::Max,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Search(u32),
    Delete(u32),
    Position(u32),
    Select(usize),
    Min,
    PopFirst,
    Max,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Search),
        value_strategy().prop_map(Op::Delete),
        value_strategy().prop_map(Op::Position),
        (0usize..1000).prop_map(Op::Select),
        Just(Op::Min),
        Just(Op::PopFirst),
        Just(Op::Max),
        Just(Op::PopLast),
    ]
}

// Values are derived from keys so that a stale value is detectable.
fn value_of(key: u32) -> u64 {
    u64::from(key) * 3 + 1
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_keys = Vec::with_capacity(ops.len());
    let mut btree = BTreeMap::new();
    let mut wavl: WavlMap<u32, u64> = WavlMap::new();

    fn insert_sorted(v: &mut Vec<u32>, key: u32) {
        if let Err(idx) = v.binary_search(&key) {
            v.insert(idx, key);
        }
    }

    fn remove_sorted(v: &mut Vec<u32>, key: u32) {
        if let Ok(idx) = v.binary_search(&key) {
            v.remove(idx);
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_keys);

        match final_op {
            FinalOp::Insert(key) => {
                let from_btree = match btree.insert(key, value_of(key)) {
                    None => Ok(()),
                    Some(_) => Err(Error::KeyExists),
                };
                let from_wavl = wavl.insert(key, value_of(key)).map(|_| ());

                insert_sorted(&mut sorted_keys, key);

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Search(key) => {
                let from_btree = btree.get(&key).ok_or(Error::KeyNotFound);
                let from_wavl = wavl.search(&key);

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Delete(key) => {
                let from_btree = btree.remove(&key).map(|_| ()).ok_or(Error::KeyNotFound);
                let from_wavl = wavl.delete(&key).map(|_| ());

                remove_sorted(&mut sorted_keys, key);

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Position(key) => {
                let from_sorted = sorted_keys.binary_search(&key).ok().map(|idx| idx + 1);
                let from_wavl = wavl.position(&key);

                assert_eq!(from_sorted, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Select(index) => {
                let from_btree = index
                    .checked_sub(1)
                    .and_then(|idx| btree.values().nth(idx))
                    .ok_or(Error::OutOfRange {
                        index,
                        len: btree.len(),
                    });
                let from_wavl = wavl.select(index);

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Min => {
                let from_btree = btree.values().next().ok_or(Error::Empty);
                let from_wavl = wavl.min();

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_wavl = wavl.pop_first();

                if let Some((key, _)) = from_btree {
                    remove_sorted(&mut sorted_keys, key);
                }

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Max => {
                let from_btree = btree.values().next_back().ok_or(Error::Empty);
                let from_wavl = wavl.max();

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_wavl = wavl.pop_last();

                if let Some((key, _)) = from_btree {
                    remove_sorted(&mut sorted_keys, key);
                }

                assert_eq!(from_btree, from_wavl, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        wavl.assert_invariants();
        assert_eq!(btree.len(), wavl.len());
        assert!(btree.iter().eq(wavl.iter()));
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum CursorOp {
    Next,
    Prev,
    PeekNext,
    PeekPrev,
    /// Raw index; reduced modulo `len + 2` so the ghost is reachable from both ends.
    Seek(usize),
    Remove,
    RemoveBack,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    proptest::prop_oneof![
        Just(CursorOp::Next),
        Just(CursorOp::Prev),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        (0usize..1000).prop_map(CursorOp::Seek),
        Just(CursorOp::Remove),
        Just(CursorOp::RemoveBack),
    ]
}

#[derive(Clone, Debug, Arbitrary)]
pub struct CursorEquivalenceInput {
    pub values: Vec<u32>,
    pub ops: Vec<CursorOp>,
}

// A cursor over a sorted vector. `at` is a 0-based index; `None` is the ghost.
struct SortedCursor {
    keys: Vec<u32>,
    at: Option<usize>,
}

impl SortedCursor {
    fn neighbor(&self, forward: bool) -> Option<usize> {
        match (self.at, forward) {
            (Some(i), true) => Some(i + 1).filter(|&i| i < self.keys.len()),
            (Some(i), false) => i.checked_sub(1),
            (None, true) => (!self.keys.is_empty()).then_some(0),
            (None, false) => self.keys.len().checked_sub(1),
        }
    }

    fn key(&self, at: Option<usize>) -> Option<u32> {
        at.map(|i| self.keys[i])
    }

    fn seek(&mut self, index: usize) {
        self.at = index.checked_sub(1).filter(|&i| i < self.keys.len());
    }

    fn remove(&mut self, forward: bool) -> Option<u32> {
        let victim = self.at?;
        let key = self.keys.remove(victim);

        self.at = if forward {
            Some(victim).filter(|&i| i < self.keys.len())
        } else {
            victim.checked_sub(1)
        };

        Some(key)
    }
}

/// Drives a [`CursorMut`](crate::CursorMut) and a cursor over a sorted `Vec` with the same
/// operations, checking position, index and removals after every step.
///
/// Every removal through the cursor is mirrored by a keyed delete on a second tree built from
/// the same insertions, and both must report the same operation count.
pub fn run_cursor_equivalence(mut values: Vec<u32>, ops: Vec<CursorOp>) {
    values.sort_unstable();
    values.dedup();

    let mut wavl: WavlTree<TestNode> = WavlTree::new();
    let mut keyed: WavlMap<u32, ()> = WavlMap::new();

    for &key in &values {
        assert!(wavl.insert(TestNode::new(key)).is_ok());
        assert!(keyed.insert(key, ()).is_ok());
    }

    let mut model = SortedCursor {
        keys: values,
        at: None,
    };
    model.at = model.neighbor(true);

    let mut curs = wavl.cursor_first_mut();

    for (op_id, op) in ops.into_iter().enumerate() {
        match op {
            CursorOp::Next => {
                model.at = model.neighbor(true);
                curs.move_next();
            }

            CursorOp::Prev => {
                model.at = model.neighbor(false);
                curs.move_prev();
            }

            CursorOp::PeekNext => {
                let expected = model.key(model.neighbor(true));
                assert_eq!(expected, curs.peek_next().map(|n| n.key), "op #{op_id}: {op:?}");
            }

            CursorOp::PeekPrev => {
                let expected = model.key(model.neighbor(false));
                assert_eq!(expected, curs.peek_prev().map(|n| n.key), "op #{op_id}: {op:?}");
            }

            CursorOp::Seek(raw) => {
                let index = raw % (model.keys.len() + 2);
                model.seek(index);
                curs.seek(index);
            }

            CursorOp::Remove | CursorOp::RemoveBack => {
                let forward = matches!(op, CursorOp::Remove);
                let expected = model.remove(forward);

                let removed = if forward {
                    curs.remove_current()
                } else {
                    curs.remove_current_and_move_prev()
                };

                let removed = removed.map(|(node, ops)| (node.key, ops));
                let mirrored = expected.map(|key| (key, keyed.delete(&key).unwrap_or(usize::MAX)));

                assert_eq!(mirrored, removed, "op #{op_id}: {op:?}");
            }
        }

        assert_eq!(model.key(model.at), curs.get().map(|n| n.key), "op #{op_id}: {op:?}");
        assert_eq!(model.at.map(|i| i + 1), curs.index(), "op #{op_id}: {op:?}");
    }

    drop(curs);
    wavl.assert_invariants();
    assert!(model.keys.iter().eq(wavl.iter().map(TestNode::key)));
    assert_eq!(keyed.keys_in_order(), model.keys);
}
