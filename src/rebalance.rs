//! Rotations and the bottom-up rebalancing passes run after insertion and removal.

use core::ptr::NonNull;

use crate::{Dir, Link, Links, TreeNode, WavlTree};

impl<T> WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // The ranks of affected nodes are not updated. Subtree sizes of `down` and `up` are.
    pub(crate) unsafe fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            debug_assert_eq!(T::links(up).as_ref().parent(), Some(down));

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            self.update_size(down);
            self.update_size(up);
        }
    }

    // Performs a double rotation, moving the inner grandchild `up` above both its parent
    // `down_first` and its grandparent `down_second`.
    //
    // The ranks of affected nodes are not updated.
    pub(crate) unsafe fn rotate_twice_at(
        &mut self,
        down_second: NonNull<T>,
        down_first: NonNull<T>,
        up: NonNull<T>,
    ) {
        unsafe {
            self.rotate_at(down_first, up);
            self.rotate_at(down_second, up);
        }
    }

    // Performs a bottom-up rebalance of the tree after a leaf was attached below `parent`.
    //
    // Returns the number of rank changes and rotations performed.
    //
    // Invariants:
    // - Subtree sizes are already correct.
    // - The only possible violation is a 0-child of `z`, initially the new leaf.
    pub(crate) unsafe fn rebalance_inserted(&mut self, parent: NonNull<T>) -> usize {
        let mut ops = 0;
        let mut z = parent;

        loop {
            let (left_diff, right_diff) = unsafe { self.rank_diffs(z) };

            let dir = match (left_diff, right_diff) {
                // `z` is 0,1: promote it and ascend. This is the only case that propagates.
                (0, 1) | (1, 0) => {
                    unsafe {
                        self.promote(z);
                        ops += 1;

                        match T::links(z).as_ref().parent() {
                            Some(p) => z = p,
                            None => return ops,
                        }
                    }
                    continue;
                }

                (0, 2) => Dir::Left,
                (2, 0) => Dir::Right,

                // The rank rule holds.
                _ => return ops,
            };

            // `z` is 0,2 with `x` its 0-child. `x` is 1,2, since it was promoted on the way up.
            unsafe {
                let x = T::links(z)
                    .as_ref()
                    .child(dir)
                    .expect("0-child must exist");

                if self.rank_diff(x, !dir) == 2 {
                    // The inner child of `x` is a 2-child: a single rotation suffices.
                    self.rotate_at(z, x);
                    self.demote(z);

                    return ops + 2;
                }

                // The inner child `y` of `x` is a 1-child: rotate it up twice.
                let y = T::links(x)
                    .as_ref()
                    .child(!dir)
                    .expect("inner 1-child must exist");

                self.rotate_twice_at(z, x, y);
                self.promote(y);
                self.demote(x);
                self.demote(z);

                return ops + 5;
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after a removal below `start`.
    //
    // Returns the number of rank changes and rotations performed.
    //
    // Invariants:
    // - Subtree sizes are already correct.
    // - The only possible violation is `z` being a 2,2 leaf, or `z` having a 3-child.
    pub(crate) unsafe fn rebalance_removed(&mut self, start: Link<T>) -> usize {
        let mut ops = 0;
        let mut opt_z = start;

        while let Some(z) = opt_z {
            unsafe {
                let parent = T::links(z).as_ref().parent();

                // A 2,2 leaf must have rank 0.
                if T::links(z).as_ref().is_leaf() && self.is_2_2(z) {
                    self.demote(z);
                    ops += 1;
                    opt_z = parent;
                    continue;
                }

                // `dir` is the side of the 3-child `x`, and `y` is its sibling.
                let (dir, sibling_diff) = match self.rank_diffs(z) {
                    (3, diff) => (Dir::Left, diff),
                    (diff, 3) => (Dir::Right, diff),

                    // The rank rule holds.
                    _ => break,
                };

                if sibling_diff == 2 {
                    // `z` is 3,2: demote it and ascend.
                    self.demote(z);
                    ops += 1;
                    opt_z = parent;
                    continue;
                }

                debug_assert_eq!(sibling_diff, 1);

                let y = T::links(z)
                    .as_ref()
                    .child(!dir)
                    .expect("1-child must exist");

                if self.is_2_2(y) {
                    // `z` is 3,1 and `y` is 2,2: demote both and ascend.
                    self.demote(z);
                    self.demote(y);
                    ops += 2;
                    opt_z = parent;
                    continue;
                }

                if self.rank_diff(y, !dir) == 1 {
                    // The far child of `y` is a 1-child: a single rotation suffices.
                    self.rotate_at(z, y);
                    self.promote(y);
                    self.demote(z);
                    ops += 3;

                    // If `z` is now a 2,2 leaf, it must be demoted once more.
                    if T::links(z).as_ref().is_leaf() && self.is_2_2(z) {
                        self.demote(z);
                        ops += 1;
                    }
                } else {
                    // The far child of `y` is a 2-child, so the near child `v` is a 1-child.
                    let v = T::links(y)
                        .as_ref()
                        .child(dir)
                        .expect("inner 1-child must exist");

                    self.rotate_twice_at(z, y, v);
                    self.promote_twice(v);
                    self.demote(y);
                    self.demote_twice(z);
                    ops += 7;
                }

                break;
            }
        }

        ops
    }
}
