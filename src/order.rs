use core::{pin::Pin, ptr::NonNull};

use crate::{Dir, Link, Links, TreeNode, WavlTree};

impl<T> WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = self.first_raw()?;
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = self.last_raw()?;
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    /// Returns the element at 1-based position `index` in ascending key order.
    ///
    /// Returns `None` if `index` is 0 or greater than [`len`](Self::len). This operation
    /// completes in _O(log(n))_ time, using subtree sizes alone.
    pub fn select(&self, index: usize) -> Option<Pin<&T>> {
        let node = self.select_raw(index)?;
        unsafe { Some(Pin::new_unchecked(node.as_ref())) }
    }

    /// Returns the 1-based position of the element with key `key` in ascending key order.
    ///
    /// This is the inverse of [`select`](Self::select).
    pub fn position_of<Q>(&self, key: &Q) -> Option<usize>
    where
        T::Key: core::borrow::Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.position_raw(node) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        let root = self.root?;
        Some(unsafe { self.min_in_subtree(root).0 })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        let root = self.root?;
        Some(unsafe { self.max_in_subtree(root) })
    }

    pub(crate) fn select_raw(&self, index: usize) -> Link<T> {
        if index == 0 || index > self.len() {
            return None;
        }

        // `index` is relative to the subtree rooted at `cur`.
        let mut index = index;
        let mut cur = self.root?;

        loop {
            unsafe {
                let links = T::links(cur).as_ref();
                let here = 1 + self.size(links.left());

                cur = match index.cmp(&here) {
                    core::cmp::Ordering::Equal => return Some(cur),
                    core::cmp::Ordering::Less => links.left()?,
                    core::cmp::Ordering::Greater => {
                        index -= here;
                        links.right()?
                    }
                };
            }
        }
    }

    // Returns the 1-based in-order position of `node`.
    pub(crate) unsafe fn position_raw(&self, node: NonNull<T>) -> usize {
        unsafe {
            let mut position = 1 + self.size(T::links(node).as_ref().left());
            let mut cur = node;

            // Every ancestor reached from its right subtree precedes `node`, along with its own
            // left subtree.
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == Dir::Right {
                    position += 1 + self.size(T::links(parent).as_ref().left());
                }

                cur = parent;
            }

            position
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Link<T>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the maximum node in the subtree.
    #[inline]
    pub(crate) unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        let mut cur = root;

        while let Some(right) = unsafe { T::links(cur).as_ref().right() } {
            cur = right;
        }

        cur
    }

    // Returns the in-order successor of `node`: the minimum of its right subtree if it has one,
    // otherwise the nearest ancestor of which `node` is a left descendant.
    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    // Returns the in-order predecessor of `node`.
    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    pub(crate) unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = T::links(node).as_ref().child(dir) {
                // Descend once towards `dir`, then as far as possible away from it.
                let mut cur = child;
                while let Some(next) = T::links(cur).as_ref().child(!dir) {
                    cur = next;
                }

                return Some(cur);
            }

            // Ascend until arriving from the `!dir` side.
            let mut cur = node;
            while let Some(parent) = T::links(cur).as_ref().parent() {
                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }
}
