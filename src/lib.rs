//! An intrusive, order-statistic weak AVL tree, or WAVL tree, and an owning ordered map built on
//! top of it.
#![no_std]

// Conventions used in comments are from Haeupler, Sen and Tarjan:
// - The rank of a node `x` is denoted `r(x)`. A missing child has rank -1.
// - The parent of a node `x` is denoted `p(x)`.
// - The rank difference of a node `x` is given by `r(p(x)) - r(x)`.
// - A node `x` is an `i`-child if its rank difference is `i`.
// - A node is `i,j` if one of its children is an `i`-child and the other is a `j`-child.
//
// The fundamental invariants of a WAVL tree are:
// 1. All rank differences are either 1 or 2.
// 2. All leaves have rank 0.
//
// Corollaries:
// 3. All ancestors of a leaf have rank at least one.
// 4. All unary nodes are 1,2 with rank 1, and their sole child is a leaf.
//
// Every node additionally records the number of nodes in its subtree, `s(x)`, with `s` of a
// missing child being 0. This is what makes `select` and `position_of` logarithmic.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod cursor;
mod debug;
mod error;
mod iter;
mod map;
mod order;
mod rebalance;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use error::{Error, Result};
pub use iter::Iter;
pub use map::WavlMap;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive weak AVL tree, or WAVL tree, augmented with subtree sizes.
///
/// Implementation based on the paper [Rank-Balanced Trees] by Haeupler, Sen and Tarjan.
///
/// Mutating operations return the number of rebalancing steps (promotions, demotions and
/// rotations) they performed. The count is a diagnostic; only the resulting shape matters.
///
/// [Rank-Balanced Trees]: http://arks.princeton.edu/ark:/88435/pr1nz5z
pub struct WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    size: usize,
    rank: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> WavlTree<T> {
        WavlTree { root: None }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// This is the subtree size of the root, and completes in _O(1)_ time.
    pub fn len(&self) -> usize {
        unsafe { self.size(self.root) }
    }

    /// Returns the rank of the root, or -1 if the tree is empty.
    pub fn root_rank(&self) -> i8 {
        unsafe { self.rank(self.root) }
    }

    /// Returns a reference to the root element.
    pub fn root(&self) -> Option<Pin<&T>> {
        self.root.map(|root| unsafe { Pin::new_unchecked(root.as_ref()) })
    }

    /// Returns the number of nodes on the longest root-to-leaf path.
    #[doc(hidden)]
    pub fn height(&self) -> usize {
        unsafe fn height_at<T: TreeNode<Links<T>> + ?Sized>(node: Link<T>) -> usize {
            match node {
                None => 0,
                Some(node) => unsafe {
                    let links = T::links(node).as_ref();
                    1 + height_at(links.left()).max(height_at(links.right()))
                },
            }
        }

        unsafe { height_at(self.root) }
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert!(
                    T::links(root).as_ref().parent().is_none(),
                    "root must not have a parent"
                );
                self.assert_invariants_at(root);
            }
        }
    }

    // Checks the subtree rooted at `node`, returning its size.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> usize {
        unsafe {
            let rank = T::links(node).as_ref().rank();
            let mut size = 1;

            // Ensure all leaves have rank 0.
            if T::links(node).as_ref().is_leaf() {
                assert_eq!(rank, 0, "leaves must have rank 0");
            }

            for dir in [Dir::Left, Dir::Right] {
                let child_rank = self.rank(T::links(node).as_ref().child(dir));

                // Ensure all rank differences are 1 or 2, counting missing children.
                let rank_diff = rank - child_rank;
                assert!(
                    [1, 2].contains(&rank_diff),
                    "rank difference {rank_diff} on the {dir:?} side"
                );

                let Some(child) = T::links(node).as_ref().child(dir) else {
                    continue;
                };

                // Ensure keys are ordered.
                let expected = match dir {
                    Dir::Left => Ordering::Less,
                    Dir::Right => Ordering::Greater,
                };
                assert_eq!(
                    child.as_ref().key().cmp(node.as_ref().key()),
                    expected,
                    "{dir:?} child is out of order"
                );

                // Ensure child's parent link points to this node.
                let parent = T::links(child)
                    .as_ref()
                    .parent()
                    .expect("child parent pointer not set");
                assert_eq!(node, parent, "child parent pointer is stale");

                size += self.assert_invariants_at(child);
            }

            assert_eq!(
                T::links(node).as_ref().size(),
                size,
                "subtree size is stale"
            );

            size
        }
    }

    /// Returns `true` if the tree contains an element with key `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must not modify the links or the key of the returned node.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Option<NonNull<T>>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert_eq!(
                T::links(parent).as_ref().child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );
            debug_assert!(
                new_child.is_none() || T::links(parent).as_ref().child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    /// Inserts an item into the tree.
    ///
    /// On success, returns the number of rebalancing steps taken. If an item with an equal key
    /// is already present, the tree is left untouched and `item` is handed back.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> core::result::Result<usize, T::Handle> {
        let ptr = T::into_ptr(item);

        // A fresh node is a leaf of rank 0 and size 1.
        unsafe { T::links(ptr).as_mut().clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            self.root = Some(ptr);
            return Ok(0);
        };

        let mut parent = root;

        // Descend the tree, looking for the empty slot `item` belongs in.
        let dir = loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Err(unsafe { T::from_ptr(ptr) }),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(parent).as_ref().child(dir) } {
                Some(child) => parent = child,
                None => break dir,
            }
        };

        unsafe {
            T::links(parent).as_mut().set_child(dir, Some(ptr));
            T::links(ptr).as_mut().set_parent(Some(parent));

            self.update_sizes_to_root(Some(parent));

            Ok(self.rebalance_inserted(parent))
        }
    }

    /// Removes the element with key `key` from the tree.
    ///
    /// Returns the removed element together with the number of rebalancing steps taken.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(T::Handle, usize)>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) }.0)
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) }.0)
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// Returns the removed element together with the number of rebalancing steps taken.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> (T::Handle, usize) {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    `node`'s successor, the least node in its right subtree, is unlinked and assumes
        //    `node`'s place and rank. The successor has no left child, so its right child (if
        //    any) is elevated into the slot it leaves behind.
        //
        // 2. `node` has one child, which is elevated into `node`'s slot.
        //
        // 3. `node` is a leaf, and is simply unlinked.
        //
        // In every case the rank rule can only be broken at the lowest node whose subtree lost
        // an element, where it shows up as a 3-child or a 2,2 leaf. Rebalancing starts there.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            let start = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = T::links(successor).as_ref().right();
                        self.replace_child(successor_parent, successor, successor_right);
                        self.maybe_set_parent(successor_right, Some(successor_parent));

                        T::links(successor).as_mut().set_right(Some(right));
                        T::links(right).as_mut().set_parent(Some(successor));
                    }

                    self.replace_child_or_set_root(parent, node, Some(successor));

                    // Transfer the position and rank of `node` to `successor`.
                    let node_rank = T::links(node).as_ref().rank();

                    T::links(successor).as_mut().set_parent(parent);
                    T::links(successor).as_mut().set_rank(node_rank);
                    T::links(successor).as_mut().set_left(Some(left));
                    // Right link is updated above iff succ != right.

                    T::links(left).as_mut().set_parent(Some(successor));

                    Some(successor_parent.unwrap_or(successor))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            T::links(node).as_mut().clear();

            self.update_sizes_to_root(start);
            let ops = self.rebalance_removed(start);

            (T::from_ptr(node), ops)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None). Sizes are not maintained
                // while tearing down.
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                T::links(cur).as_mut().clear();
                drop(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
    }

    /// Returns an iterator over the elements of the tree, in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.first_raw())
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.last_raw())
    }

    /// Returns a cursor pointing at the element with 1-based in-order `index`.
    ///
    /// The cursor starts on the ghost position if `index` is out of range.
    pub fn cursor_at(&self, index: usize) -> Cursor<'_, T> {
        Cursor::new(self, self.select_raw(index))
    }

    /// Returns an editing cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        let first = self.first_raw();
        CursorMut::new(self, first)
    }

    /// Returns an editing cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        let last = self.last_raw();
        CursorMut::new(self, last)
    }

    /// Returns an editing cursor pointing at the element with 1-based in-order `index`.
    pub fn cursor_at_mut(&mut self, index: usize) -> CursorMut<'_, T> {
        let node = self.select_raw(index);
        CursorMut::new(self, node)
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn promote(&mut self, node: NonNull<T>) {
        unsafe { T::links(node).as_mut().inner.get_mut().rank += 1 };
    }

    #[inline]
    unsafe fn promote_twice(&mut self, node: NonNull<T>) {
        unsafe { T::links(node).as_mut().inner.get_mut().rank += 2 };
    }

    #[inline]
    unsafe fn demote(&mut self, node: NonNull<T>) {
        unsafe { T::links(node).as_mut().inner.get_mut().rank -= 1 };
    }

    #[inline]
    unsafe fn demote_twice(&mut self, node: NonNull<T>) {
        unsafe { T::links(node).as_mut().inner.get_mut().rank -= 2 };
    }

    /// Returns the rank of the pointed-to node.
    unsafe fn rank(&self, node: Link<T>) -> i8 {
        node.map(|n| unsafe { T::links(n).as_ref().rank() })
            .unwrap_or(-1)
    }

    /// Returns the subtree size of the pointed-to node.
    unsafe fn size(&self, node: Link<T>) -> usize {
        node.map(|n| unsafe { T::links(n).as_ref().size() })
            .unwrap_or(0)
    }

    /// Returns the rank differences of `node`'s left and right children.
    unsafe fn rank_diffs(&self, node: NonNull<T>) -> (i8, i8) {
        unsafe {
            let links = T::links(node).as_ref();
            let rank = links.rank();

            (rank - self.rank(links.left()), rank - self.rank(links.right()))
        }
    }

    unsafe fn rank_diff(&self, node: NonNull<T>, dir: Dir) -> i8 {
        unsafe {
            let links = T::links(node).as_ref();
            links.rank() - self.rank(links.child(dir))
        }
    }

    // Recomputes the subtree size of `node` from its children.
    unsafe fn update_size(&mut self, node: NonNull<T>) {
        unsafe {
            let size = 1
                + self.size(T::links(node).as_ref().left())
                + self.size(T::links(node).as_ref().right());
            T::links(node).as_mut().set_size(size);
        }
    }

    // Recomputes subtree sizes on the path from `opt_node` to the root.
    unsafe fn update_sizes_to_root(&mut self, mut opt_node: Link<T>) {
        while let Some(node) = opt_node {
            unsafe {
                self.update_size(node);
                opt_node = T::links(node).as_ref().parent();
            }
        }
    }

    unsafe fn is_2_2(&self, node: NonNull<T>) -> bool {
        unsafe { self.rank_diffs(node) == (2, 2) }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for WavlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    /// Returns the links of a detached node: no parent, no children, rank 0 and size 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                size: 1,
                rank: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns the rank of the node these links belong to.
    #[inline]
    pub fn rank(&self) -> i8 {
        unsafe { (*self.inner.get()).rank }
    }

    /// Returns the number of elements in the subtree rooted at the node these links belong to.
    #[inline]
    pub fn size(&self) -> usize {
        unsafe { (*self.inner.get()).size }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_rank(&mut self, rank: i8) {
        self.inner.get_mut().rank = rank;
    }

    #[inline]
    fn set_size(&mut self, size: usize) {
        self.inner.get_mut().size = size;
    }

    // Resets to the detached state.
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.size = 1;
        inner.rank = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
