use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{Dir, Link, Links, TreeNode, WavlTree};

/// A read-only position in a [`WavlTree`].
///
/// Besides the elements themselves, a cursor can rest on the *ghost* position, which sits after
/// the maximum and before the minimum. Stepping past either end lands on the ghost, and stepping
/// off the ghost wraps around. Cursors can also jump straight to an in-order index with
/// [`seek`](Cursor::seek), which descends by subtree sizes.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    at: Position<T>,
    _tree: PhantomData<&'tree WavlTree<T>>,
}

/// An editing position in a [`WavlTree`].
///
/// Moves like [`Cursor`], and can additionally unlink the element it rests on.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    at: Position<T>,
    _tree: PhantomData<&'tree mut WavlTree<T>>,
}

// Tree pointer plus the current node; `None` is the ghost.
struct Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<WavlTree<T>>,
    node: Link<T>,
}

impl<T> Clone for Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Position {
            tree: self.tree,
            node: self.node,
        }
    }
}

impl<T> Copy for Position<T> where T: TreeNode<Links<T>> + ?Sized {}

impl<T> Position<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    // Callers guarantee the tree outlives the position and is not aliased mutably while it is
    // read through here.
    fn tree(&self) -> &WavlTree<T> {
        unsafe { self.tree.as_ref() }
    }

    fn neighbor(&self, dir: Dir) -> Link<T> {
        let tree = self.tree();

        match (self.node, dir) {
            (Some(node), _) => unsafe { tree.neighbor_raw(node, dir) },
            (None, Dir::Right) => tree.first_raw(),
            (None, Dir::Left) => tree.last_raw(),
        }
    }

    fn step(&mut self, dir: Dir) {
        self.node = self.neighbor(dir);
    }

    fn seek(&mut self, index: usize) {
        self.node = self.tree().select_raw(index);
    }

    fn index(&self) -> Option<usize> {
        let node = self.node?;
        Some(unsafe { self.tree().position_raw(node) })
    }

    fn peek<'a>(&self, dir: Dir) -> Option<&'a T> {
        self.neighbor(dir).map(|node| unsafe { node.as_ref() })
    }

    fn current<'a>(&self) -> Option<&'a T> {
        self.node.map(|node| unsafe { node.as_ref() })
    }

    // Unlinks the current node after moving to its neighbor in `dir`. Nodes never move in
    // memory during a removal, so the neighbor stays valid.
    unsafe fn unlink(&mut self, dir: Dir) -> Option<(T::Handle, usize)> {
        let victim = self.node?;
        self.step(dir);

        let tree = unsafe { self.tree.as_mut() };
        Some(unsafe { tree.remove_at(victim) })
    }
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree WavlTree<T>, node: Link<T>) -> Self {
        Cursor {
            at: Position {
                tree: tree.into(),
                node,
            },
            _tree: PhantomData,
        }
    }

    /// Steps to the next larger element, or from the maximum onto the ghost.
    pub fn move_next(&mut self) {
        self.at.step(Dir::Right);
    }

    /// Steps to the next smaller element, or from the minimum onto the ghost.
    pub fn move_prev(&mut self) {
        self.at.step(Dir::Left);
    }

    /// Jumps to the element at 1-based in-order `index`.
    ///
    /// An index of 0 or past the length parks the cursor on the ghost. Runs in O(log n).
    pub fn seek(&mut self, index: usize) {
        self.at.seek(index);
    }

    /// The element under the cursor, or `None` on the ghost.
    pub fn get(&self) -> Option<&'tree T> {
        self.at.current()
    }

    /// The 1-based in-order index of the element under the cursor, or `None` on the ghost.
    ///
    /// Computed from subtree sizes on the path to the root.
    pub fn index(&self) -> Option<usize> {
        self.at.index()
    }

    /// The element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&'tree T> {
        self.at.peek(Dir::Right)
    }

    /// The element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        self.at.peek(Dir::Left)
    }
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree mut WavlTree<T>, node: Link<T>) -> Self {
        CursorMut {
            at: Position {
                tree: tree.into(),
                node,
            },
            _tree: PhantomData,
        }
    }

    /// Borrows this cursor as a read-only [`Cursor`] at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            at: self.at,
            _tree: PhantomData,
        }
    }

    pub fn move_next(&mut self) {
        self.at.step(Dir::Right);
    }

    pub fn move_prev(&mut self) {
        self.at.step(Dir::Left);
    }

    /// Jumps to the element at 1-based in-order `index`; out of range parks on the ghost.
    pub fn seek(&mut self, index: usize) {
        self.at.seek(index);
    }

    pub fn get(&self) -> Option<&T> {
        self.at.current()
    }

    pub fn index(&self) -> Option<usize> {
        self.at.index()
    }

    /// Pinned mutable access to the element under the cursor.
    ///
    /// # Safety
    ///
    /// The element's links must not be touched, and its key must keep comparing the same way
    /// against every other key in the tree.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        self.at
            .node
            .map(|mut node| unsafe { Pin::new_unchecked(node.as_mut()) })
    }

    pub fn peek_next(&self) -> Option<&T> {
        self.at.peek(Dir::Right)
    }

    pub fn peek_prev(&self) -> Option<&T> {
        self.at.peek(Dir::Left)
    }

    /// Unlinks the element under the cursor and moves on to its successor.
    ///
    /// Returns the element with the number of rebalancing operations the removal took, exactly
    /// as [`WavlTree::remove`] reports them. On the ghost nothing happens and `None` is returned.
    pub fn remove_current(&mut self) -> Option<(T::Handle, usize)> {
        unsafe { self.at.unlink(Dir::Right) }
    }

    /// Like [`remove_current`](Self::remove_current), but moves back to the predecessor.
    pub fn remove_current_and_move_prev(&mut self) -> Option<(T::Handle, usize)> {
        unsafe { self.at.unlink(Dir::Left) }
    }
}
