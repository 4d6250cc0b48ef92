use alloc::{collections::VecDeque, string::String};
use core::{fmt, ptr::NonNull};

use crate::{Links, TreeNode, WavlTree};

impl<T> WavlTree<T>
where
    T: TreeNode<Links<T>>,
{
    /// Writes the tree to `w` as a Graphviz digraph, one row per depth.
    ///
    /// Nodes are labelled `key r<rank> s<size>`; missing children are drawn as points.
    pub fn dotgraph<'a, W, K>(&'a self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display + From<&'a T::Key>,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let node = match queue.pop_front() {
                    Some(Item::Node(node)) => node,
                    Some(Item::Missing(id)) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let key: K = unsafe { node.as_ref().key().into() };
                let links = unsafe { T::links(node).as_ref() };
                write!(
                    w,
                    "\"graph{name}-{key}\" [label=\"{key} r{} s{}\"]; ",
                    links.rank(),
                    links.size()
                )?;

                for child in [links.left(), links.right()] {
                    match child {
                        Some(child) => {
                            let child_key: K = unsafe { child.as_ref().key().into() };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                edges,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                edges,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}")
    }
}
