use std::{collections::VecDeque, fmt};

use crate::{
    snapshot::{Hierarchy, NodeMeta, Payload},
    trace::Color,
};

impl<K: fmt::Display> Hierarchy<K> {
    /// Renders the snapshot as a Graphviz digraph, one `rank=same` group per level.
    ///
    /// Missing binary children are drawn as points. AVL nodes are labelled with their height and
    /// balance factor, red-black nodes are filled with their color.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        let Hierarchy::Node(root) = self else {
            return write!(w, "digraph \"graph-{name}\" {{}}");
        };

        let mut queue = VecDeque::new();
        queue.push_back(root);

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let Some(node) = queue.pop_front() else {
                    break;
                };
                let id = node.id.get();

                let mut label = match &node.payload {
                    Payload::Value(key) => key.to_string(),
                    Payload::Keys(keys) => keys
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("|"),
                };
                let mut style = String::new();
                match node.meta {
                    Some(NodeMeta::Avl { height, balance }) => {
                        write!(label, ":{height}/{balance:+}")?;
                    }
                    Some(NodeMeta::RedBlack { color }) => {
                        let fill = match color {
                            Color::Red => "red",
                            Color::Black => "black",
                        };
                        write!(style, " style=filled fillcolor={fill} fontcolor=white")?;
                    }
                    None => {}
                }
                write!(w, "\"graph{name}-{id}\" [label=\"{label}\"{style}]; ")?;

                for child in &node.children {
                    match child {
                        Hierarchy::Node(child) => {
                            writeln!(
                                links,
                                "\"graph{name}-{id}\" -> \"graph{name}-{}\";",
                                child.id.get()
                            )?;
                            queue.push_back(child);
                        }
                        Hierarchy::Empty => {
                            write!(w, "\"graph{name}-missing{missing}\" [shape=point]; ")?;
                            writeln!(
                                links,
                                "\"graph{name}-{id}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
