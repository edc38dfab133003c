//! # Trie Compiler
//!
//! Compiles a [`Vocab`] into a flat byte-level trie: two contiguous arrays
//! (nodes, edges) in BFS order, with each node's children sorted ascending by
//! edge byte. The flat form is what the GPU walker consumes (two read-only
//! storage arrays) and what [`binary`] serializes.

pub mod binary;

use std::collections::VecDeque;

use crate::vocab::Vocab;

/// Sentinel `token_id` for non-terminal nodes.
pub const NO_TOKEN: u32 = 0xFFFF_FFFF;

/// One flat trie node.
///
/// Children occupy `edges[first_child .. first_child + num_children]`,
/// sorted ascending by symbol byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FlatNode {
    /// Offset of the first child edge.
    pub first_child: u32,

    /// Number of child edges.
    pub num_children: u32,

    /// Terminal token id, or [`NO_TOKEN`].
    pub token_id: u32,
}

/// One flat trie edge.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FlatEdge {
    /// The symbol byte, in the low 8 bits; upper bits zero.
    pub symbol: u32,

    /// Index of the target node.
    pub target: u32,
}

/// A vocabulary compiled to the flat (nodes, edges) form. Root is node 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTrie {
    /// Nodes in BFS order.
    pub nodes: Vec<FlatNode>,

    /// Edges, contiguous per node, sorted ascending by symbol byte.
    pub edges: Vec<FlatEdge>,

    /// Length in bytes of the longest token.
    pub max_token_len: u32,

    /// The vocabulary size the trie was compiled from.
    pub vocab_size: u32,
}

// Build-phase tree node. Children are kept byte-sorted so the flatten pass
// emits edges in the order the GPU binary search requires.
#[derive(Default)]
struct TreeNode {
    children: std::collections::BTreeMap<u8, usize>,
    token_id: u32,
}

impl FlatTrie {
    /// Compile a vocabulary.
    ///
    /// Walk/insert every `(token_id, bytes)` in vocabulary order, then
    /// flatten by BFS. Zero-length vocab entries are skipped silently.
    pub fn from_vocab(vocab: &Vocab) -> Self {
        let mut arena: Vec<TreeNode> = vec![TreeNode {
            children: Default::default(),
            token_id: NO_TOKEN,
        }];

        let mut max_token_len = 0u32;
        for (id, bytes) in vocab.iter() {
            if bytes.is_empty() {
                continue;
            }
            max_token_len = max_token_len.max(bytes.len() as u32);

            let mut node = 0usize;
            for &b in bytes {
                node = match arena[node].children.get(&b).copied() {
                    Some(child) => child,
                    None => {
                        let child = arena.len();
                        arena.push(TreeNode {
                            children: Default::default(),
                            token_id: NO_TOKEN,
                        });
                        arena[node].children.insert(b, child);
                        child
                    }
                };
            }
            arena[node].token_id = id;
        }

        // BFS numbering, then a second pass to emit nodes and edges.
        let mut bfs_order = Vec::with_capacity(arena.len());
        let mut bfs_index = vec![0u32; arena.len()];
        let mut queue = VecDeque::from([0usize]);
        while let Some(tree_idx) = queue.pop_front() {
            bfs_index[tree_idx] = bfs_order.len() as u32;
            bfs_order.push(tree_idx);
            queue.extend(arena[tree_idx].children.values());
        }

        let mut nodes = Vec::with_capacity(arena.len());
        let mut edges = Vec::new();
        for &tree_idx in &bfs_order {
            let tree_node = &arena[tree_idx];
            nodes.push(FlatNode {
                first_child: edges.len() as u32,
                num_children: tree_node.children.len() as u32,
                token_id: tree_node.token_id,
            });
            for (&byte, &child) in &tree_node.children {
                edges.push(FlatEdge {
                    symbol: byte as u32,
                    target: bfs_index[child],
                });
            }
        }

        Self {
            nodes,
            edges,
            max_token_len,
            vocab_size: vocab.len() as u32,
        }
    }

    /// Walk one edge from `node` by `byte`; `None` on dead end.
    pub fn step(
        &self,
        node: u32,
        byte: u8,
    ) -> Option<u32> {
        let n = &self.nodes[node as usize];
        let lo = n.first_child as usize;
        let hi = lo + n.num_children as usize;
        let span = &self.edges[lo..hi];
        span.binary_search_by_key(&(byte as u32), |e| e.symbol)
            .ok()
            .map(|i| span[i].target)
    }
}
