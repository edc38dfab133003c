//! # Trie Binary Format (v3)
//!
//! Little-endian throughout. Layout: 28-byte header, then `node_count × 12`
//! bytes of nodes, then `edge_count × 8` bytes of edges.
//!
//! Header fields in order: `magic`, `version`, `node_count`, `edge_count`,
//! `max_token_len`, `vocab_size`, `flags`. Each node:
//! `(first_child_edge_offset, num_children, token_id)`. Each edge: one symbol
//! byte, three zero pad bytes, then the target node index.

use crate::errors::{PWResult, PairweldError};
use crate::trie::{FlatEdge, FlatNode, FlatTrie};

/// The ASCII bytes `TRIE`, read as a big-endian word.
pub const TRIE_MAGIC: u32 = 0x5452_4945;

/// The supported format version.
pub const TRIE_VERSION: u32 = 3;

const HEADER_LEN: usize = 28;
const NODE_LEN: usize = 12;
const EDGE_LEN: usize = 8;

/// Serialize a flat trie to the v3 binary layout.
pub fn serialize(trie: &FlatTrie) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(HEADER_LEN + trie.nodes.len() * NODE_LEN + trie.edges.len() * EDGE_LEN);

    for word in [
        TRIE_MAGIC,
        TRIE_VERSION,
        trie.nodes.len() as u32,
        trie.edges.len() as u32,
        trie.max_token_len,
        trie.vocab_size,
        0, // flags
    ] {
        out.extend_from_slice(&word.to_le_bytes());
    }

    for node in &trie.nodes {
        out.extend_from_slice(&node.first_child.to_le_bytes());
        out.extend_from_slice(&node.num_children.to_le_bytes());
        out.extend_from_slice(&node.token_id.to_le_bytes());
    }
    for edge in &trie.edges {
        out.push(edge.symbol as u8);
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&edge.target.to_le_bytes());
    }

    out
}

/// Parse and validate a v3 binary trie.
pub fn parse(data: &[u8]) -> PWResult<FlatTrie> {
    let invalid = |reason: &str| PairweldError::InvalidTrie {
        reason: reason.to_string(),
    };

    if data.len() < HEADER_LEN {
        return Err(invalid("truncated header"));
    }
    let word = |i: usize| u32::from_le_bytes(data[i * 4..i * 4 + 4].try_into().unwrap());

    if word(0) != TRIE_MAGIC {
        return Err(invalid("bad magic"));
    }
    if word(1) != TRIE_VERSION {
        return Err(PairweldError::InvalidTrie {
            reason: format!("unsupported version {}", word(1)),
        });
    }
    let node_count = word(2) as usize;
    let edge_count = word(3) as usize;
    let max_token_len = word(4);
    let vocab_size = word(5);

    let expected = HEADER_LEN + node_count * NODE_LEN + edge_count * EDGE_LEN;
    if data.len() != expected {
        return Err(PairweldError::InvalidTrie {
            reason: format!("length {} does not match counts ({expected})", data.len()),
        });
    }
    if node_count == 0 {
        return Err(invalid("no root node"));
    }

    let mut nodes = Vec::with_capacity(node_count);
    for i in 0..node_count {
        let base = HEADER_LEN + i * NODE_LEN;
        let field = |k: usize| {
            u32::from_le_bytes(data[base + k * 4..base + k * 4 + 4].try_into().unwrap())
        };
        nodes.push(FlatNode {
            first_child: field(0),
            num_children: field(1),
            token_id: field(2),
        });
    }

    let edge_base = HEADER_LEN + node_count * NODE_LEN;
    let mut edges = Vec::with_capacity(edge_count);
    for i in 0..edge_count {
        let base = edge_base + i * EDGE_LEN;
        let target = u32::from_le_bytes(data[base + 4..base + 8].try_into().unwrap());
        edges.push(FlatEdge {
            symbol: data[base] as u32,
            target,
        });
    }

    // Structural validation: child spans in bounds, targets in bounds, and
    // each node's edges strictly ascending by symbol byte.
    for (i, node) in nodes.iter().enumerate() {
        let lo = node.first_child as usize;
        let Some(hi) = lo.checked_add(node.num_children as usize) else {
            return Err(invalid("child span overflow"));
        };
        if hi > edge_count {
            return Err(PairweldError::InvalidTrie {
                reason: format!("node {i} child span [{lo}, {hi}) exceeds edge count"),
            });
        }
        for pair in edges[lo..hi].windows(2) {
            if pair[0].symbol >= pair[1].symbol {
                return Err(PairweldError::InvalidTrie {
                    reason: format!("node {i} edges are not strictly ascending"),
                });
            }
        }
        for edge in &edges[lo..hi] {
            if edge.target as usize >= node_count {
                return Err(PairweldError::InvalidTrie {
                    reason: format!("node {i} edge targets node {} out of range", edge.target),
                });
            }
        }
    }

    Ok(FlatTrie {
        nodes,
        edges,
        max_token_len,
        vocab_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::Vocab;

    fn sample_trie() -> FlatTrie {
        let mut vocab = Vocab::default();
        let ab = vocab.add_merge(97, 98, 6).unwrap();
        vocab.add_merge(ab, 99, 2).unwrap();
        FlatTrie::from_vocab(&vocab)
    }

    #[test]
    fn test_header_layout() {
        let trie = sample_trie();
        let blob = serialize(&trie);

        assert_eq!(&blob[0..4], &0x5452_4945u32.to_le_bytes());
        assert_eq!(&blob[4..8], &3u32.to_le_bytes());
        assert_eq!(
            blob.len(),
            28 + trie.nodes.len() * 12 + trie.edges.len() * 8
        );

        // Edge pad bytes are zero.
        let edge_base = 28 + trie.nodes.len() * 12;
        assert_eq!(&blob[edge_base + 1..edge_base + 4], &[0, 0, 0]);
    }

    #[test]
    fn test_round_trip() {
        let trie = sample_trie();
        let reparsed = parse(&serialize(&trie)).unwrap();
        assert_eq!(trie, reparsed);
    }

    #[test]
    fn test_rejects_malformed_blobs() {
        let blob = serialize(&sample_trie());

        assert!(parse(&blob[..20]).is_err());

        let mut bad_magic = blob.clone();
        bad_magic[0] ^= 1;
        assert!(parse(&bad_magic).is_err());

        let mut bad_version = blob.clone();
        bad_version[4] = 9;
        assert!(parse(&bad_version).is_err());

        let mut truncated = blob.clone();
        truncated.pop();
        assert!(parse(&truncated).is_err());

        // Point node 0's child span past the edge array.
        let mut bad_span = blob.clone();
        bad_span[28 + 4..28 + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(parse(&bad_span).is_err());
    }
}
