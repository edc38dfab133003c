//! # Host Trie Walker

use crate::trie::{FlatTrie, NO_TOKEN};
use crate::vocab::Vocab;

/// Exact greedy longest-match encoder over a flat trie.
///
/// Unlike the chunked GPU walk, matches may span the whole input, so this is
/// the reference for longest-match behavior (and the adapter-less path).
pub struct HostTrieWalker {
    trie: FlatTrie,
}

impl HostTrieWalker {
    /// Wrap a compiled trie.
    pub fn new(trie: FlatTrie) -> Self {
        Self { trie }
    }

    /// Compile a vocabulary and wrap the result.
    pub fn from_vocab(vocab: &Vocab) -> Self {
        Self::new(FlatTrie::from_vocab(vocab))
    }

    /// The wrapped trie.
    pub fn trie(&self) -> &FlatTrie {
        &self.trie
    }

    /// Greedy longest-match encode.
    ///
    /// A byte with no matching trie token emits its byte value, so the token
    /// stream always covers the input losslessly.
    pub fn encode(
        &self,
        input: &[u8],
    ) -> Vec<u32> {
        let mut out = Vec::new();
        let mut pos = 0usize;
        while pos < input.len() {
            let mut best_token = NO_TOKEN;
            let mut best_len = 0usize;

            let mut node = 0u32;
            let mut len = 0usize;
            while pos + len < input.len() {
                match self.trie.step(node, input[pos + len]) {
                    Some(next) => {
                        node = next;
                        len += 1;
                        let terminal = self.trie.nodes[node as usize].token_id;
                        if terminal != NO_TOKEN {
                            best_token = terminal;
                            best_len = len;
                        }
                    }
                    None => break,
                }
            }

            if best_token != NO_TOKEN {
                out.push(best_token);
                pos += best_len;
            } else {
                out.push(u32::from(input[pos]));
                pos += 1;
            }
        }
        out
    }
}
