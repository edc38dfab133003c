//! # Vocabulary
//!
//! Registry of token-id → byte sequence. Tokens `0..=255` are the single-byte
//! base; every learned merge appends one entry. All mutation is host-side;
//! the GPU only ever reads compiled forms of the vocabulary.

pub mod io;

use crate::errors::{PWResult, PairweldError};
use crate::types::{MAX_TOKEN_ID, Merge};

/// UTF-8 replacement character, emitted for out-of-range token ids.
pub const REPLACEMENT_BYTES: [u8; 3] = [0xEF, 0xBF, 0xBD];

/// Ordered token-id → byte-sequence registry.
///
/// Invariant: for every recorded merge `(a, b, id)`,
/// `bytes(id) == bytes(a) ++ bytes(b)` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    entries: Vec<Vec<u8>>,
    merges: Vec<Merge>,
}

impl Default for Vocab {
    fn default() -> Self {
        Self {
            entries: (0..=255u8).map(|b| vec![b]).collect(),
            merges: Vec::new(),
        }
    }
}

impl Vocab {
    /// The next token id that [`Vocab::add_merge`] will assign.
    pub fn next_id(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The number of tokens, base bytes included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the 256 base tokens are unconditional.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Append the fusion of two existing tokens.
    ///
    /// ## Arguments
    /// * `a` - Left token id.
    /// * `b` - Right token id.
    /// * `count` - The pair frequency at merge time (recorded, not validated).
    ///
    /// ## Returns
    /// The token id assigned to the fusion.
    pub fn add_merge(
        &mut self,
        a: u32,
        b: u32,
        count: u32,
    ) -> PWResult<u32> {
        let id = self.next_id();
        if id > MAX_TOKEN_ID {
            return Err(PairweldError::ModelConflict(format!(
                "token id space exhausted at merge ({a}, {b})"
            )));
        }
        let (Some(left), Some(right)) = (self.bytes(a), self.bytes(b)) else {
            return Err(PairweldError::ModelConflict(format!(
                "merge ({a}, {b}) references unknown tokens (vocab size {})",
                self.entries.len()
            )));
        };

        let mut fused = Vec::with_capacity(left.len() + right.len());
        fused.extend_from_slice(left);
        fused.extend_from_slice(right);

        self.entries.push(fused);
        self.merges.push(Merge { a, b, id, count });
        Ok(id)
    }

    /// Get the byte sequence of a token, if the id is in range.
    pub fn bytes(
        &self,
        id: u32,
    ) -> Option<&[u8]> {
        self.entries.get(id as usize).map(Vec::as_slice)
    }

    /// The recorded merges, in training order.
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Stable iterator over `(id, bytes)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, bytes)| (id as u32, bytes.as_slice()))
    }

    /// Decode a token stream into bytes.
    ///
    /// Token ids at or beyond the vocabulary size emit the UTF-8 replacement
    /// character instead.
    pub fn decode(
        &self,
        tokens: &[u32],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(tokens.len() * 2);
        for &t in tokens {
            match self.bytes(t) {
                Some(bytes) => out.extend_from_slice(bytes),
                None => out.extend_from_slice(&REPLACEMENT_BYTES),
            }
        }
        out
    }

    /// The length in bytes of the longest token.
    pub fn max_token_len(&self) -> usize {
        self.entries.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Printable form of a token's bytes, for progress lines and the CLI.
    pub fn token_string(
        &self,
        id: u32,
    ) -> String {
        match self.bytes(id) {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => String::from("<invalid>"),
        }
    }
}

/// Rebuild a [`Vocab`] from a merge log.
///
/// Each `(a, b, id)` must assign the next sequential id; this is how the
/// trainer replays the device-produced log into host state.
pub fn vocab_from_merges(merges: &[Merge]) -> PWResult<Vocab> {
    let mut vocab = Vocab::default();
    for merge in merges {
        let id = vocab.add_merge(merge.a, merge.b, merge.count)?;
        if id != merge.id {
            return Err(PairweldError::ModelConflict(format!(
                "merge log assigns id {} where {} was expected",
                merge.id, id
            )));
        }
    }
    Ok(vocab)
}
