//! # Tokenizer
//!
//! Greedy longest-match BPE inference against a compiled trie. The GPU path
//! walks fixed-size chunks in parallel and compacts the per-chunk token
//! arrays into one stream; [`HostTrieWalker`] is the exact whole-stream
//! mirror.

mod host;

pub use host::HostTrieWalker;

use crate::engine::Engine;
use crate::errors::PWResult;
use crate::gpu::{GpuContext, TokenizePipeline};
use crate::trie::FlatTrie;
use crate::vocab::Vocab;

/// Default chunk length in bytes for the GPU walk.
pub const DEFAULT_CHUNK_SIZE: u32 = 512;

/// GPU trie tokenizer for one trained vocabulary.
///
/// Matches never extend past a chunk end, so a token straddling a chunk
/// boundary splits into shorter tokens there. The stream still covers the
/// input losslessly; only the split points can differ from
/// [`HostTrieWalker`]'s whole-stream longest match. This is the accepted
/// cost of one-thread-per-chunk parallelism.
pub struct TrieTokenizer {
    gpu: GpuContext,
    pipeline: TokenizePipeline,
    vocab: Vocab,
    chunk_size: u32,
}

impl TrieTokenizer {
    /// Compile `vocab` into a flat trie and upload it to the engine's device.
    pub fn from_vocab(
        engine: &Engine,
        vocab: &Vocab,
    ) -> PWResult<Self> {
        let trie = FlatTrie::from_vocab(vocab);
        let pipeline = TokenizePipeline::new(engine.gpu(), &trie)?;
        Ok(Self {
            gpu: engine.gpu().clone(),
            pipeline,
            vocab: vocab.clone(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Sets the chunk length in bytes (minimum 1).
    pub fn with_chunk_size(
        self,
        chunk_size: u32,
    ) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..self
        }
    }

    /// The vocabulary this tokenizer encodes against.
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Tokenize `input` on the device.
    pub fn encode(
        &self,
        input: &[u8],
    ) -> PWResult<Vec<u32>> {
        self.pipeline.encode(&self.gpu, input, self.chunk_size)
    }

    /// Decode a token stream; out-of-range ids emit U+FFFD.
    pub fn decode(
        &self,
        tokens: &[u32],
    ) -> Vec<u8> {
        self.vocab.decode(tokens)
    }
}
