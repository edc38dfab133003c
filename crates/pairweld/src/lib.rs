#![warn(missing_docs, unused)]
//! # `pairweld` GPU BPE Trainer and Tokenizer
//!
//! `pairweld` learns a byte-pair encoding subword vocabulary from a text
//! corpus and tokenizes arbitrary input against a trained vocabulary. Both
//! phases run on a data-parallel compute device through `wgpu`; a host mirror
//! of each phase backs adapter-less environments and the deterministic test
//! suite.
//!
//! ## Client Summary
//!
//! ### Core Client Types
//! * [`Engine`] - owns the GPU device; entry point for training.
//! * [`Vocab`] - the token-id → byte-sequence registry.
//! * [`TrieTokenizer`] - greedy longest-match encoding against a flat trie.
//! * [`TrainerOptions`] and [`TrainingResult`] - training configuration and output.
//!
//! ## Training
//!
//! Training runs a batched merge loop on the device: per iteration, every
//! adjacent symbol pair in the corpus is counted into a lock-free hash table,
//! the most frequent pair is selected with a deterministic comparator, and
//! the symbol stream is rewritten through a fused merge/compaction pipeline.
//! The host reads back one merge log per batch of up to 128 merges.
//!
//! ```rust,no_run
//! use pairweld::{Engine, PWResult, TrainerOptions, TrieTokenizer};
//!
//! fn example() -> PWResult<Vec<u32>> {
//!     let engine = Engine::init()?;
//!
//!     let corpus = std::fs::read("corpus.txt")?;
//!     let result = engine.train(&corpus, &TrainerOptions::new(8192))?;
//!
//!     let tokenizer = TrieTokenizer::from_vocab(&engine, &result.vocab)?;
//!     tokenizer.encode(b"hello world")
//! }
//! ```
//!
//! ## Pre-Tokenization
//!
//! Word boundaries are marked before training so that no merge ever crosses a
//! word start. The default [`pretok::PreTokenizer`] applies NFC normalization
//! and Unicode-category boundary rules; a coarse byte-level GPU fallback is
//! used when Unicode classification is disabled or unavailable.
//!
//! ## Models
//!
//! Trained models serialize to a JSON document ([`vocab::io`]) and tokenized
//! corpora to a binary container ([`export`]). The compiled trie has its own
//! binary format ([`trie::binary`]) shared by the GPU walker and host tools.

pub mod export;
pub mod gpu;
pub mod pretok;
pub mod tokenize;
pub mod train;
pub mod trie;
pub mod vocab;

mod engine;
mod errors;
mod types;

#[doc(inline)]
pub use engine::Engine;
#[doc(inline)]
pub use errors::*;
#[doc(inline)]
pub use tokenize::TrieTokenizer;
#[doc(inline)]
pub use train::{ProgressUpdate, TrainerOptions, TrainingResult};
#[doc(inline)]
pub use types::*;
#[doc(inline)]
pub use vocab::Vocab;
