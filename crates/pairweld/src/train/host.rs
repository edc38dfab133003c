//! # Host-Mirror Trainer
//!
//! The same merge loop as the device pipeline, in plain Rust over the same
//! symbol representation: count every adjacent pair (skipping word starts and
//! token 0), select the best pair with the deterministic comparator, rewrite
//! with snapshot semantics. For any corpus and target the merge log is
//! byte-identical to the device's; the test suite leans on that.

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;

use crate::errors::{PWResult, PairweldError};
use crate::pretok::{PreTokenizerMode, coarse_word_starts};
use crate::train::{ProgressUpdate, TrainerOptions, TrainingResult, prepare_input, validate};
use crate::types::{
    BASE_TOKENS, MAX_TOKEN_ID, WORD_START_BIT, better_pair, pack_pair, token_of, unpack_pair,
};
use crate::vocab::Vocab;

// Below this many symbols the rayon split costs more than it saves.
const PARALLEL_COUNT_THRESHOLD: usize = 1 << 16;

/// Train on the host, mirroring the device semantics exactly.
pub fn train_on_host(
    corpus: &[u8],
    options: &TrainerOptions,
) -> PWResult<TrainingResult> {
    validate(corpus, options)?;
    let started = Instant::now();

    let input = prepare_input(corpus, options.pre_tokenizer)?;
    let mut symbols = input.symbols;
    if symbols.is_empty() {
        return Err(PairweldError::EmptyCorpus);
    }
    if !input.tagged {
        // Host stand-in for the word_boundary kernel.
        let bytes: Vec<u8> = symbols.iter().map(|&s| s as u8).collect();
        for (symbol, start) in symbols.iter_mut().zip(coarse_word_starts(&bytes)) {
            if start != 0 {
                *symbol |= WORD_START_BIT;
            }
        }
    }

    let target_merges = options.target_vocab_size - BASE_TOKENS as usize;
    let batch_limit = options.batch_size.max(1) as usize;

    let mut vocab = Vocab::default();
    let mut merges = Vec::with_capacity(target_merges);
    let mut next_token = BASE_TOKENS;
    let mut batch_started = Instant::now();
    let mut batch_merges = 0usize;

    while merges.len() < target_merges {
        let Some((pair, count)) = best_pair(&symbols) else {
            break;
        };
        if count < 2 || next_token > MAX_TOKEN_ID {
            break;
        }

        let (a, b) = unpack_pair(pair);
        let id = vocab.add_merge(a, b, count)?;
        debug_assert_eq!(id, next_token);
        merges.push(*vocab.merges().last().unwrap());

        rewrite_symbols(&mut symbols, a, b, next_token);
        next_token += 1;
        batch_merges += 1;

        if batch_merges == batch_limit || merges.len() == target_merges {
            if let Some(on_progress) = &options.on_progress {
                let last = merges.last().unwrap();
                on_progress(&ProgressUpdate {
                    merge_index: merges.len() as u32,
                    total_merges: target_merges as u32,
                    merge_string: vocab.token_string(last.id),
                    best_count: last.count,
                    symbol_count: symbols.len() as u32,
                    merges_per_second: batch_merges as f64
                        / batch_started.elapsed().as_secs_f64().max(1e-9),
                });
            }
            batch_started = Instant::now();
            batch_merges = 0;
        }
    }

    Ok(TrainingResult {
        vocab,
        merges,
        training_time: started.elapsed(),
    })
}

/// Count every adjacent pair and pick the winner of the deterministic
/// comparator, or `None` when no pair is countable.
fn best_pair(symbols: &[u32]) -> Option<(u32, u32)> {
    let counts = count_pairs(symbols);
    counts.into_iter().reduce(|best, cand| {
        if better_pair(cand.1, cand.0, best.1, best.0) {
            cand
        } else {
            best
        }
    })
}

/// Adjacent-pair histogram with the device's skip rules: never across a word
/// start, and token 0 never pairs.
fn count_pairs(symbols: &[u32]) -> HashMap<u32, u32> {
    let fold_window = |mut counts: HashMap<u32, u32>, window: &[u32]| {
        let (s0, s1) = (window[0], window[1]);
        let (t0, t1) = (token_of(s0), token_of(s1));
        if s1 & WORD_START_BIT == 0 && t0 != 0 && t1 != 0 {
            *counts.entry(pack_pair(t0, t1)).or_default() += 1;
        }
        counts
    };

    if symbols.len() < PARALLEL_COUNT_THRESHOLD {
        symbols.windows(2).fold(HashMap::new(), fold_window)
    } else {
        symbols
            .par_windows(2)
            .fold(HashMap::new, fold_window)
            .reduce(HashMap::new, |mut left, right| {
                for (pair, count) in right {
                    *left.entry(pair).or_default() += count;
                }
                left
            })
    }
}

/// Rewrite every non-overlapping occurrence of `(a, b)` as `z`, with all
/// decisions made against the pre-rewrite snapshot (the in-place device
/// kernel resolves to the same result), and compact in the same pass.
fn rewrite_symbols(
    symbols: &mut Vec<u32>,
    a: u32,
    b: u32,
    z: u32,
) {
    let n = symbols.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let raw = symbols[i];

        // B-side: drop positions consumed by a merge starting at i - 1.
        if i > 0
            && raw & WORD_START_BIT == 0
            && token_of(raw) == b
            && token_of(symbols[i - 1]) == a
        {
            continue;
        }

        // A-side: fuse at merge starts, keeping the word-start tag.
        let fused = i + 1 < n && {
            let next = symbols[i + 1];
            token_of(raw) == a && token_of(next) == b && next & WORD_START_BIT == 0
        };
        out.push(if fused { z | (raw & WORD_START_BIT) } else { raw });
    }
    *symbols = out;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(target: usize) -> TrainerOptions {
        TrainerOptions::new(target).with_pre_tokenizer(PreTokenizerMode::ByteBoundary)
    }

    #[test]
    fn test_aaaa_single_merge() {
        let result = train_on_host(b"aaaa", &opts(257)).unwrap();

        assert_eq!(result.merges.len(), 1);
        let m = result.merges[0];
        assert_eq!((m.a, m.b, m.id), (97, 97, 256));
        assert_eq!(result.vocab.bytes(256), Some(&b"aa"[..]));
    }

    #[test]
    fn test_abab_early_stops() {
        // First merge (a, b) with count 2; the follow-up pair has count 1 and
        // stops the loop, leaving 257 tokens.
        let result = train_on_host(b"abab", &opts(258)).unwrap();

        assert_eq!(result.merges.len(), 1);
        let m = result.merges[0];
        assert_eq!((m.a, m.b, m.id), (97, 98, 256));
        assert_eq!(result.vocab.len(), 257);
    }

    #[test]
    fn test_single_byte_corpus_stops_at_base() {
        let result = train_on_host(b"x", &opts(300)).unwrap();
        assert!(result.merges.is_empty());
        assert_eq!(result.vocab.len(), 256);
    }

    #[test]
    fn test_no_merge_across_word_starts() {
        // "hello hello": the second 'h' continues the space-prefixed word,
        // but position 5 (the space) is a word start, so "o h" never merges.
        let result = train_on_host(
            b"hello hello hello hello",
            &TrainerOptions::new(400),
        )
        .unwrap();

        for m in &result.merges {
            let merged = result.vocab.bytes(m.id).unwrap();
            assert!(!merged.windows(2).any(|w| w == b"o "));
        }
    }

    #[test]
    fn test_deterministic_runs() {
        let corpus = b"the quick brown fox jumps over the lazy dog; the dog sleeps.";
        let first = train_on_host(corpus, &opts(300)).unwrap();
        let second = train_on_host(corpus, &opts(300)).unwrap();
        assert_eq!(first.merges, second.merges);
    }

    #[test]
    fn test_tie_breaks_to_smaller_pair() {
        // "ab", "bx", "xc", "cd" all occur twice; (a, b) packs smallest.
        let result = train_on_host(b"abxcdxabxcd", &opts(257)).unwrap();
        let m = result.merges[0];
        assert_eq!((m.a, m.b), (97, 98));
    }

    #[test]
    fn test_vocab_concatenation_invariant() {
        let corpus = b"low lower lowest newest newer new";
        let result = train_on_host(corpus, &TrainerOptions::new(320)).unwrap();

        for m in &result.merges {
            let left = result.vocab.bytes(m.a).unwrap();
            let right = result.vocab.bytes(m.b).unwrap();
            let fused = result.vocab.bytes(m.id).unwrap();
            assert_eq!(fused, [left, right].concat());
        }
    }

    #[test]
    fn test_rewrite_equal_pair_run() {
        // A run of equal symbols collapses under snapshot semantics: every
        // interior position is both a merge start and consumed by its left
        // neighbor, so "aaa" and "aaaa" both reduce to one fused symbol.
        let mut symbols = vec![97, 97, 97];
        rewrite_symbols(&mut symbols, 97, 97, 256);
        assert_eq!(symbols, vec![256]);

        let mut symbols = vec![97, 97, 97, 97];
        rewrite_symbols(&mut symbols, 97, 97, 256);
        assert_eq!(symbols, vec![256]);
    }

    #[test]
    fn test_rewrite_respects_word_start() {
        let mut symbols = vec![97, 98, 97 | WORD_START_BIT, 98];
        rewrite_symbols(&mut symbols, 97, 98, 256);
        assert_eq!(symbols, vec![256, 256 | WORD_START_BIT]);

        // A word start on the b-side blocks the fuse entirely.
        let mut symbols = vec![97, 98 | WORD_START_BIT];
        rewrite_symbols(&mut symbols, 97, 98, 256);
        assert_eq!(symbols, vec![97, 98 | WORD_START_BIT]);
    }

    #[test]
    fn test_nul_bytes_never_merge() {
        let result = train_on_host(&[0, 0, 0, 0, 0, 0], &opts(300)).unwrap();
        assert!(result.merges.is_empty());
    }
}
