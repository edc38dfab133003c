//! End-to-end training scenarios, on the host mirror unconditionally and on
//! the GPU when an adapter is present (skipped cleanly otherwise).

use pairweld::pretok::{PreTokenizer, PreTokenizerMode};
use pairweld::tokenize::HostTrieWalker;
use pairweld::train::train_on_host;
use pairweld::{Engine, PairweldError, TrainerOptions};

fn byte_opts(target: usize) -> TrainerOptions {
    TrainerOptions::new(target).with_pre_tokenizer(PreTokenizerMode::ByteBoundary)
}

#[test]
fn aaaa_trains_one_merge_and_tokenizes_to_two() {
    let result = train_on_host(b"aaaa", &byte_opts(257)).unwrap();

    let m = result.merges[0];
    assert_eq!(result.merges.len(), 1);
    assert_eq!((m.a, m.b, m.id), (97, 97, 256));

    let tokens = HostTrieWalker::from_vocab(&result.vocab).encode(b"aaaa");
    assert_eq!(tokens, vec![256, 256]);
}

#[test]
fn abab_early_stops_at_257_tokens() {
    let result = train_on_host(b"abab", &byte_opts(258)).unwrap();

    assert_eq!(result.merges.len(), 1);
    assert_eq!(
        (result.merges[0].a, result.merges[0].b, result.merges[0].id),
        (97, 98, 256)
    );
    assert_eq!(result.vocab.len(), 257);

    let tokens = HostTrieWalker::from_vocab(&result.vocab).encode(b"abab");
    assert_eq!(tokens, vec![256, 256]);
}

#[test]
fn hello_hello_word_starts_and_boundaries() {
    let pre = PreTokenizer::default().pretokenize(b"hello hello").unwrap();
    let starts: Vec<usize> = pre
        .word_starts
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s == 1)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(starts, vec![0, 5]);

    // No learned token bridges the end of one word into the space prefix of
    // the next.
    let result = train_on_host(b"hello hello hello hello", &TrainerOptions::new(330)).unwrap();
    for m in &result.merges {
        let bytes = result.vocab.bytes(m.id).unwrap();
        assert!(!bytes.windows(2).any(|w| w == b"o "));
    }
}

#[test]
fn empty_corpus_is_an_error() {
    assert!(matches!(
        train_on_host(b"", &TrainerOptions::new(300)),
        Err(PairweldError::EmptyCorpus)
    ));
}

#[test]
fn small_target_is_an_error() {
    assert!(matches!(
        train_on_host(b"abc", &TrainerOptions::new(100)),
        Err(PairweldError::InvalidTarget { value: 100 })
    ));
}

#[test]
fn single_byte_corpus_stops_with_base_vocab() {
    let result = train_on_host(b"q", &TrainerOptions::new(300)).unwrap();
    assert_eq!(result.vocab.len(), 256);
    assert!(result.merges.is_empty());
}

#[test]
fn unicode_round_trip_matches_nfc() {
    // decode(encode(x)) == NFC(x): the trained stream and the trie both work
    // over normalized bytes.
    let raw = "cafe\u{0301} du cafe\u{0301} \u{2019}tis 123456 don't".as_bytes();
    let normalized = PreTokenizer::default().pretokenize(raw).unwrap().bytes;

    let result = train_on_host(raw, &TrainerOptions::new(320)).unwrap();
    let walker = HostTrieWalker::from_vocab(&result.vocab);

    let tokens = walker.encode(&normalized);
    assert_eq!(result.vocab.decode(&tokens), normalized);
}

#[test]
fn training_is_deterministic_across_runs() {
    let corpus = b"it was the best of times, it was the worst of times";
    let a = train_on_host(corpus, &TrainerOptions::new(310)).unwrap();
    let b = train_on_host(corpus, &TrainerOptions::new(310)).unwrap();
    assert_eq!(a.merges, b.merges);
    assert_eq!(
        pairweld::vocab::io::to_json(&a.vocab).unwrap(),
        pairweld::vocab::io::to_json(&b.vocab).unwrap()
    );
}

#[test]
fn progress_fires_per_batch() {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let options = TrainerOptions::new(270)
        .with_pre_tokenizer(PreTokenizerMode::ByteBoundary)
        .with_batch_size(4)
        .with_progress(Box::new(move |update| {
            assert!(update.merge_index <= update.total_merges);
            assert!(update.best_count >= 2);
            seen.fetch_add(1, Ordering::Relaxed);
        }));

    let corpus = b"abcabcabc abcabcabc ababab cdcdcd".repeat(4);
    train_on_host(&corpus, &options).unwrap();
    assert!(calls.load(Ordering::Relaxed) >= 1);
}

// --- GPU parity (skipped without an adapter) -------------------------------

fn engine_or_skip() -> Option<Engine> {
    match Engine::init() {
        Ok(engine) => Some(engine),
        Err(_) => {
            eprintln!("no GPU adapter; skipping device test");
            None
        }
    }
}

#[test]
fn gpu_matches_host_on_small_corpus() {
    let Some(engine) = engine_or_skip() else {
        return;
    };
    let corpus = b"the cat sat on the mat; the cat sat.";
    let options = TrainerOptions::new(300);

    let gpu = engine.train(corpus, &options).unwrap();
    let host = train_on_host(corpus, &options).unwrap();
    assert_eq!(gpu.merges, host.merges);
}

#[test]
fn gpu_scenario_aaaa() {
    let Some(engine) = engine_or_skip() else {
        return;
    };
    let result = engine.train(b"aaaa", &byte_opts(257)).unwrap();
    assert_eq!(result.merges.len(), 1);
    assert_eq!(
        (result.merges[0].a, result.merges[0].b, result.merges[0].id),
        (97, 97, 256)
    );
}

#[test]
fn gpu_sequential_scan_crossing_matches_host() {
    let Some(engine) = engine_or_skip() else {
        return;
    };
    // Past 65,536 symbols the batch selects the sequential scan; the merges
    // must match the host mirror (and therefore the parallel-scan replica).
    let corpus = b"the rain in spain falls mainly on the plain. ".repeat(1600);
    assert!(corpus.len() > 65_536);
    let options = TrainerOptions::new(280);

    let gpu = engine.train(&corpus, &options).unwrap();
    let host = train_on_host(&corpus, &options).unwrap();
    assert_eq!(gpu.merges, host.merges);
}

#[test]
fn gpu_tokenizer_round_trips() {
    let Some(engine) = engine_or_skip() else {
        return;
    };
    let corpus = b"round and round the ragged rock the ragged rascal ran";
    let result = engine.train(corpus, &TrainerOptions::new(300)).unwrap();

    let tokenizer = pairweld::TrieTokenizer::from_vocab(&engine, &result.vocab).unwrap();
    let tokens = tokenizer.encode(corpus).unwrap();
    assert_eq!(tokenizer.decode(&tokens), corpus);
}
