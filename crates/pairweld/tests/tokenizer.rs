//! Tokenizer, trie, and model-format properties.

use pairweld::pretok::{PreTokenizer, PreTokenizerMode};
use pairweld::tokenize::HostTrieWalker;
use pairweld::train::train_on_host;
use pairweld::trie::{FlatTrie, binary};
use pairweld::vocab::{Vocab, io as vocab_io};
use pairweld::TrainerOptions;
use proptest::prelude::*;

#[test]
fn tiny_trie_scenario() {
    // Vocab [[a], [b], ..., [ab]]: "ab" is one token, "aba" is two.
    let mut vocab = Vocab::default();
    let ab = vocab.add_merge(97, 98, 2).unwrap();
    let walker = HostTrieWalker::from_vocab(&vocab);

    assert_eq!(walker.encode(b"ab"), vec![ab]);
    assert_eq!(walker.encode(b"aba"), vec![ab, 97]);
}

#[test]
fn decode_replaces_out_of_range_ids() {
    let vocab = Vocab::default();
    assert_eq!(vocab.decode(&[70000]), vec![0xEF, 0xBF, 0xBD]);
}

#[test]
fn trie_edges_ascending_after_training() {
    let result = train_on_host(
        b"she sells sea shells by the sea shore",
        &TrainerOptions::new(300),
    )
    .unwrap();
    let trie = FlatTrie::from_vocab(&result.vocab);

    for node in &trie.nodes {
        let lo = node.first_child as usize;
        let hi = lo + node.num_children as usize;
        for pair in trie.edges[lo..hi].windows(2) {
            assert!(pair[0].symbol < pair[1].symbol);
        }
    }
}

fn small_corpus() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..160)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_encode_decode_round_trips_raw_bytes(corpus in small_corpus()) {
        // Without a pre-tokenizer the stream must cover the input exactly.
        let options = TrainerOptions::new(280)
            .with_pre_tokenizer(PreTokenizerMode::ByteBoundary);
        let result = train_on_host(&corpus, &options).unwrap();

        let walker = HostTrieWalker::from_vocab(&result.vocab);
        let tokens = walker.encode(&corpus);
        prop_assert_eq!(result.vocab.decode(&tokens), corpus);
    }

    #[test]
    fn prop_merge_concatenation_invariant(corpus in small_corpus()) {
        let options = TrainerOptions::new(280)
            .with_pre_tokenizer(PreTokenizerMode::ByteBoundary);
        let result = train_on_host(&corpus, &options).unwrap();

        for m in &result.merges {
            let fused = [
                result.vocab.bytes(m.a).unwrap(),
                result.vocab.bytes(m.b).unwrap(),
            ]
            .concat();
            prop_assert_eq!(result.vocab.bytes(m.id).unwrap(), &fused[..]);
        }
    }

    #[test]
    fn prop_pretokenize_is_idempotent(text in "\\PC{0,60}") {
        let mut pt = PreTokenizer::default();
        let once = pt.pretokenize(text.as_bytes()).unwrap();
        let twice = pt.pretokenize(&once.bytes).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_trie_binary_round_trips(corpus in small_corpus()) {
        let options = TrainerOptions::new(270)
            .with_pre_tokenizer(PreTokenizerMode::ByteBoundary);
        let result = train_on_host(&corpus, &options).unwrap();

        let trie = FlatTrie::from_vocab(&result.vocab);
        let reparsed = binary::parse(&binary::serialize(&trie)).unwrap();
        prop_assert_eq!(trie, reparsed);
    }

    #[test]
    fn prop_model_json_round_trips(corpus in small_corpus()) {
        let options = TrainerOptions::new(270)
            .with_pre_tokenizer(PreTokenizerMode::ByteBoundary);
        let result = train_on_host(&corpus, &options).unwrap();

        let json = vocab_io::to_json(&result.vocab).unwrap();
        let reloaded = vocab_io::from_json(&json).unwrap();
        prop_assert_eq!(json, vocab_io::to_json(&reloaded).unwrap());
    }

    #[test]
    fn prop_word_starts_parallel_to_bytes(text in "\\PC{0,60}") {
        let out = PreTokenizer::default().pretokenize(text.as_bytes()).unwrap();
        prop_assert_eq!(out.bytes.len(), out.word_starts.len());
        if !out.bytes.is_empty() {
            prop_assert_eq!(out.word_starts[0], 1);
        }
    }
}
