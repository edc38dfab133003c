//! # Trainer
//!
//! The orchestrator drives the batched GPU merge loop: prepare input, write
//! the iteration state, submit up to [`BATCH_SIZE`] merge iterations per
//! command list, read back the merge log once per batch, and replay it into
//! the host [`Vocab`]. [`host`] carries a bit-identical mirror of the loop in
//! plain Rust for adapter-less environments and the deterministic test suite.

pub mod host;

pub use host::train_on_host;

use std::time::{Duration, Instant};

use crate::errors::{PWResult, PairweldError};
use crate::gpu::train_pipeline::{BATCH_SIZE, TrainingContext, initial_state};
use crate::gpu::GpuContext;
use crate::pretok::{PreTokenizer, PreTokenizerMode};
use crate::types::{BASE_TOKENS, Merge, WORD_START_BIT};
use crate::vocab::Vocab;

/// Per-batch progress report.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Merges completed so far.
    pub merge_index: u32,

    /// Merges requested (`target_vocab_size - 256`).
    pub total_merges: u32,

    /// Printable form of the batch's last merged token.
    pub merge_string: String,

    /// Frequency of the batch's last merged pair.
    pub best_count: u32,

    /// Live symbols after the batch.
    pub symbol_count: u32,

    /// Merge throughput of the batch.
    pub merges_per_second: f64,
}

/// Progress callback; fires at most once per batch.
pub type ProgressFn = Box<dyn Fn(&ProgressUpdate)>;

/// Training configuration.
pub struct TrainerOptions {
    /// The target vocabulary size; must be > 256.
    pub target_vocab_size: usize,

    /// Which word-boundary oracle prepares the corpus.
    pub pre_tokenizer: PreTokenizerMode,

    /// Merge iterations per submitted batch (clamped to [`BATCH_SIZE`]).
    pub batch_size: u32,

    /// Per-batch progress callback.
    pub on_progress: Option<ProgressFn>,
}

impl core::fmt::Debug for TrainerOptions {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        f.debug_struct("TrainerOptions")
            .field("target_vocab_size", &self.target_vocab_size)
            .field("pre_tokenizer", &self.pre_tokenizer)
            .field("batch_size", &self.batch_size)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl TrainerOptions {
    /// Create options for a target vocabulary size.
    pub fn new(target_vocab_size: usize) -> Self {
        Self {
            target_vocab_size,
            pre_tokenizer: PreTokenizerMode::default(),
            batch_size: BATCH_SIZE,
            on_progress: None,
        }
    }

    /// Sets the pre-tokenizer mode.
    pub fn with_pre_tokenizer(
        self,
        pre_tokenizer: PreTokenizerMode,
    ) -> Self {
        Self {
            pre_tokenizer,
            ..self
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(
        self,
        batch_size: u32,
    ) -> Self {
        Self { batch_size, ..self }
    }

    /// Sets the progress callback.
    pub fn with_progress(
        self,
        on_progress: ProgressFn,
    ) -> Self {
        Self {
            on_progress: Some(on_progress),
            ..self
        }
    }
}

/// A trained model: the vocabulary, its merge log, and the wall time spent.
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// The learned vocabulary.
    pub vocab: Vocab,

    /// Every merge in training order.
    pub merges: Vec<Merge>,

    /// Wall time of the training run.
    pub training_time: Duration,
}

pub(crate) fn validate(
    corpus: &[u8],
    options: &TrainerOptions,
) -> PWResult<()> {
    if corpus.is_empty() {
        return Err(PairweldError::EmptyCorpus);
    }
    if options.target_vocab_size <= BASE_TOKENS as usize {
        return Err(PairweldError::InvalidTarget {
            value: options.target_vocab_size,
        });
    }
    Ok(())
}

/// The prepared symbol stream; `tagged` is false when the word-start bits
/// still have to be applied by the on-device fallback kernel.
pub(crate) struct PreparedInput {
    pub symbols: Vec<u32>,
    pub tagged: bool,
}

/// Drive the pre-tokenizer (or defer to the GPU fallback) and build the
/// 32-bit symbol stream.
pub(crate) fn prepare_input(
    corpus: &[u8],
    mode: PreTokenizerMode,
) -> PWResult<PreparedInput> {
    match mode {
        PreTokenizerMode::Unicode => match PreTokenizer::default().pretokenize(corpus) {
            Ok(pre) => {
                let symbols = pre
                    .bytes
                    .iter()
                    .zip(&pre.word_starts)
                    .map(|(&b, &start)| {
                        u32::from(b) | if start != 0 { WORD_START_BIT } else { 0 }
                    })
                    .collect();
                Ok(PreparedInput {
                    symbols,
                    tagged: true,
                })
            }
            Err(err) => {
                // Degrade to the coarse on-device oracle.
                log::warn!("unicode pre-tokenizer failed ({err}); using byte-level fallback");
                Ok(PreparedInput {
                    symbols: corpus.iter().map(|&b| u32::from(b)).collect(),
                    tagged: false,
                })
            }
        },
        PreTokenizerMode::ByteBoundary => {
            log::warn!("byte-level boundary fallback selected; quality is reduced");
            Ok(PreparedInput {
                symbols: corpus.iter().map(|&b| u32::from(b)).collect(),
                tagged: false,
            })
        }
    }
}

/// Run the batched merge loop on the device.
pub(crate) fn run_training(
    gpu: &GpuContext,
    corpus: &[u8],
    options: &TrainerOptions,
) -> PWResult<TrainingResult> {
    validate(corpus, options)?;
    let started = Instant::now();

    let input = prepare_input(corpus, options.pre_tokenizer)?;
    if input.symbols.is_empty() {
        return Err(PairweldError::EmptyCorpus);
    }
    let symbol_count = u32::try_from(input.symbols.len())
        .map_err(|_| PairweldError::BufferAllocationFailed {
            size: input.symbols.len() as u64 * 4,
        })?;

    let target_merges = (options.target_vocab_size - BASE_TOKENS as usize).min(u32::MAX as usize) as u32;
    let batch_limit = options.batch_size.clamp(1, BATCH_SIZE);

    let tctx = TrainingContext::new(gpu, symbol_count)?;
    tctx.upload_symbols(gpu, &input.symbols);

    let mut state = initial_state(symbol_count, symbol_count);
    if !input.tagged {
        tctx.write_state(gpu, &state);
        tctx.run_word_boundary(gpu, symbol_count)?;
    }
    tctx.prime_indirect(gpu, symbol_count);

    log::info!(
        "training start: {symbol_count} symbols, {target_merges} merges requested"
    );

    let mut vocab = Vocab::default();
    let mut merges = Vec::with_capacity(target_merges as usize);
    let mut current_count = symbol_count;

    loop {
        let done = state.merges_done;
        let iterations = (target_merges - done).min(batch_limit);

        state.symbol_count = current_count;
        state.pending_symbol_count = current_count;
        state.log_cursor = 0;
        tctx.write_state(gpu, &state);

        let parallel_scan = TrainingContext::fits_parallel_scan(current_count);
        let batch = tctx.encode_batch(
            gpu,
            iterations,
            u64::from(done),
            current_count,
            parallel_scan,
        );

        let batch_started = Instant::now();
        gpu.queue.submit([batch]);
        let (new_state, batch_merges) = tctx.read_batch_results(gpu)?;
        let batch_time = batch_started.elapsed();

        for merge in &batch_merges {
            let id = vocab.add_merge(merge.a, merge.b, merge.count)?;
            if id != merge.id {
                return Err(PairweldError::ModelConflict(format!(
                    "device merge log assigned id {} where {id} was expected",
                    merge.id
                )));
            }
        }
        merges.extend_from_slice(&batch_merges);

        state = new_state;
        current_count = new_state.pending_symbol_count;

        log::debug!(
            "batch done: {} merges, {} symbols live",
            batch_merges.len(),
            current_count
        );

        // The per-batch callback is also the cooperative checkpoint: in a UI
        // embedding the caller pumps its event loop here.
        if let Some(on_progress) = &options.on_progress
            && let Some(last) = batch_merges.last()
        {
            on_progress(&ProgressUpdate {
                merge_index: new_state.merges_done,
                total_merges: target_merges,
                merge_string: vocab.token_string(last.id),
                best_count: last.count,
                symbol_count: current_count,
                merges_per_second: batch_merges.len() as f64 / batch_time.as_secs_f64().max(1e-9),
            });
        }

        if new_state.early_stop != 0 {
            log::info!("early stop after {} merges", new_state.merges_done);
            break;
        }
        if new_state.merges_done >= target_merges {
            break;
        }
    }

    log::info!(
        "training done: {} merges in {:.2?}",
        merges.len(),
        started.elapsed()
    );

    Ok(TrainingResult {
        vocab,
        merges,
        training_time: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = TrainerOptions::new(1000)
            .with_pre_tokenizer(PreTokenizerMode::ByteBoundary)
            .with_batch_size(32);

        assert_eq!(options.target_vocab_size, 1000);
        assert_eq!(options.pre_tokenizer, PreTokenizerMode::ByteBoundary);
        assert_eq!(options.batch_size, 32);
        assert!(options.on_progress.is_none());

        let options = options.with_progress(Box::new(|_| {}));
        assert!(options.on_progress.is_some());
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            validate(b"", &TrainerOptions::new(300)),
            Err(PairweldError::EmptyCorpus)
        ));
        assert!(matches!(
            validate(b"abc", &TrainerOptions::new(256)),
            Err(PairweldError::InvalidTarget { value: 256 })
        ));
        assert!(validate(b"abc", &TrainerOptions::new(257)).is_ok());
    }

    #[test]
    fn test_prepare_input_tags_word_starts() {
        let input = prepare_input(b"hi hi", PreTokenizerMode::Unicode).unwrap();
        assert!(input.tagged);
        assert_eq!(input.symbols.len(), 5);
        assert_eq!(input.symbols[0], u32::from(b'h') | WORD_START_BIT);
        assert_eq!(input.symbols[1], u32::from(b'i'));
        assert_eq!(input.symbols[2], u32::from(b' ') | WORD_START_BIT);
        assert_eq!(input.symbols[3], u32::from(b'h'));
    }

    #[test]
    fn test_prepare_input_byte_mode_is_untagged() {
        let input = prepare_input(b"hi hi", PreTokenizerMode::ByteBoundary).unwrap();
        assert!(!input.tagged);
        assert_eq!(input.symbols, vec![0x68, 0x69, 0x20, 0x68, 0x69]);
    }
}
