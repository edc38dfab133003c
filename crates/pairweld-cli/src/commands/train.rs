use pairweld::pretok::PreTokenizerMode;
use pairweld::train::train_on_host;
use pairweld::vocab::io::write_model;
use pairweld::{TrainerOptions, TrainingResult};

use crate::commands::try_engine;
use crate::logging::LogArgs;

/// Args for the train command.
#[derive(clap::Args, Debug)]
pub struct TrainArgs {
    /// Input text files, concatenated in order.
    files: Vec<String>,

    #[clap(flatten)]
    pub logging: LogArgs,

    /// Target vocab size.
    #[arg(long, default_value = "8192")]
    vocab_size: usize,

    /// Use the coarse byte-level boundary fallback instead of Unicode rules.
    #[arg(long)]
    raw_boundaries: bool,

    /// Train on the host even when a GPU is available.
    #[arg(long)]
    host: bool,

    /// Output model path (JSON).
    #[arg(short, long)]
    output: String,
}

impl TrainArgs {
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(3)?;

        log::info!("reading corpus:");
        let mut corpus = Vec::new();
        for (idx, path) in self.files.iter().enumerate() {
            log::info!("{idx}: {path}");
            corpus.extend_from_slice(&std::fs::read(path)?);
        }

        let mode = if self.raw_boundaries {
            PreTokenizerMode::ByteBoundary
        } else {
            PreTokenizerMode::Unicode
        };
        let options = TrainerOptions::new(self.vocab_size)
            .with_pre_tokenizer(mode)
            .with_progress(Box::new(|update| {
                log::info!(
                    "merge {}/{}: {:?} (count {}, {} symbols, {:.0} merges/s)",
                    update.merge_index,
                    update.total_merges,
                    update.merge_string,
                    update.best_count,
                    update.symbol_count,
                    update.merges_per_second,
                );
            }));

        let engine = if self.host { None } else { try_engine()? };
        let result: TrainingResult = match engine {
            Some(engine) => engine.train(&corpus, &options)?,
            None => train_on_host(&corpus, &options)?,
        };

        log::info!(
            "trained {} tokens ({} merges) in {:.2?}",
            result.vocab.len(),
            result.merges.len(),
            result.training_time,
        );

        write_model(&result.vocab, &self.output)?;
        log::info!("model written: {}", self.output);
        Ok(())
    }
}
