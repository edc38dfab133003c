use pairweld::export::write_corpus_file;
use pairweld::tokenize::HostTrieWalker;
use pairweld::vocab::io::read_model;
use pairweld::TrieTokenizer;

use crate::commands::try_engine;
use crate::logging::LogArgs;

/// Args for the encode command.
#[derive(clap::Args, Debug)]
pub struct EncodeArgs {
    /// Input file to tokenize.
    file: String,

    #[clap(flatten)]
    pub logging: LogArgs,

    /// Trained model path (JSON).
    #[arg(short, long)]
    model: String,

    /// Tokenize on the host even when a GPU is available.
    #[arg(long)]
    host: bool,

    /// Output corpus path (.bin).
    #[arg(short, long)]
    output: String,
}

impl EncodeArgs {
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(3)?;

        let vocab = read_model(&self.model)?;
        let input = std::fs::read(&self.file)?;
        log::info!(
            "encoding {} ({} bytes) against {} tokens",
            self.file,
            input.len(),
            vocab.len()
        );

        let engine = if self.host { None } else { try_engine()? };
        let tokens = match engine {
            Some(engine) => TrieTokenizer::from_vocab(&engine, &vocab)?.encode(&input)?,
            None => HostTrieWalker::from_vocab(&vocab).encode(&input),
        };

        log::info!(
            "{} tokens ({:.2} bytes/token)",
            tokens.len(),
            input.len() as f64 / tokens.len().max(1) as f64
        );

        write_corpus_file(&self.output, &vocab, &tokens)?;
        log::info!("corpus written: {}", self.output);
        Ok(())
    }
}
