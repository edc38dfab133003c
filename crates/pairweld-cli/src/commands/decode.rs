use std::io::Write;

use pairweld::export::read_corpus_file;

use crate::logging::LogArgs;

/// Args for the decode command.
#[derive(clap::Args, Debug)]
pub struct DecodeArgs {
    /// Tokenized corpus (.bin).
    file: String,

    #[clap(flatten)]
    pub logging: LogArgs,

    /// Output path; stdout when omitted.
    #[arg(short, long)]
    output: Option<String>,
}

impl DecodeArgs {
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(2)?;

        let (vocab, tokens) = read_corpus_file(&self.file)?;
        let bytes = vocab.decode(&tokens);
        log::info!("{} tokens -> {} bytes", tokens.len(), bytes.len());

        match &self.output {
            Some(path) => std::fs::write(path, &bytes)?,
            None => std::io::stdout().write_all(&bytes)?,
        }
        Ok(())
    }
}
