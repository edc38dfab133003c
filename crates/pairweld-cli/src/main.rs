mod commands;
mod logging;

use clap::{Parser, Subcommand};

/// GPU byte-pair encoding trainer and trie tokenizer.
#[derive(Parser, Debug)]
#[command(name = "pweld", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a vocabulary from text files.
    Train(commands::train::TrainArgs),

    /// Tokenize a file against a trained model.
    Encode(commands::encode::EncodeArgs),

    /// Decode a tokenized corpus back to bytes.
    Decode(commands::decode::DecodeArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Train(args) => args.run(),
        Commands::Encode(args) => args.run(),
        Commands::Decode(args) => args.run(),
    }
}
