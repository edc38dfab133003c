//! # Tokenized Corpus Container
//!
//! Little-endian `.bin` layout: four u32 header words (`magic`, `vocab_size`,
//! `token_count`, `vocab_json_byte_length`), then the tokens, then the model
//! JSON embedded verbatim so the file is self-describing.

use std::io::{Read, Write};
use std::path::Path;

use crate::errors::{PWResult, PairweldError};
use crate::vocab::{Vocab, io as vocab_io};

/// `'DXFT'`.
pub const CORPUS_MAGIC: u32 = 0x4458_4654;

/// Write a tokenized corpus with its model embedded.
pub fn write_corpus<W: Write>(
    mut writer: W,
    vocab: &Vocab,
    tokens: &[u32],
) -> PWResult<()> {
    let json = vocab_io::to_json(vocab)?;

    for word in [
        CORPUS_MAGIC,
        vocab.len() as u32,
        tokens.len() as u32,
        json.len() as u32,
    ] {
        writer.write_all(&word.to_le_bytes())?;
    }
    for &token in tokens {
        writer.write_all(&token.to_le_bytes())?;
    }
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Read a tokenized corpus back into its model and token stream.
pub fn read_corpus<R: Read>(mut reader: R) -> PWResult<(Vocab, Vec<u32>)> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let conflict = |msg: &str| PairweldError::ModelConflict(msg.to_string());
    if data.len() < 16 {
        return Err(conflict("truncated corpus header"));
    }
    let word = |i: usize| u32::from_le_bytes(data[i * 4..i * 4 + 4].try_into().unwrap());

    if word(0) != CORPUS_MAGIC {
        return Err(conflict("bad corpus magic"));
    }
    let vocab_size = word(1);
    let token_count = word(2) as usize;
    let json_len = word(3) as usize;

    let expected = 16 + token_count * 4 + json_len;
    if data.len() != expected {
        return Err(PairweldError::ModelConflict(format!(
            "corpus length {} does not match header ({expected})",
            data.len()
        )));
    }

    let tokens = (0..token_count)
        .map(|k| u32::from_le_bytes(data[16 + k * 4..20 + k * 4].try_into().unwrap()))
        .collect();

    let json = core::str::from_utf8(&data[16 + token_count * 4..])
        .map_err(|_| conflict("embedded model JSON is not UTF-8"))?;
    let vocab = vocab_io::from_json(json)?;
    if vocab.len() as u32 != vocab_size {
        return Err(conflict("header vocab size disagrees with embedded model"));
    }

    Ok((vocab, tokens))
}

/// Write a corpus file.
pub fn write_corpus_file<P: AsRef<Path>>(
    path: P,
    vocab: &Vocab,
    tokens: &[u32],
) -> PWResult<()> {
    write_corpus(std::fs::File::create(path)?, vocab, tokens)
}

/// Read a corpus file.
pub fn read_corpus_file<P: AsRef<Path>>(path: P) -> PWResult<(Vocab, Vec<u32>)> {
    read_corpus(std::fs::File::open(path)?)
}
