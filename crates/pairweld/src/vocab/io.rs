//! # Model JSON IO
//!
//! The interchange format for trained models:
//!
//! ```json
//! {"version": 1, "vocabSize": 258, "vocab": [[0], [1], ...],
//!  "merges": [[97, 98, 256], [256, 99, 257]]}
//! ```
//!
//! `vocab[i]` is the byte sequence for token `i`; entries `0..=255` are the
//! single-byte base; entries `256+` satisfy `vocab[id] = vocab[a] ++ vocab[b]`
//! for their merge. Loading validates both invariants.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{PWResult, PairweldError};
use crate::vocab::Vocab;

/// The supported model document version.
pub const MODEL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDoc {
    version: u32,
    vocab_size: u32,
    vocab: Vec<Vec<u8>>,
    merges: Vec<(u16, u16, u32)>,
}

/// Serialize a vocabulary to the model JSON document.
pub fn to_json(vocab: &Vocab) -> PWResult<String> {
    let doc = ModelDoc {
        version: MODEL_VERSION,
        vocab_size: vocab.len() as u32,
        vocab: vocab.iter().map(|(_, bytes)| bytes.to_vec()).collect(),
        merges: vocab
            .merges()
            .iter()
            .map(|m| (m.a as u16, m.b as u16, m.id))
            .collect(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Parse and validate a model JSON document.
///
/// ## Returns
/// The reconstructed [`Vocab`]. Merge counts are not part of the document and
/// load as zero.
pub fn from_json(json: &str) -> PWResult<Vocab> {
    let doc: ModelDoc = serde_json::from_str(json)?;

    if doc.version != MODEL_VERSION {
        return Err(PairweldError::ModelConflict(format!(
            "unsupported model version {}",
            doc.version
        )));
    }
    if doc.vocab_size as usize != doc.vocab.len() {
        return Err(PairweldError::ModelConflict(format!(
            "vocabSize ({}) disagrees with vocab length ({})",
            doc.vocab_size,
            doc.vocab.len()
        )));
    }
    if doc.vocab.len() < 256 || doc.vocab.len() != 256 + doc.merges.len() {
        return Err(PairweldError::ModelConflict(format!(
            "vocab length ({}) disagrees with merge count ({})",
            doc.vocab.len(),
            doc.merges.len()
        )));
    }
    for (i, entry) in doc.vocab[..256].iter().enumerate() {
        if entry.len() != 1 || entry[0] as usize != i {
            return Err(PairweldError::ModelConflict(format!(
                "base token {i} is not its single byte"
            )));
        }
    }

    let mut vocab = Vocab::default();
    for (k, &(a, b, id)) in doc.merges.iter().enumerate() {
        let assigned = vocab.add_merge(a as u32, b as u32, 0)?;
        if assigned != id {
            return Err(PairweldError::ModelConflict(format!(
                "merge {k} assigns id {id} where {assigned} was expected"
            )));
        }
        if vocab.bytes(id) != Some(doc.vocab[id as usize].as_slice()) {
            return Err(PairweldError::ModelConflict(format!(
                "vocab[{id}] is not vocab[{a}] ++ vocab[{b}]"
            )));
        }
    }

    Ok(vocab)
}

/// Write a model JSON file.
pub fn write_model<P: AsRef<Path>>(
    vocab: &Vocab,
    path: P,
) -> PWResult<()> {
    std::fs::write(path, to_json(vocab)?)?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model<P: AsRef<Path>>(path: P) -> PWResult<Vocab> {
    from_json(&std::fs::read_to_string(path)?)
}
