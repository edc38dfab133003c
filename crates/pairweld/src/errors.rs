//! # Error Types

/// Errors from pairweld operations.
#[derive(Debug, thiserror::Error)]
pub enum PairweldError {
    /// No usable GPU adapter was found on this host.
    #[error("no usable GPU adapter")]
    DeviceUnavailable,

    /// A compute kernel failed to compile.
    #[error("shader compilation failed for `{kernel}`: {diagnostic}")]
    ShaderCompileFailed {
        /// The kernel (entry point) that failed.
        kernel: String,

        /// The compiler diagnostic text.
        diagnostic: String,
    },

    /// The device rejected a buffer allocation.
    #[error("buffer allocation failed ({size} bytes)")]
    BufferAllocationFailed {
        /// The requested allocation size in bytes.
        size: u64,
    },

    /// The training corpus was empty.
    #[error("training corpus is empty")]
    EmptyCorpus,

    /// The target vocab size is below the minimum (257; the u8 space plus one merge).
    #[error("target vocab size ({value}) must be > 256")]
    InvalidTarget {
        /// The rejected target size.
        value: usize,
    },

    /// A trie blob failed structural validation.
    #[error("invalid trie: {reason}")]
    InvalidTrie {
        /// What failed to validate.
        reason: String,
    },

    /// The GPU device was lost mid-operation.
    ///
    /// This is terminal for the current [`Engine`](crate::Engine); it must be
    /// reinitialized.
    #[error("GPU device lost")]
    DeviceLost,

    /// No Unicode classifier is available for pre-tokenization.
    #[error("pre-tokenizer unavailable")]
    PreTokenizerUnavailable,

    /// Model data is inconsistent.
    #[error("{0}")]
    ModelConflict(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Model JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for pairweld operations.
pub type PWResult<T> = core::result::Result<T, PairweldError>;
