//! # Engine

use crate::errors::PWResult;
use crate::gpu::GpuContext;
use crate::train::{TrainerOptions, TrainingResult, run_training};

/// Owns the compute device; the entry point for training.
///
/// A lost device is terminal: drop the engine and [`Engine::init`] a new one.
pub struct Engine {
    gpu: GpuContext,
}

impl Engine {
    /// Acquire an adapter and device.
    pub fn init() -> PWResult<Self> {
        Ok(Self {
            gpu: GpuContext::init()?,
        })
    }

    /// Train a vocabulary on `corpus`.
    ///
    /// A run that stops early (pair frequencies below 2, or the token id
    /// space exhausted) still returns the partial vocabulary successfully.
    pub fn train(
        &self,
        corpus: &[u8],
        options: &TrainerOptions,
    ) -> PWResult<TrainingResult> {
        run_training(&self.gpu, corpus, options)
    }

    pub(crate) fn gpu(&self) -> &GpuContext {
        &self.gpu
    }
}
