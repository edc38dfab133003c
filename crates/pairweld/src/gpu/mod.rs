//! # GPU Compute Plumbing
//!
//! Device bootstrap, the training pipeline (buffers, bind groups, batch
//! encoding), and the tokenizer pipeline. Kernel source lives in
//! `shaders/*.wgsl` and ships inside the binary.

pub mod context;
pub mod tokenize_pipeline;
pub mod train_pipeline;

pub use context::GpuContext;
pub use tokenize_pipeline::TokenizePipeline;
pub use train_pipeline::{BATCH_SIZE, IterState, TABLE_SIZE, TrainingContext};

/// Workgroup limit per dispatch dimension.
pub(crate) const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// Split a linear thread count into a `(x, y)` workgroup grid.
///
/// Counts beyond the per-dimension limit spill into `y`; kernels linearize
/// back with `(group.y * num_groups.x + group.x) * wg_size + local`.
pub(crate) fn split_groups(
    threads: u32,
    wg_size: u32,
) -> (u32, u32) {
    let groups = threads.div_ceil(wg_size).max(1);
    if groups <= MAX_GROUPS_PER_DIM {
        (groups, 1)
    } else {
        (MAX_GROUPS_PER_DIM, groups.div_ceil(MAX_GROUPS_PER_DIM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_groups() {
        assert_eq!(split_groups(0, 256), (1, 1));
        assert_eq!(split_groups(1, 256), (1, 1));
        assert_eq!(split_groups(256, 256), (1, 1));
        assert_eq!(split_groups(257, 256), (2, 1));
        assert_eq!(split_groups(65_535 * 256, 256), (65_535, 1));

        let (x, y) = split_groups(65_536 * 256, 256);
        assert_eq!((x, y), (65_535, 2));
        // The grid covers at least the requested thread count.
        assert!(u64::from(x) * u64::from(y) * 256 >= 65_536 * 256);
    }
}
