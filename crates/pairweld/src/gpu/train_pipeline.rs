//! # Training Pipeline
//!
//! Owns every GPU resource of the merge loop: the iteration-state block, the
//! pair-count hash table, the ping-pong symbol buffers, the merge log, and
//! the ten compute pipelines. Batches of merge iterations are encoded into a
//! single command list; after the first iteration of a batch, the
//! merge-sized dispatches run indirectly against tuples the scan kernel
//! wrote, so the host never needs the shrinking symbol count mid-batch.

use crate::errors::{PWResult, PairweldError};
use crate::gpu::context::GpuContext;
use crate::gpu::split_groups;
use crate::types::Merge;

/// Merges per batch; also the merge-log capacity.
pub const BATCH_SIZE: u32 = 128;

/// Hash table entries (power of two, for mask addressing).
pub const TABLE_SIZE: u32 = 1 << 21;

/// Threads per workgroup across all training kernels.
pub const WG_SIZE: u32 = 256;

// Table entries scanned per find_max_pair4 thread.
const SCAN_PER_THREAD: u32 = 4;

// Block count at which scan_blocks_par no longer fits one workgroup.
const PAR_SCAN_MAX_BLOCKS: u32 = 256;

const STATE_LEN: u64 = 48;
const MERGE_LOG_LEN: u64 = BATCH_SIZE as u64 * 12;

/// The shared iteration-state block (12 × u32 of device storage).
///
/// Initialized by the host before each batch; mutated exclusively on-device
/// during the batch; copied back once per batch.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct IterState {
    /// Live symbols in the current ping-pong input buffer.
    pub symbol_count: u32,
    /// Hash table entries.
    pub table_size: u32,
    /// Non-zero once the loop has stopped (low frequency or id exhaustion).
    pub early_stop: u32,
    /// Next token id to assign.
    pub next_token_id: u32,
    /// Left token of the selected pair.
    pub symbol_a: u32,
    /// Right token of the selected pair.
    pub symbol_b: u32,
    /// Token id assigned to the current merge.
    pub new_symbol: u32,
    /// Frequency of the selected pair.
    pub max_count: u32,
    /// Total merges completed.
    pub merges_done: u32,
    /// Capacity of the symbol buffers.
    pub max_symbols: u32,
    /// Post-compaction count staged until the next iteration promotes it.
    pub pending_symbol_count: u32,
    /// Batch-local merge-log write index; host zeroes it per batch.
    pub log_cursor: u32,
}

struct TrainPipelines {
    clear_table: wgpu::ComputePipeline,
    pair_count: wgpu::ComputePipeline,
    find_max_pair4: wgpu::ComputePipeline,
    find_max_final_det: wgpu::ComputePipeline,
    setup_merge: wgpu::ComputePipeline,
    merge_reduce: wgpu::ComputePipeline,
    scan_blocks_par: wgpu::ComputePipeline,
    scan_blocks_seq: wgpu::ComputePipeline,
    finalize_compact: wgpu::ComputePipeline,
    word_boundary: wgpu::ComputePipeline,
}

/// All GPU resources of one training run.
pub struct TrainingContext {
    pipelines: TrainPipelines,

    state: wgpu::Buffer,
    merge_log: wgpu::Buffer,
    indirect: wgpu::Buffer,
    symbols: [wgpu::Buffer; 2],
    readback: wgpu::Buffer,

    static_bind: wgpu::BindGroup,
    // [0]: A-primary (reads A, compacts into B); [1]: B-primary.
    parity_binds: [wgpu::BindGroup; 2],
}

fn storage_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl TrainingContext {
    /// Allocate buffers and build pipelines for a corpus of `max_symbols`.
    pub fn new(
        ctx: &GpuContext,
        max_symbols: u32,
    ) -> PWResult<Self> {
        let device = &ctx.device;

        let module = ctx.create_shader("train", include_str!("shaders/train.wgsl"))?;

        let symbol_bytes = u64::from(max_symbols) * 4;
        let block_count = u64::from(max_symbols.div_ceil(WG_SIZE).max(1));

        let state = ctx.create_buffer_checked(
            "iter_state",
            STATE_LEN,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        )?;
        let pair_ids = ctx.create_buffer_checked(
            "pair_ids",
            u64::from(TABLE_SIZE) * 4,
            wgpu::BufferUsages::STORAGE,
        )?;
        let pair_counts = ctx.create_buffer_checked(
            "pair_counts",
            u64::from(TABLE_SIZE) * 4,
            wgpu::BufferUsages::STORAGE,
        )?;
        let block_max = ctx.create_buffer_checked(
            "block_max",
            u64::from(TABLE_SIZE / (WG_SIZE * SCAN_PER_THREAD)) * 8,
            wgpu::BufferUsages::STORAGE,
        )?;
        let merge_log = ctx.create_buffer_checked(
            "merge_log",
            MERGE_LOG_LEN,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        let block_sums = ctx.create_buffer_checked(
            "block_sums",
            block_count * 4,
            wgpu::BufferUsages::STORAGE,
        )?;
        let indirect = ctx.create_buffer_checked(
            "indirect_dispatch",
            32,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        )?;
        let symbols_a = ctx.create_buffer_checked(
            "symbols_a",
            symbol_bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        let symbols_b = ctx.create_buffer_checked(
            "symbols_b",
            symbol_bytes,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        )?;
        let valid_mask = ctx.create_buffer_checked(
            "valid_mask",
            symbol_bytes,
            wgpu::BufferUsages::STORAGE,
        )?;
        let readback = ctx.create_buffer_checked(
            "train_readback",
            STATE_LEN + MERGE_LOG_LEN,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;

        let static_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("train-static-bgl"),
            entries: &(0..7).map(storage_layout_entry).collect::<Vec<_>>(),
        });
        let parity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("train-parity-bgl"),
            entries: &(0..3).map(storage_layout_entry).collect::<Vec<_>>(),
        });

        let static_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("train-static-bg"),
            layout: &static_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: state.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pair_ids.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: pair_counts.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: block_max.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: merge_log.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: block_sums.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: indirect.as_entire_binding(),
                },
            ],
        });

        let parity_bind = |input: &wgpu::Buffer, output: &wgpu::Buffer, label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &parity_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: input.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: output.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: valid_mask.as_entire_binding(),
                    },
                ],
            })
        };
        let parity_binds = [
            parity_bind(&symbols_a, &symbols_b, "train-parity-ab"),
            parity_bind(&symbols_b, &symbols_a, "train-parity-ba"),
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("train-pl"),
            bind_group_layouts: &[&static_layout, &parity_layout],
            push_constant_ranges: &[],
        });
        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };
        let pipelines = TrainPipelines {
            clear_table: pipeline("clear_table"),
            pair_count: pipeline("pair_count"),
            find_max_pair4: pipeline("find_max_pair4"),
            find_max_final_det: pipeline("find_max_final_det"),
            setup_merge: pipeline("setup_merge"),
            merge_reduce: pipeline("merge_reduce"),
            scan_blocks_par: pipeline("scan_blocks_par"),
            scan_blocks_seq: pipeline("scan_blocks_seq"),
            finalize_compact: pipeline("finalize_compact"),
            word_boundary: pipeline("word_boundary"),
        };

        Ok(Self {
            pipelines,
            state,
            merge_log,
            indirect,
            symbols: [symbols_a, symbols_b],
            readback,
            static_bind,
            parity_binds,
        })
    }

    /// Whether a batch starting at `symbol_count` can use the parallel scan.
    pub fn fits_parallel_scan(symbol_count: u32) -> bool {
        symbol_count.div_ceil(WG_SIZE) <= PAR_SCAN_MAX_BLOCKS
    }

    /// Upload the prepared symbol stream into ping-pong buffer A.
    pub fn upload_symbols(
        &self,
        ctx: &GpuContext,
        symbols: &[u32],
    ) {
        ctx.queue
            .write_buffer(&self.symbols[0], 0, bytemuck::cast_slice(symbols));
    }

    /// Write the iteration state for the coming batch.
    pub fn write_state(
        &self,
        ctx: &GpuContext,
        state: &IterState,
    ) {
        ctx.queue
            .write_buffer(&self.state, 0, bytemuck::bytes_of(state));
    }

    /// Prime both indirect slots with the merge-sized dispatch for
    /// `symbol_count` (the orchestrator's initial-dispatch duty).
    pub fn prime_indirect(
        &self,
        ctx: &GpuContext,
        symbol_count: u32,
    ) {
        let (x, y) = split_groups(symbol_count, WG_SIZE);
        let tuples: [u32; 8] = [x, y, 1, 0, x, y, 1, 0];
        ctx.queue
            .write_buffer(&self.indirect, 0, bytemuck::cast_slice(&tuples));
    }

    /// Tag word starts in place with the coarse byte-level fallback kernel.
    ///
    /// The iteration state (symbol count) must already be written.
    pub fn run_word_boundary(
        &self,
        ctx: &GpuContext,
        symbol_count: u32,
    ) -> PWResult<()> {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("word-boundary-enc"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("word_boundary"),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.static_bind, &[]);
            pass.set_bind_group(1, &self.parity_binds[0], &[]);
            pass.set_pipeline(&self.pipelines.word_boundary);
            let (x, y) = split_groups(symbol_count, WG_SIZE);
            pass.dispatch_workgroups(x, y, 1);
        }
        ctx.queue.submit([encoder.finish()]);
        ctx.wait()
    }

    /// Encode one batch of merge iterations plus the readback copies.
    ///
    /// ## Arguments
    /// * `iterations` - Iterations to record (at most [`BATCH_SIZE`]).
    /// * `start_iter` - Global index of the batch's first iteration; its
    ///   parity selects bind groups and indirect slots.
    /// * `start_symbol_count` - Symbol count entering the batch; sizes the
    ///   first iteration's static dispatches.
    /// * `parallel_scan` - Scan variant for the whole batch.
    pub fn encode_batch(
        &self,
        ctx: &GpuContext,
        iterations: u32,
        start_iter: u64,
        start_symbol_count: u32,
        parallel_scan: bool,
    ) -> wgpu::CommandBuffer {
        debug_assert!(iterations <= BATCH_SIZE);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("train-batch-enc"),
            });

        let (first_x, first_y) = split_groups(start_symbol_count, WG_SIZE);

        for j in 0..u64::from(iterations) {
            let parity = ((start_iter + j) & 1) as usize;
            let indirect_offset = parity as u64 * 16;
            let first = j == 0;

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("merge-iteration"),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.static_bind, &[]);
            pass.set_bind_group(1, &self.parity_binds[parity], &[]);

            let merge_sized = |pass: &mut wgpu::ComputePass<'_>| {
                if first {
                    pass.dispatch_workgroups(first_x, first_y, 1);
                } else {
                    pass.dispatch_workgroups_indirect(&self.indirect, indirect_offset);
                }
            };

            pass.set_pipeline(&self.pipelines.clear_table);
            pass.dispatch_workgroups(TABLE_SIZE / WG_SIZE, 1, 1);

            pass.set_pipeline(&self.pipelines.pair_count);
            merge_sized(&mut pass);

            pass.set_pipeline(&self.pipelines.find_max_pair4);
            pass.dispatch_workgroups(TABLE_SIZE / (WG_SIZE * SCAN_PER_THREAD), 1, 1);

            pass.set_pipeline(&self.pipelines.find_max_final_det);
            pass.dispatch_workgroups(1, 1, 1);

            pass.set_pipeline(&self.pipelines.setup_merge);
            pass.dispatch_workgroups(1, 1, 1);

            pass.set_pipeline(&self.pipelines.merge_reduce);
            merge_sized(&mut pass);

            if parallel_scan {
                pass.set_pipeline(&self.pipelines.scan_blocks_par);
            } else {
                pass.set_pipeline(&self.pipelines.scan_blocks_seq);
            }
            pass.dispatch_workgroups(1, 1, 1);

            pass.set_pipeline(&self.pipelines.finalize_compact);
            merge_sized(&mut pass);
        }

        encoder.copy_buffer_to_buffer(&self.state, 0, &self.readback, 0, STATE_LEN);
        encoder.copy_buffer_to_buffer(&self.merge_log, 0, &self.readback, STATE_LEN, MERGE_LOG_LEN);
        encoder.finish()
    }

    /// Map the readback buffer once and parse the iteration state plus the
    /// batch's merge-log entries.
    pub fn read_batch_results(
        &self,
        ctx: &GpuContext,
    ) -> PWResult<(IterState, Vec<Merge>)> {
        let slice = self.readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        ctx.wait()?;

        let (state, merges) = {
            let data = slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&data);

            let state: IterState = *bytemuck::from_bytes(&data[..STATE_LEN as usize]);
            if state.log_cursor > BATCH_SIZE {
                return Err(PairweldError::DeviceLost);
            }

            let log = &words[STATE_LEN as usize / 4..];
            let merges = (0..state.log_cursor as usize)
                .map(|k| {
                    let pair = log[k * 3];
                    Merge {
                        a: pair >> 16,
                        b: pair & 0xFFFF,
                        id: log[k * 3 + 1],
                        count: log[k * 3 + 2],
                    }
                })
                .collect();
            (state, merges)
        };
        self.readback.unmap();

        Ok((state, merges))
    }
}

/// Build an initial iteration state for a corpus of `symbol_count` symbols.
pub fn initial_state(
    symbol_count: u32,
    max_symbols: u32,
) -> IterState {
    IterState {
        symbol_count,
        table_size: TABLE_SIZE,
        early_stop: 0,
        next_token_id: 256,
        symbol_a: 0,
        symbol_b: 0,
        new_symbol: 0,
        max_count: 0,
        merges_done: 0,
        max_symbols,
        pending_symbol_count: symbol_count,
        log_cursor: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_layout() {
        let state = initial_state(10, 10);
        let bytes = bytemuck::bytes_of(&state);
        assert_eq!(bytes.len(), STATE_LEN as usize);

        let words: &[u32] = bytemuck::cast_slice(bytes);
        assert_eq!(words[0], 10); // symbol_count
        assert_eq!(words[1], TABLE_SIZE); // table_size
        assert_eq!(words[3], 256); // next_token_id
        assert_eq!(words[10], 10); // pending_symbol_count
    }

    #[test]
    fn test_scan_variant_selection() {
        assert!(TrainingContext::fits_parallel_scan(1));
        assert!(TrainingContext::fits_parallel_scan(65_536));
        assert!(!TrainingContext::fits_parallel_scan(65_537));
    }

}
