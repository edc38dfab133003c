//! # Tokenizer Pipeline
//!
//! Two kernels over a compiled trie: `trie_walk` (one thread per chunk,
//! greedy longest match, per-chunk token arrays) and `compact_tokens`
//! (scatter into one contiguous stream). The tiny exclusive prefix sum over
//! per-chunk counts runs on the host between the two submissions.

use wgpu::util::DeviceExt;

use crate::errors::PWResult;
use crate::gpu::context::GpuContext;
use crate::gpu::split_groups;
use crate::trie::FlatTrie;

/// Threads per workgroup; also the size of the shared root LUT.
const WG_SIZE: u32 = 256;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct TokenizeParams {
    input_len: u32,
    chunk_size: u32,
    num_chunks: u32,
    max_tokens_per_chunk: u32,
}

/// GPU resources for tokenizing against one compiled trie.
///
/// The trie arrays upload once; per-call buffers are sized to the input.
pub struct TokenizePipeline {
    walk: wgpu::ComputePipeline,
    compact: wgpu::ComputePipeline,
    walk_layout: wgpu::BindGroupLayout,
    compact_layout: wgpu::BindGroupLayout,
    nodes: wgpu::Buffer,
    edges: wgpu::Buffer,
}

fn buffer_entry(
    binding: u32,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl TokenizePipeline {
    /// Upload the trie and build both pipelines.
    pub fn new(
        ctx: &GpuContext,
        trie: &FlatTrie,
    ) -> PWResult<Self> {
        let device = &ctx.device;
        let module = ctx.create_shader("tokenize", include_str!("shaders/tokenize.wgsl"))?;

        let nodes = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("trie_nodes"),
            contents: bytemuck::cast_slice(&trie.nodes),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let edges = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("trie_edges"),
            contents: bytemuck::cast_slice(&trie.edges),
            usage: wgpu::BufferUsages::STORAGE,
        });

        // Each entry point's layout covers exactly the bindings it uses.
        let walk_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("trie-walk-bgl"),
            entries: &[
                uniform_entry(0),
                buffer_entry(1, true),
                buffer_entry(2, true),
                buffer_entry(3, true),
                buffer_entry(4, false),
                buffer_entry(5, false),
            ],
        });
        let compact_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("compact-bgl"),
            entries: &[
                uniform_entry(0),
                buffer_entry(4, false),
                buffer_entry(5, false),
                buffer_entry(6, true),
                buffer_entry(7, false),
            ],
        });

        let pipeline = |label: &str, layout: &wgpu::BindGroupLayout, entry: &str| {
            let pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pl),
                module: &module,
                entry_point: Some(entry),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };
        let walk = pipeline("trie-walk-pl", &walk_layout, "trie_walk");
        let compact = pipeline("compact-pl", &compact_layout, "compact_tokens");

        Ok(Self {
            walk,
            compact,
            walk_layout,
            compact_layout,
            nodes,
            edges,
        })
    }

    /// Tokenize `input` with `chunk_size`-byte chunks.
    ///
    /// Phase 1 walks each chunk and reads back per-chunk counts; the host
    /// prefix-sums them; phase 2 compacts into the contiguous stream.
    pub fn encode(
        &self,
        ctx: &GpuContext,
        input: &[u8],
        chunk_size: u32,
    ) -> PWResult<Vec<u32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let device = &ctx.device;

        let input_len = input.len() as u32;
        let num_chunks = input_len.div_ceil(chunk_size);
        let max_tokens = chunk_size;

        let params = TokenizeParams {
            input_len,
            chunk_size,
            num_chunks,
            max_tokens_per_chunk: max_tokens,
        };
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tokenize_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // Bytes packed little-endian into u32 words.
        let mut words = vec![0u32; input.len().div_ceil(4)];
        for (i, &b) in input.iter().enumerate() {
            words[i / 4] |= u32::from(b) << ((i % 4) * 8);
        }
        let input_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tokenize_input"),
            contents: bytemuck::cast_slice(&words),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let slot_count = u64::from(num_chunks) * u64::from(max_tokens);
        let chunk_tokens = ctx.create_buffer_checked(
            "chunk_tokens",
            slot_count * 4,
            wgpu::BufferUsages::STORAGE,
        )?;
        let chunk_counts = ctx.create_buffer_checked(
            "chunk_counts",
            u64::from(num_chunks) * 4,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        let counts_readback = ctx.create_buffer_checked(
            "chunk_counts_readback",
            u64::from(num_chunks) * 4,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;

        let walk_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("trie-walk-bg"),
            layout: &self.walk_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.nodes.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.edges.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: input_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: chunk_tokens.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: chunk_counts.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("trie-walk-enc"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("trie_walk"),
                ..Default::default()
            });
            pass.set_pipeline(&self.walk);
            pass.set_bind_group(0, &walk_bind, &[]);
            let (x, y) = split_groups(num_chunks, WG_SIZE);
            pass.dispatch_workgroups(x, y, 1);
        }
        encoder.copy_buffer_to_buffer(
            &chunk_counts,
            0,
            &counts_readback,
            0,
            u64::from(num_chunks) * 4,
        );
        ctx.queue.submit([encoder.finish()]);

        let counts: Vec<u32> = {
            let slice = counts_readback.slice(..);
            slice.map_async(wgpu::MapMode::Read, |_| {});
            ctx.wait()?;
            let data = slice.get_mapped_range();
            bytemuck::cast_slice(&data).to_vec()
        };
        counts_readback.unmap();

        // Tiny exclusive prefix sum on the host.
        let mut offsets = Vec::with_capacity(counts.len());
        let mut total = 0u32;
        for &c in &counts {
            offsets.push(total);
            total += c;
        }
        if total == 0 {
            return Ok(Vec::new());
        }

        let offsets_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("chunk_offsets"),
            contents: bytemuck::cast_slice(&offsets),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let out_tokens = ctx.create_buffer_checked(
            "out_tokens",
            u64::from(total) * 4,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        )?;
        let out_readback = ctx.create_buffer_checked(
            "out_tokens_readback",
            u64::from(total) * 4,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        )?;

        let compact_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("compact-bg"),
            layout: &self.compact_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: chunk_tokens.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: chunk_counts.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: offsets_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: out_tokens.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compact-enc"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("compact_tokens"),
                ..Default::default()
            });
            pass.set_pipeline(&self.compact);
            pass.set_bind_group(0, &compact_bind, &[]);
            let threads = slot_count.min(u64::from(u32::MAX)) as u32;
            let (x, y) = split_groups(threads, WG_SIZE);
            pass.dispatch_workgroups(x, y, 1);
        }
        encoder.copy_buffer_to_buffer(&out_tokens, 0, &out_readback, 0, u64::from(total) * 4);
        ctx.queue.submit([encoder.finish()]);

        let tokens: Vec<u32> = {
            let slice = out_readback.slice(..);
            slice.map_async(wgpu::MapMode::Read, |_| {});
            ctx.wait()?;
            let data = slice.get_mapped_range();
            bytemuck::cast_slice(&data).to_vec()
        };
        out_readback.unmap();

        Ok(tokens)
    }
}
