//! # Device Bootstrap

use crate::errors::{PWResult, PairweldError};

/// Owns the `wgpu` device and queue.
///
/// `wgpu` handles are internally reference-counted, so pipelines clone what
/// they need out of the context.
#[derive(Clone)]
pub struct GpuContext {
    /// The compute device.
    pub device: wgpu::Device,

    /// The submission queue.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Request a high-performance adapter and device.
    ///
    /// ## Returns
    /// The context, or [`PairweldError::DeviceUnavailable`] when no adapter
    /// (or no device on it) can be acquired.
    pub fn init() -> PWResult<Self> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> PWResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| PairweldError::DeviceUnavailable)?;

        log::debug!("using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pairweld device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|_| PairweldError::DeviceUnavailable)?;

        Ok(Self { device, queue })
    }

    /// Compile a shader module, surfacing validation diagnostics as
    /// [`PairweldError::ShaderCompileFailed`].
    pub fn create_shader(
        &self,
        label: &str,
        source: &str,
    ) -> PWResult<wgpu::ShaderModule> {
        self.device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PairweldError::ShaderCompileFailed {
                kernel: label.to_string(),
                diagnostic: err.to_string(),
            });
        }
        Ok(module)
    }

    /// Create a storage-class buffer, surfacing out-of-memory as
    /// [`PairweldError::BufferAllocationFailed`].
    pub fn create_buffer_checked(
        &self,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> PWResult<wgpu::Buffer> {
        self.device
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(PairweldError::BufferAllocationFailed { size });
        }
        Ok(buffer)
    }

    /// Block until the queue is idle; a failed poll means the device is gone.
    pub fn wait(&self) -> PWResult<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|_| PairweldError::DeviceLost)?;
        Ok(())
    }
}
