use wgpu::{util::DeviceExt, Buffer, BufferUsages};

use crate::error::{DeviceError, InitError};

/// Which adapter to ask for first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AdapterPreference {
    /// High-performance GPU, then the fallback adapter.
    #[default]
    Gpu,
    /// Fallback (software) adapter only.
    Fallback,
}

/// Adapter, device and queue shared by the compute pipelines and the renderer.
///
/// Both subsystems must be created on this one device; that is what lets the
/// vertex and index buffers be used by the kernels without copies.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub async fn new(preference: AdapterPreference) -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        Self::from_instance(instance, None, preference).await
    }

    /// Opens a device on `instance`, optionally one able to present to `surface`.
    pub async fn from_instance(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        preference: AdapterPreference,
    ) -> Result<Self, InitError> {
        let adapter = Self::select_adapter(&instance, surface, preference)
            .await
            .ok_or(InitError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!(
            "using adapter '{}' ({:?}, {:?} backend)",
            info.name,
            info.device_type,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("DynLab Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    async fn select_adapter(
        instance: &wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
        preference: AdapterPreference,
    ) -> Option<wgpu::Adapter> {
        if preference == AdapterPreference::Gpu {
            let gpu = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: surface,
                    force_fallback_adapter: false,
                })
                .await;
            if gpu.is_some() {
                return gpu;
            }
            log::warn!("no GPU adapter found, falling back to the software adapter");
        }

        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: surface,
                force_fallback_adapter: true,
            })
            .await
    }

    pub fn create_buffer_init(&self, label: &str, data: &[u8], usage: BufferUsages) -> Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: data,
            usage,
        })
    }

    /// Runs `f` inside a validation error scope and returns the captured error, if any.
    pub fn capture_validation<T>(&self, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    /// Like [`capture_validation`](Self::capture_validation), for per-tick work.
    pub fn validated<T>(&self, operation: &'static str, f: impl FnOnce() -> T) -> Result<T, DeviceError> {
        match self.capture_validation(f) {
            (value, None) => Ok(value),
            (_, Some(error)) => Err(DeviceError::Validation {
                operation,
                message: error.to_string(),
            }),
        }
    }

    /// Copies `size` bytes of `source` at `offset` into `staging` and maps them back.
    ///
    /// Blocks until the device has finished every prior submission.
    pub fn read_buffer<T: bytemuck::Pod>(
        &self,
        source: &Buffer,
        offset: u64,
        staging: &Buffer,
        size: u64,
    ) -> Result<Vec<T>, DeviceError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(source, offset, staging, 0, size);
        self.validated("readback copy", || self.queue.submit(Some(encoder.finish())))?;

        let buffer_slice = staging.slice(..size);
        let (tx, rx) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);
        pollster::block_on(rx).map_err(|_| DeviceError::ReadbackCancelled)??;

        let data = buffer_slice.get_mapped_range();
        let values = data
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        drop(data);
        staging.unmap();

        Ok(values)
    }
}
