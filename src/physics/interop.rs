//! Buffers shared between the renderer and the kernels.
//!
//! The vertex and index buffers are created for drawing and reused by the
//! motion and pick kernels without copies. Ownership is tracked explicitly:
//! compute may only take a buffer after the graphics queue has been fenced,
//! and must hand it back once its own work has drained.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use wgpu::{BindGroup, Buffer, BufferUsages};

use super::device_context::ComputeContext;
use crate::body::PhysicalState;
use crate::error::{DeviceError, InitError};
use crate::geometry::SharedGeometry;
use crate::gpu::GpuContext;
use crate::picking::{PickPair, RayUniform};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Graphics,
    Compute,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Graphics => f.write_str("graphics"),
            Owner::Compute => f.write_str("compute"),
        }
    }
}

/// Proof that all submitted graphics work has completed.
///
/// Only [`GraphicsTimeline::fence`] hands these out, so acquiring a shared
/// buffer cannot be written before the fence.
#[derive(Debug)]
pub struct GraphicsFence {
    _private: (),
}

/// Tracks the renderer's most recent submission.
#[derive(Debug, Default)]
pub struct GraphicsTimeline {
    last_submission: Option<wgpu::SubmissionIndex>,
}

impl GraphicsTimeline {
    pub fn record(&mut self, submission: wgpu::SubmissionIndex) {
        self.last_submission = Some(submission);
    }

    /// Blocks until the last recorded graphics submission is done.
    pub fn fence(&mut self, device: &wgpu::Device) -> GraphicsFence {
        if let Some(submission) = self.last_submission.take() {
            device.poll(wgpu::Maintain::WaitForSubmissionIndex(submission));
        }
        GraphicsFence { _private: () }
    }
}

/// A resource owned by either graphics or compute at any moment.
#[derive(Debug)]
pub struct SharedBuffer<B = Buffer> {
    label: &'static str,
    resource: B,
    owner: Owner,
}

impl<B> SharedBuffer<B> {
    /// Wraps a graphics-created resource; graphics owns it initially.
    pub fn wrap(label: &'static str, resource: B) -> Self {
        Self {
            label,
            resource,
            owner: Owner::Graphics,
        }
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn acquire(&mut self, _fence: &GraphicsFence) -> Result<(), DeviceError> {
        self.transition(Owner::Graphics, Owner::Compute)
    }

    /// Hands the buffer back to graphics; callers must have drained compute work.
    pub fn release(&mut self) -> Result<(), DeviceError> {
        self.transition(Owner::Compute, Owner::Graphics)
    }

    fn transition(&mut self, from: Owner, to: Owner) -> Result<(), DeviceError> {
        if self.owner != from {
            return Err(DeviceError::Ownership {
                buffer: self.label,
                owner: self.owner,
            });
        }
        log::trace!("{} buffer: {} -> {}", self.label, from, to);
        self.owner = to;
        Ok(())
    }

    /// Releases both buffers even if the first release fails; reports the first error.
    pub fn release_pair(first: &mut Self, second: &mut Self) -> Result<(), DeviceError> {
        let first = first.release();
        let second = second.release();
        first.and(second)
    }

    pub fn view(&self, owner: Owner) -> Result<&B, DeviceError> {
        if self.owner == owner {
            Ok(&self.resource)
        } else {
            Err(DeviceError::Ownership {
                buffer: self.label,
                owner: self.owner,
            })
        }
    }
}

/// Uniform consumed by the update kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct UpdateParams {
    pub delta_time: f32,
    pub _padding: f32,
    pub bounds: [f32; 2],
}

/// Graphics-side buffers holding the instanced geometry.
pub struct GraphicsBuffers {
    pub vertices: Buffer,
    pub normals: Buffer,
    pub indices: Buffer,
    pub index_count: u32,
}

impl GraphicsBuffers {
    pub fn upload(gpu: &GpuContext, geometry: &SharedGeometry) -> Result<Self, InitError> {
        let limit = gpu.device.limits().max_storage_buffer_binding_size as u64;
        let vertex_bytes = std::mem::size_of_val(geometry.positions.as_slice()) as u64;
        if vertex_bytes > limit {
            return Err(InitError::Allocation {
                resource: "vertex buffer",
                message: format!("{vertex_bytes} bytes exceed the storage binding limit of {limit}"),
            });
        }

        let (buffers, error) = gpu.capture_validation(|| Self {
            vertices: gpu.create_buffer_init(
                "Vertex Buffer",
                bytemuck::cast_slice(&geometry.positions),
                BufferUsages::VERTEX | BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            ),
            normals: gpu.create_buffer_init(
                "Normal Buffer",
                bytemuck::cast_slice(&geometry.normals),
                BufferUsages::VERTEX,
            ),
            indices: gpu.create_buffer_init(
                "Index Buffer",
                bytemuck::cast_slice(&geometry.indices),
                BufferUsages::INDEX | BufferUsages::STORAGE,
            ),
            index_count: geometry.indices.len() as u32,
        });

        match error {
            None => Ok(buffers),
            Some(error) => Err(InitError::Allocation {
                resource: "graphics buffers",
                message: error.to_string(),
            }),
        }
    }
}

/// Borrowed buffers for one draw; only available while graphics owns them.
pub struct GraphicsView<'a> {
    pub vertices: &'a Buffer,
    pub normals: &'a Buffer,
    pub indices: &'a Buffer,
}

/// Bindings the kernels touching shared buffers need, valid while compute owns them.
pub struct ComputeBindings<'a> {
    pub state: &'a BindGroup,
    pub geometry: &'a BindGroup,
    pub pick: &'a BindGroup,
    pub vertices: &'a Buffer,
    pick_results: &'a Buffer,
    pick_staging: &'a Buffer,
}

impl ComputeBindings<'_> {
    /// Per-work-group pick results of the last pick pass.
    pub fn read_pick_results(&self, gpu: &GpuContext) -> Result<Vec<PickPair>, DeviceError> {
        gpu.read_buffer(self.pick_results, 0, self.pick_staging, self.pick_staging.size())
    }
}

/// Every device buffer of one simulation plus the bind groups over them.
pub struct InteropBuffers {
    vertices: SharedBuffer,
    indices: SharedBuffer,
    normals: Buffer,
    index_count: u32,
    states: Buffer,
    params: Buffer,
    ray: Buffer,
    pick_results: Buffer,
    pick_staging: Buffer,
    state_staging: Buffer,
    state_bind_group: BindGroup,
    geometry_bind_group: BindGroup,
    pick_bind_group: BindGroup,
    timeline: GraphicsTimeline,
    pick_groups: u32,
    body_count: usize,
}

impl InteropBuffers {
    pub fn new(
        context: &ComputeContext,
        graphics: GraphicsBuffers,
        states: &[PhysicalState],
    ) -> Result<Self, InitError> {
        let gpu = context.gpu();
        let pick_groups = context.launches().pick.workgroups().max(1);
        let pick_bytes = (pick_groups as usize * std::mem::size_of::<PickPair>()) as u64;
        let state_bytes = std::mem::size_of::<PhysicalState>() as u64;

        let (buffers, error) = gpu.capture_validation(|| {
            let states_buffer = gpu.create_buffer_init(
                "State Buffer",
                bytemuck::cast_slice(states),
                BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            );
            let params = gpu.create_buffer_init(
                "Update Params Buffer",
                bytemuck::bytes_of(&UpdateParams::zeroed()),
                BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            );
            let ray = gpu.create_buffer_init(
                "Ray Buffer",
                bytemuck::bytes_of(&RayUniform::zeroed()),
                BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            );
            let pick_results = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Pick Results Buffer"),
                size: pick_bytes,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let pick_staging = staging_buffer(gpu, "Pick Staging Buffer", pick_bytes);
            let state_staging = staging_buffer(gpu, "State Staging Buffer", state_bytes);

            let state_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("State Bind Group"),
                layout: &context.layouts.state,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: states_buffer.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: params.as_entire_binding() },
                ],
            });
            let geometry_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Geometry Bind Group"),
                layout: &context.layouts.geometry,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: graphics.vertices.as_entire_binding(),
                }],
            });
            let pick_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Pick Bind Group"),
                layout: &context.layouts.pick,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: graphics.vertices.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: graphics.indices.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: pick_results.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 3, resource: ray.as_entire_binding() },
                ],
            });

            (
                states_buffer,
                params,
                ray,
                pick_results,
                pick_staging,
                state_staging,
                state_bind_group,
                geometry_bind_group,
                pick_bind_group,
            )
        });

        if let Some(error) = error {
            return Err(InitError::Allocation {
                resource: "simulation buffers",
                message: error.to_string(),
            });
        }

        let (
            states_buffer,
            params,
            ray,
            pick_results,
            pick_staging,
            state_staging,
            state_bind_group,
            geometry_bind_group,
            pick_bind_group,
        ) = buffers;

        Ok(Self {
            vertices: SharedBuffer::wrap("vertex", graphics.vertices),
            indices: SharedBuffer::wrap("index", graphics.indices),
            normals: graphics.normals,
            index_count: graphics.index_count,
            states: states_buffer,
            params,
            ray,
            pick_results,
            pick_staging,
            state_staging,
            state_bind_group,
            geometry_bind_group,
            pick_bind_group,
            timeline: GraphicsTimeline::default(),
            pick_groups,
            body_count: states.len(),
        })
    }

    pub fn body_count(&self) -> usize {
        self.body_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn pick_groups(&self) -> u32 {
        self.pick_groups
    }

    pub fn state_bind_group(&self) -> &BindGroup {
        &self.state_bind_group
    }

    pub fn owners(&self) -> (Owner, Owner) {
        (self.vertices.owner(), self.indices.owner())
    }

    pub fn record_graphics_submission(&mut self, submission: wgpu::SubmissionIndex) {
        self.timeline.record(submission);
    }

    pub fn graphics_view(&self) -> Result<GraphicsView<'_>, DeviceError> {
        Ok(GraphicsView {
            vertices: self.vertices.view(Owner::Graphics)?,
            normals: &self.normals,
            indices: self.indices.view(Owner::Graphics)?,
        })
    }

    /// Fences graphics, hands both shared buffers to compute for `f`, drains the
    /// device and hands them back, whether or not `f` succeeded.
    pub fn with_compute_access<T>(
        &mut self,
        gpu: &GpuContext,
        f: impl FnOnce(&ComputeBindings<'_>) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let fence = self.timeline.fence(&gpu.device);
        self.vertices.acquire(&fence)?;
        if let Err(error) = self.indices.acquire(&fence) {
            self.vertices.release()?;
            return Err(error);
        }

        let result = match self.vertices.view(Owner::Compute) {
            Ok(vertices) => f(&ComputeBindings {
                state: &self.state_bind_group,
                geometry: &self.geometry_bind_group,
                pick: &self.pick_bind_group,
                vertices,
                pick_results: &self.pick_results,
                pick_staging: &self.pick_staging,
            }),
            Err(error) => Err(error),
        };

        gpu.device.poll(wgpu::Maintain::Wait);
        SharedBuffer::release_pair(&mut self.indices, &mut self.vertices)?;
        result
    }

    pub fn write_params(&self, gpu: &GpuContext, params: &UpdateParams) {
        gpu.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(params));
    }

    pub fn write_ray(&self, gpu: &GpuContext, ray: &RayUniform) {
        gpu.queue.write_buffer(&self.ray, 0, bytemuck::bytes_of(ray));
    }

    pub fn write_state(&self, gpu: &GpuContext, body: usize, state: &PhysicalState) {
        let offset = (body * std::mem::size_of::<PhysicalState>()) as u64;
        gpu.queue.write_buffer(&self.states, offset, bytemuck::bytes_of(state));
    }

    pub fn read_state(&self, gpu: &GpuContext, body: usize) -> Result<PhysicalState, DeviceError> {
        let size = std::mem::size_of::<PhysicalState>() as u64;
        let values = gpu.read_buffer::<PhysicalState>(&self.states, body as u64 * size, &self.state_staging, size)?;
        values.into_iter().next().ok_or(DeviceError::ReadbackCancelled)
    }
}

fn staging_buffer(gpu: &GpuContext, label: &str, size: u64) -> Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
