use std::sync::Arc;

use wgpu::{BindGroup, ComputePipeline};

use super::backend::ComputeBackend;
use super::device_context::{ComputeContext, ProgramParameters};
use super::dispatch::KernelLaunch;
use super::interop::{GraphicsBuffers, GraphicsView, InteropBuffers, UpdateParams};
use crate::body::{BodyStore, PhysicalState};
use crate::error::{DeviceError, InitError};
use crate::geometry::SharedGeometry;
use crate::gpu::GpuContext;
use crate::mesh::Mesh;
use crate::picking::{PickPair, Ray, RayUniform};

/// Runs the kernels on a wgpu device shared with the renderer.
pub struct GpuBackend {
    context: ComputeContext,
    buffers: InteropBuffers,
    triangles_per_body: u32,
    vertex_count: u32,
}

impl GpuBackend {
    /// Instances `mesh` for every body in `store`, uploads it for drawing, then
    /// compiles the kernels and binds them to the same buffers.
    pub fn initialize(gpu: Arc<GpuContext>, store: &BodyStore, mesh: &Mesh) -> Result<Self, InitError> {
        let geometry = SharedGeometry::instance(mesh, store.states())?;
        let graphics = GraphicsBuffers::upload(&gpu, &geometry)?;
        let context = ComputeContext::initialize(gpu, ProgramParameters::from_geometry(&geometry))?;
        let buffers = InteropBuffers::new(&context, graphics, store.states())?;

        log::info!(
            "simulation ready: {} bodies, {} vertices, {} triangles",
            geometry.body_count,
            geometry.total_vertices(),
            geometry.total_triangles()
        );

        Ok(Self {
            context,
            buffers,
            triangles_per_body: geometry.triangles_per_body(),
            vertex_count: geometry.total_vertices(),
        })
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        self.context.gpu()
    }

    pub fn context(&self) -> &ComputeContext {
        &self.context
    }

    pub fn buffers(&self) -> &InteropBuffers {
        &self.buffers
    }

    pub fn graphics_view(&self) -> Result<GraphicsView<'_>, DeviceError> {
        self.buffers.graphics_view()
    }

    pub fn index_count(&self) -> u32 {
        self.buffers.index_count()
    }

    pub fn record_graphics_submission(&mut self, submission: wgpu::SubmissionIndex) {
        self.buffers.record_graphics_submission(submission);
    }

    fn submit_pass(
        gpu: &GpuContext,
        label: &'static str,
        pipeline: &ComputePipeline,
        bind_groups: &[&BindGroup],
        launch: &KernelLaunch,
    ) -> Result<wgpu::SubmissionIndex, DeviceError> {
        gpu.validated(label, || {
            let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(label),
            });

            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });

                compute_pass.set_pipeline(pipeline);
                for (index, bind_group) in bind_groups.iter().enumerate() {
                    compute_pass.set_bind_group(index as u32, bind_group, &[]);
                }
                compute_pass.dispatch_workgroups(launch.workgroups(), 1, 1);
            }

            gpu.queue.submit(Some(encoder.finish()))
        })
    }
}

impl ComputeBackend for GpuBackend {
    fn body_count(&self) -> usize {
        self.buffers.body_count()
    }

    fn triangles_per_body(&self) -> u32 {
        self.triangles_per_body
    }

    fn collide(&mut self, bounds: [f32; 2]) -> Result<(), DeviceError> {
        let gpu = self.context.gpu();
        self.buffers.write_params(
            gpu,
            &UpdateParams {
                delta_time: 0.0,
                _padding: 0.0,
                bounds,
            },
        );
        Self::submit_pass(
            gpu,
            "collision pass",
            &self.context.pipelines.collision,
            &[self.buffers.state_bind_group()],
            &self.context.launches().collision,
        )?;
        Ok(())
    }

    fn integrate(&mut self, delta_time: f32, bounds: [f32; 2]) -> Result<(), DeviceError> {
        let gpu = self.context.gpu();
        self.buffers.write_params(
            gpu,
            &UpdateParams {
                delta_time,
                _padding: 0.0,
                bounds,
            },
        );
        Self::submit_pass(
            gpu,
            "update pass",
            &self.context.pipelines.update,
            &[self.buffers.state_bind_group()],
            &self.context.launches().update,
        )?;
        Ok(())
    }

    fn transform_vertices(&mut self) -> Result<(), DeviceError> {
        let gpu = Arc::clone(self.context.gpu());
        let context = &self.context;
        let buffers = &mut self.buffers;

        buffers.with_compute_access(&gpu, |bindings| {
            Self::submit_pass(
                &gpu,
                "motion pass",
                &context.pipelines.motion,
                &[bindings.state, bindings.geometry],
                &context.launches().motion,
            )?;
            Ok(())
        })
    }

    fn pick(&mut self, ray: &Ray) -> Result<Vec<PickPair>, DeviceError> {
        let gpu = Arc::clone(self.context.gpu());
        let context = &self.context;
        let buffers = &mut self.buffers;
        buffers.write_ray(&gpu, &RayUniform::from(ray));

        buffers.with_compute_access(&gpu, |bindings| {
            Self::submit_pass(
                &gpu,
                "pick pass",
                &context.pipelines.pick,
                &[bindings.pick],
                &context.launches().pick,
            )?;
            bindings.read_pick_results(&gpu)
        })
    }

    fn read_state(&mut self, body: usize) -> Result<PhysicalState, DeviceError> {
        self.check_body(body)?;
        self.buffers.read_state(self.context.gpu(), body)
    }

    fn write_state(&mut self, body: usize, state: &PhysicalState) -> Result<(), DeviceError> {
        self.check_body(body)?;
        self.buffers.write_state(self.context.gpu(), body, state);
        Ok(())
    }

    fn read_vertices(&mut self) -> Result<Vec<f32>, DeviceError> {
        let gpu = Arc::clone(self.context.gpu());
        let size = self.vertex_count as u64 * 12;
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Vertex Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.buffers
            .with_compute_access(&gpu, |bindings| gpu.read_buffer(bindings.vertices, 0, &staging, size))
    }
}
