use std::sync::Arc;

use wgpu::{BindGroupLayout, ComputePipeline};

use super::dispatch::{KernelLaunches, WorkgroupSizes};
use super::shaders::{self, ProgramDefines, ProgramSource, MOTION_PROGRAM, PICK_PROGRAM};
use crate::body::VECS_PER_OBJECT;
use crate::error::{CompileError, InitError};
use crate::geometry::SharedGeometry;
use crate::gpu::GpuContext;
use crate::picking::NO_HIT_DISTANCE;

/// Element counts baked into the kernels at compile time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgramParameters {
    pub vertices_per_body: u32,
    pub body_count: u32,
    pub triangle_count: u32,
}

impl ProgramParameters {
    pub fn from_geometry(geometry: &SharedGeometry) -> Self {
        Self {
            vertices_per_body: geometry.vertices_per_body,
            body_count: geometry.body_count,
            triangle_count: geometry.total_triangles(),
        }
    }

    pub fn total_vertices(&self) -> u32 {
        self.vertices_per_body * self.body_count
    }
}

pub(crate) struct BindingLayouts {
    /// group(0) of the motion program: states + update params.
    pub state: BindGroupLayout,
    /// group(1) of the motion program: shared vertex buffer.
    pub geometry: BindGroupLayout,
    /// group(0) of the pick program.
    pub pick: BindGroupLayout,
}

pub(crate) struct KernelPipelines {
    pub collision: ComputePipeline,
    pub update: ComputePipeline,
    pub motion: ComputePipeline,
    pub pick: ComputePipeline,
}

/// Compiled kernels and launch sizes for one simulation.
pub struct ComputeContext {
    gpu: Arc<GpuContext>,
    pub(crate) layouts: BindingLayouts,
    pub(crate) pipelines: KernelPipelines,
    launches: KernelLaunches,
    parameters: ProgramParameters,
}

impl ComputeContext {
    pub fn initialize(gpu: Arc<GpuContext>, parameters: ProgramParameters) -> Result<Self, InitError> {
        let limits = gpu.device.limits();
        let sizes = WorkgroupSizes::from_limits(&limits);
        let launches = KernelLaunches::new(
            sizes,
            parameters.body_count,
            parameters.total_vertices(),
            parameters.triangle_count,
        );

        if launches.max_workgroups() > limits.max_compute_workgroups_per_dimension {
            return Err(InitError::Allocation {
                resource: "kernel dispatch",
                message: format!(
                    "{} work-groups exceed the device limit of {}",
                    launches.max_workgroups(),
                    limits.max_compute_workgroups_per_dimension
                ),
            });
        }

        log::info!(
            "collision/update: {} bodies, local {} global {}",
            launches.collision.elements,
            launches.collision.workgroup_size,
            launches.collision.global_size
        );
        log::info!(
            "motion: {} vertices, local {} global {}",
            launches.motion.elements,
            launches.motion.workgroup_size,
            launches.motion.global_size
        );
        log::info!(
            "pick: {} triangles, local {} global {}",
            launches.pick.elements,
            launches.pick.workgroup_size,
            launches.pick.global_size
        );

        let motion_defines = ProgramDefines::new()
            .define_u32("NUM_VERTICES", parameters.vertices_per_body)
            .define_u32("NUM_OBJECTS", parameters.body_count)
            .define_u32("VECS_PER_OBJECT", VECS_PER_OBJECT)
            .define_u32("OBJECT_WORKGROUP_SIZE", sizes.object)
            .define_u32("VERTEX_WORKGROUP_SIZE", sizes.vertex);
        let pick_defines = ProgramDefines::new()
            .define_u32("NUM_TRIANGLES", parameters.triangle_count)
            .define_u32("PICK_WORKGROUP_SIZE", sizes.pick)
            .define_f32("NO_HIT_DISTANCE", NO_HIT_DISTANCE);

        let motion_module = shaders::compile(&gpu, &MOTION_PROGRAM, &motion_defines)?;
        let pick_module = shaders::compile(&gpu, &PICK_PROGRAM, &pick_defines)?;

        let layouts = Self::create_layouts(&gpu.device);
        let pipelines = Self::create_pipelines(&gpu, &layouts, &motion_module, &pick_module)?;

        Ok(Self {
            gpu,
            layouts,
            pipelines,
            launches,
            parameters,
        })
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn launches(&self) -> &KernelLaunches {
        &self.launches
    }

    pub fn parameters(&self) -> &ProgramParameters {
        &self.parameters
    }

    fn create_layouts(device: &wgpu::Device) -> BindingLayouts {
        let state = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("State Bind Group Layout"),
            entries: &[storage_entry(0, false), uniform_entry(1)],
        });
        let geometry = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geometry Bind Group Layout"),
            entries: &[storage_entry(0, false)],
        });
        let pick = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pick Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
                uniform_entry(3),
            ],
        });

        BindingLayouts { state, geometry, pick }
    }

    fn create_pipelines(
        gpu: &GpuContext,
        layouts: &BindingLayouts,
        motion_module: &wgpu::ShaderModule,
        pick_module: &wgpu::ShaderModule,
    ) -> Result<KernelPipelines, CompileError> {
        let device = &gpu.device;
        let state_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("State Pipeline Layout"),
            bind_group_layouts: &[&layouts.state],
            push_constant_ranges: &[],
        });
        let state_and_geometry = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Motion Pipeline Layout"),
            bind_group_layouts: &[&layouts.state, &layouts.geometry],
            push_constant_ranges: &[],
        });
        let pick_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pick Pipeline Layout"),
            bind_group_layouts: &[&layouts.pick],
            push_constant_ranges: &[],
        });

        Ok(KernelPipelines {
            collision: create_pipeline(gpu, &MOTION_PROGRAM, motion_module, &state_only, shaders::COLLISION_ENTRY)?,
            update: create_pipeline(gpu, &MOTION_PROGRAM, motion_module, &state_only, shaders::UPDATE_ENTRY)?,
            motion: create_pipeline(gpu, &MOTION_PROGRAM, motion_module, &state_and_geometry, shaders::MOTION_ENTRY)?,
            pick: create_pipeline(gpu, &PICK_PROGRAM, pick_module, &pick_layout, shaders::PICK_ENTRY)?,
        })
    }
}

fn create_pipeline(
    gpu: &GpuContext,
    program: &ProgramSource,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    entry_point: &'static str,
) -> Result<ComputePipeline, CompileError> {
    let (pipeline, error) = gpu.capture_validation(|| {
        gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry_point),
            layout: Some(layout),
            module,
            entry_point,
        })
    });

    match error {
        None => Ok(pipeline),
        Some(error) => Err(CompileError {
            program: program.name,
            log: format!("entry point '{entry_point}': {error}"),
        }),
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
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
