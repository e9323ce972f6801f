//! Kernel program sources and their compile-time constants.
//!
//! Each program is WGSL text prefixed with a block of `const` declarations
//! generated from the simulation's sizes, so the kernels see element counts and
//! work-group sizes as constants rather than runtime parameters.

use std::fmt::Write;

use crate::error::CompileError;
use crate::gpu::GpuContext;

#[derive(Copy, Clone, Debug)]
pub struct ProgramSource {
    pub name: &'static str,
    pub source: &'static str,
}

/// Collision, update and motion kernels.
pub const MOTION_PROGRAM: ProgramSource = ProgramSource {
    name: "motion",
    source: include_str!("../shaders/motion.wgsl"),
};

/// Ray-triangle intersection with per-work-group reduction.
pub const PICK_PROGRAM: ProgramSource = ProgramSource {
    name: "pick_selection",
    source: include_str!("../shaders/pick_selection.wgsl"),
};

pub const COLLISION_ENTRY: &str = "collision_detection";
pub const UPDATE_ENTRY: &str = "update";
pub const MOTION_ENTRY: &str = "motion";
pub const PICK_ENTRY: &str = "pick_selection";

#[derive(Copy, Clone, Debug, PartialEq)]
enum DefineValue {
    U32(u32),
    F32(f32),
}

/// Named constants prepended to a program before it is compiled.
#[derive(Clone, Debug, Default)]
pub struct ProgramDefines {
    values: Vec<(&'static str, DefineValue)>,
}

impl ProgramDefines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_u32(mut self, name: &'static str, value: u32) -> Self {
        self.values.push((name, DefineValue::U32(value)));
        self
    }

    pub fn define_f32(mut self, name: &'static str, value: f32) -> Self {
        self.values.push((name, DefineValue::F32(value)));
        self
    }

    pub fn prelude(&self) -> String {
        let mut prelude = String::new();
        for (name, value) in &self.values {
            // Writing into a String cannot fail.
            let _ = match value {
                DefineValue::U32(v) => writeln!(prelude, "const {name}: u32 = {v}u;"),
                DefineValue::F32(v) => writeln!(prelude, "const {name}: f32 = {v:?};"),
            };
        }
        prelude
    }
}

/// Full WGSL text for `program` with `defines` applied.
pub fn build_source(program: &ProgramSource, defines: &ProgramDefines) -> String {
    format!("{}\n{}", defines.prelude(), program.source)
}

/// Compiles `program`, turning validation failures into a `CompileError` carrying the log.
pub fn compile(
    gpu: &GpuContext,
    program: &ProgramSource,
    defines: &ProgramDefines,
) -> Result<wgpu::ShaderModule, CompileError> {
    let source = build_source(program, defines);
    let (module, error) = gpu.capture_validation(|| {
        gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    });

    match error {
        None => Ok(module),
        Some(error) => Err(CompileError {
            program: program.name,
            log: error.to_string(),
        }),
    }
}
