mod backend;
mod compute_executor;
mod device_context;
pub mod dispatch;
pub mod interop;
pub mod shaders;

pub use backend::ComputeBackend;
pub use compute_executor::GpuBackend;
pub use device_context::{ComputeContext, ProgramParameters};

use std::sync::Arc;

use crate::{
    body::BodyStore, config::SimulationConfig, error::InitError, gpu::GpuContext, mesh::MeshLibrary,
    simulation::Simulation,
};

/// Builds a running simulation on `gpu` from `config`, instancing the configured mesh.
pub fn create_gpu_simulation(
    gpu: Arc<GpuContext>,
    config: &SimulationConfig,
    meshes: &MeshLibrary,
    bounds: [f32; 2],
) -> Result<Simulation<GpuBackend>, InitError> {
    let store = BodyStore::generate(config)?;
    let mesh = meshes.get(&config.mesh_name)?;
    let backend = GpuBackend::initialize(gpu, &store, mesh)?;
    Ok(Simulation::new(backend, store.metadata().to_vec(), bounds))
}
