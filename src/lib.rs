pub mod body;
pub mod camera;
pub mod config;
pub mod cpu_ref;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod mesh;
pub mod physics;
pub mod picking;
pub mod readback;
pub mod simulation;
pub mod viz;

pub use config::SimulationConfig;
pub use error::{CompileError, DeviceError, InitError};
pub use simulation::{Simulation, SimulationState, TickOutcome};
