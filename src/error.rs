//! Error types for startup and per-tick device work.
//!
//! Startup failures (`InitError`) are unrecoverable for the simulation being
//! built and are handed back to the caller. Failures while the simulation is
//! running (`DeviceError`) only cost the current tick or pick request.

use thiserror::Error;

use crate::physics::interop::Owner;

/// Diagnostic produced when a kernel or shader program fails to build.
#[derive(Debug, Clone, Error)]
#[error("failed to build the {program} program:\n{log}")]
pub struct CompileError {
    pub program: &'static str,
    pub log: String,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("no compute adapter found (tried a high-performance GPU and the fallback adapter)")]
    NoAdapter,

    #[error("failed to open the device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("failed to create a presentation surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("failed to allocate or bind {resource}: {message}")]
    Allocation {
        resource: &'static str,
        message: String,
    },

    #[error("mesh '{name}' was not supplied by the mesh provider")]
    MissingMesh { name: String },

    #[error("mesh '{name}' cannot be instanced: {reason}")]
    InvalidMesh { name: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("{operation} failed validation: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },

    #[error("buffer readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("readback channel closed before the map completed")]
    ReadbackCancelled,

    #[error("{buffer} buffer is currently owned by {owner}")]
    Ownership { buffer: &'static str, owner: Owner },

    #[error("body index {index} out of range (count={count})")]
    InvalidBody { index: usize, count: usize },

    #[error("simulation resources have been released")]
    Released,
}
