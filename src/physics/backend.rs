use crate::body::PhysicalState;
use crate::error::DeviceError;
use crate::picking::{PickPair, Ray};

/// One tick's worth of kernel stages plus the queries the host needs.
///
/// Stages must be called in order: `collide`, `integrate`, `transform_vertices`.
/// Implementations own all device state for one simulation; dropping the
/// backend releases it.
pub trait ComputeBackend {
    fn body_count(&self) -> usize;

    fn triangles_per_body(&self) -> u32;

    /// Resolves overlaps into displacement corrections and post-collision velocities.
    /// `bounds` are the walls `integrate` will clamp against this tick.
    fn collide(&mut self, bounds: [f32; 2]) -> Result<(), DeviceError>;

    /// Advances every body by `delta_time` inside walls at `[0, bounds.x] x [0, bounds.y]`.
    fn integrate(&mut self, delta_time: f32, bounds: [f32; 2]) -> Result<(), DeviceError>;

    /// Applies this tick's displacements to the shared vertex positions.
    fn transform_vertices(&mut self) -> Result<(), DeviceError>;

    /// Per-work-group nearest hits for `ray`.
    fn pick(&mut self, ray: &Ray) -> Result<Vec<PickPair>, DeviceError>;

    fn read_state(&mut self, body: usize) -> Result<PhysicalState, DeviceError>;

    fn write_state(&mut self, body: usize, state: &PhysicalState) -> Result<(), DeviceError>;

    /// Current vertex positions, tightly packed xyz.
    fn read_vertices(&mut self) -> Result<Vec<f32>, DeviceError>;

    fn check_body(&self, body: usize) -> Result<(), DeviceError> {
        let count = self.body_count();
        if body < count {
            Ok(())
        } else {
            Err(DeviceError::InvalidBody { index: body, count })
        }
    }
}
