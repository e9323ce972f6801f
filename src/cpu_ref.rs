//! Host reference for the four kernels.
//!
//! Mirrors `shaders/motion.wgsl` and `shaders/pick_selection.wgsl` step for
//! step, including the per-work-group split of the pick results, so the
//! simulation can run and be tested without a device.

use glam::{Vec2, Vec3};

use crate::body::{BodyStore, PhysicalState};
use crate::error::{DeviceError, InitError};
use crate::geometry::SharedGeometry;
use crate::mesh::Mesh;
use crate::physics::dispatch::PREFERRED_WORKGROUP_SIZE;
use crate::physics::ComputeBackend;
use crate::picking::{PickPair, Ray, NO_HIT_DISTANCE};

pub const SEPARATION_SLOP: f32 = 1.0e-4;

fn xyz(v: [f32; 4]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// How far a body at `position` can travel by `step` per unit along one
/// axis before the wall stops it. Walls narrower than the body never stop it.
fn axis_room(position: f32, radius: f32, step: f32, bound: f32) -> f32 {
    if bound <= 2.0 * radius || step == 0.0 {
        f32::MAX
    } else if step < 0.0 {
        (position - radius).max(0.0) / -step
    } else {
        (bound - radius - position).max(0.0) / step
    }
}

fn wall_room(state: &PhysicalState, direction: Vec3, bounds: [f32; 2]) -> f32 {
    axis_room(state.center[0], state.radius, direction.x, bounds[0])
        .min(axis_room(state.center[1], state.radius, direction.y, bounds[1]))
}

/// Each body of an overlapping pair takes half the overlap, unless its
/// partner is pinned by a wall; then it takes whatever the partner cannot.
pub fn collision_detection_cpu(states: &mut [PhysicalState], bounds: [f32; 2]) {
    let snapshot: Vec<PhysicalState> = states.to_vec();

    for (i, state) in states.iter_mut().enumerate() {
        let center_i = Vec3::from(snapshot[i].center);
        let radius_i = snapshot[i].radius;
        let velocity_i = xyz(snapshot[i].velocity_prev);

        let mut correction = Vec3::ZERO;
        let mut delta_v = Vec3::ZERO;

        for (j, other) in snapshot.iter().enumerate() {
            if j == i {
                continue;
            }

            let offset = center_i - Vec3::from(other.center);
            let separation = offset.length();
            let overlap = radius_i + other.radius - separation;
            if overlap <= 0.0 {
                continue;
            }

            let normal = if separation > 0.0 {
                offset / separation
            } else if i < j {
                Vec3::NEG_X
            } else {
                Vec3::X
            };

            let partner_share = (0.5 * overlap).min(wall_room(other, -normal, bounds));
            correction += normal * (overlap - partner_share + SEPARATION_SLOP);

            let approach = (velocity_i - xyz(other.velocity_prev)).dot(normal);
            if approach < 0.0 {
                let weight = 2.0 * other.radius / (radius_i + other.radius);
                delta_v -= weight * approach * normal;
            }
        }

        state.displacement = [correction.x, correction.y, 0.0, 0.0];
        state.velocity_next = [
            velocity_i.x + delta_v.x,
            velocity_i.y + delta_v.y,
            velocity_i.z,
            0.0,
        ];
    }
}

pub fn update_cpu(states: &mut [PhysicalState], dt: f32, bounds: [f32; 2]) {
    for state in states.iter_mut() {
        if dt <= 0.0 {
            state.velocity_next = state.velocity_prev;
            state.displacement = [0.0; 4];
            continue;
        }

        let radius = state.radius;
        let old_center = state.center;
        let mut velocity = state.velocity_next;
        velocity[0] += state.acceleration[0] * dt;
        velocity[1] += state.acceleration[1] * dt;

        // Never drift back along this tick's contact correction.
        let push = Vec2::new(state.displacement[0], state.displacement[1]);
        if push != Vec2::ZERO {
            let contact = push.normalize();
            let closing = Vec2::new(velocity[0], velocity[1]).dot(contact);
            if closing < 0.0 {
                velocity[0] -= closing * contact.x;
                velocity[1] -= closing * contact.y;
            }
        }

        let mut center = old_center;
        for axis in 0..2 {
            center[axis] += state.displacement[axis] + velocity[axis] * dt;

            let wall = bounds[axis];
            if wall > 2.0 * radius {
                if center[axis] < radius {
                    center[axis] = radius;
                    velocity[axis] = velocity[axis].abs();
                } else if center[axis] > wall - radius {
                    center[axis] = wall - radius;
                    velocity[axis] = -velocity[axis].abs();
                }
            }
        }

        state.center = center;
        state.displacement = [
            center[0] - old_center[0],
            center[1] - old_center[1],
            center[2] - old_center[2],
            0.0,
        ];
        state.velocity_next = velocity;
        state.velocity_prev = velocity;
    }
}

pub fn motion_cpu(positions: &mut [f32], states: &[PhysicalState], vertices_per_body: u32) {
    for (vertex, position) in positions.chunks_exact_mut(3).enumerate() {
        let displacement = states[vertex / vertices_per_body as usize].displacement;
        position[0] += displacement[0];
        position[1] += displacement[1];
        position[2] += displacement[2];
    }
}

/// One `PickPair` per work-group of `workgroup_size` triangles.
pub fn pick_selection_cpu(positions: &[f32], indices: &[u32], ray: &Ray, workgroup_size: u32) -> Vec<PickPair> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        Vec3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let triangle_count = (indices.len() / 3) as u32;
    let groups = triangle_count.div_ceil(workgroup_size);

    (0..groups)
        .map(|group| {
            let mut best = PickPair {
                distance: NO_HIT_DISTANCE,
                triangle: group * workgroup_size,
            };
            for triangle in group * workgroup_size..((group + 1) * workgroup_size).min(triangle_count) {
                let base = triangle as usize * 3;
                let distance = ray.intersect_triangle(
                    vertex(indices[base]),
                    vertex(indices[base + 1]),
                    vertex(indices[base + 2]),
                );
                if distance < best.distance {
                    best = PickPair { distance, triangle };
                }
            }
            best
        })
        .collect()
}

/// Host implementation of [`ComputeBackend`].
#[derive(Clone, Debug)]
pub struct HostBackend {
    states: Vec<PhysicalState>,
    geometry: SharedGeometry,
    pick_workgroup_size: u32,
}

impl HostBackend {
    pub fn new(store: &BodyStore, mesh: &Mesh) -> Result<Self, InitError> {
        let geometry = SharedGeometry::instance(mesh, store.states())?;
        Ok(Self {
            states: store.states().to_vec(),
            geometry,
            pick_workgroup_size: PREFERRED_WORKGROUP_SIZE,
        })
    }

    /// Splits pick work the way a device with `size`-wide work-groups would.
    pub fn with_pick_workgroup_size(mut self, size: u32) -> Self {
        self.pick_workgroup_size = size.max(1);
        self
    }

    pub fn states(&self) -> &[PhysicalState] {
        &self.states
    }

    pub fn geometry(&self) -> &SharedGeometry {
        &self.geometry
    }
}

impl ComputeBackend for HostBackend {
    fn body_count(&self) -> usize {
        self.states.len()
    }

    fn triangles_per_body(&self) -> u32 {
        self.geometry.triangles_per_body()
    }

    fn collide(&mut self, bounds: [f32; 2]) -> Result<(), DeviceError> {
        collision_detection_cpu(&mut self.states, bounds);
        Ok(())
    }

    fn integrate(&mut self, delta_time: f32, bounds: [f32; 2]) -> Result<(), DeviceError> {
        update_cpu(&mut self.states, delta_time, bounds);
        Ok(())
    }

    fn transform_vertices(&mut self) -> Result<(), DeviceError> {
        motion_cpu(&mut self.geometry.positions, &self.states, self.geometry.vertices_per_body);
        Ok(())
    }

    fn pick(&mut self, ray: &Ray) -> Result<Vec<PickPair>, DeviceError> {
        Ok(pick_selection_cpu(
            &self.geometry.positions,
            &self.geometry.indices,
            ray,
            self.pick_workgroup_size,
        ))
    }

    fn read_state(&mut self, body: usize) -> Result<PhysicalState, DeviceError> {
        self.check_body(body)?;
        Ok(self.states[body])
    }

    fn write_state(&mut self, body: usize, state: &PhysicalState) -> Result<(), DeviceError> {
        self.check_body(body)?;
        self.states[body] = *state;
        Ok(())
    }

    fn read_vertices(&mut self) -> Result<Vec<f32>, DeviceError> {
        Ok(self.geometry.positions.clone())
    }
}
