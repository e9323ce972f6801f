//! Per-body physical state and display metadata.
//!
//! `PhysicalState` is 80 bytes (five `vec4<f32>`), mirrored on the device.
//! The kernels address it as `VECS_PER_OBJECT` consecutive vectors.

use bytemuck::{Pod, Zeroable};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SimulationConfig;
use crate::error::InitError;

/// Number of `vec4<f32>` slots one `PhysicalState` occupies on the device.
pub const VECS_PER_OBJECT: u32 = (std::mem::size_of::<PhysicalState>() / 16) as u32;

/// Physical state of one sphere, GPU layout.
#[repr(C, align(16))]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PhysicalState {
    pub radius: f32,
    pub center: [f32; 3],
    pub velocity_prev: [f32; 4],  // read this frame
    pub velocity_next: [f32; 4],  // written this frame
    pub acceleration: [f32; 4],
    pub displacement: [f32; 4],   // scratch: collision correction, then per-tick motion
}

const _: () = assert!(std::mem::size_of::<PhysicalState>() == 80);

impl PhysicalState {
    pub fn new(radius: f32, center: [f32; 3]) -> Self {
        Self {
            radius,
            center,
            velocity_prev: [0.0; 4],
            velocity_next: [0.0; 4],
            acceleration: [0.0; 4],
            displacement: [0.0; 4],
        }
    }

    pub fn with_velocity(mut self, velocity: [f32; 2]) -> Self {
        self.velocity_prev = [velocity[0], velocity[1], 0.0, 0.0];
        self.velocity_next = self.velocity_prev;
        self
    }

    pub fn with_acceleration(mut self, acceleration: [f32; 2]) -> Self {
        self.acceleration = [acceleration[0], acceleration[1], 0.0, 0.0];
        self
    }

    /// Velocity as shown to the property panel (the most recently written one).
    pub fn velocity(&self) -> [f32; 3] {
        [self.velocity_next[0], self.velocity_next[1], self.velocity_next[2]]
    }
}

/// Descriptive, host-only data for one body.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyMetadata {
    /// Equal to the body's storage slot.
    pub id: usize,
    pub color: [f32; 3],
    pub mass: f32,
    pub source_mesh_name: String,
}

/// Host arrays for all bodies. Fixed size after creation.
#[derive(Clone, Debug)]
pub struct BodyStore {
    states: Vec<PhysicalState>,
    metadata: Vec<BodyMetadata>,
}

impl BodyStore {
    /// Populates the store from the config's ranges, laid out on a grid.
    pub fn generate(config: &SimulationConfig) -> Result<Self, InitError> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut states = Vec::with_capacity(config.body_count);
        let mut metadata = Vec::with_capacity(config.body_count);

        for id in 0..config.body_count {
            let radius = rng.gen_range(config.min_radius..=config.max_radius);
            let center = grid_center(config, id);
            let velocity = [
                rng.gen_range(config.velocity_range.clone()),
                rng.gen_range(config.velocity_range.clone()),
            ];
            let acceleration = [
                rng.gen_range(config.acceleration_range.clone()),
                rng.gen_range(config.acceleration_range.clone()),
            ];
            let color = [
                rng.gen_range(config.color_range.clone()),
                rng.gen_range(config.color_range.clone()),
                rng.gen_range(config.color_range.clone()),
            ];

            states.push(
                PhysicalState::new(radius, center)
                    .with_velocity(velocity)
                    .with_acceleration(acceleration),
            );
            metadata.push(BodyMetadata {
                id,
                color,
                mass: config.mass_per_radius * radius,
                source_mesh_name: config.mesh_name.clone(),
            });
        }

        Ok(Self { states, metadata })
    }

    /// Builds a store from explicit states; metadata gets neutral defaults.
    pub fn from_states(states: Vec<PhysicalState>, mesh_name: &str) -> Result<Self, InitError> {
        if states.is_empty() {
            return Err(InitError::InvalidConfig("body count must be at least 1".into()));
        }
        if let Some(bad) = states.iter().position(|s| !(s.radius > 0.0)) {
            return Err(InitError::InvalidConfig(format!(
                "body {bad} has non-positive radius {}",
                states[bad].radius
            )));
        }

        let metadata = states
            .iter()
            .enumerate()
            .map(|(id, state)| BodyMetadata {
                id,
                color: [0.5, 0.5, 0.5],
                mass: SimulationConfig::default().mass_per_radius * state.radius,
                source_mesh_name: mesh_name.to_string(),
            })
            .collect();

        Ok(Self { states, metadata })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[PhysicalState] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [PhysicalState] {
        &mut self.states
    }

    pub fn metadata(&self) -> &[BodyMetadata] {
        &self.metadata
    }

    pub fn max_radius(&self) -> f32 {
        self.states.iter().map(|s| s.radius).fold(0.0, f32::max)
    }
}

/// Grid slot for body `index`, spaced by three times the maximum radius bound.
pub fn grid_center(config: &SimulationConfig, index: usize) -> [f32; 3] {
    let spacing = config.max_radius * 3.0;
    let column = (index % config.bodies_per_row) as f32 + 1.0;
    let row = (index / config.bodies_per_row) as f32 + 1.0;
    [spacing * column, spacing * row, config.initial_depth]
}
