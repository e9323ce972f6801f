use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::InitError;

const DEFAULT_BODY_COUNT: usize = 28;
const DEFAULT_BODIES_PER_ROW: usize = 7;
const DEFAULT_MIN_RADIUS: f32 = 0.3;
const DEFAULT_MAX_RADIUS: f32 = 0.8;
const DEFAULT_VELOCITY_RANGE: f32 = 0.5;
const DEFAULT_ACCELERATION_RANGE: f32 = 0.4;
const DEFAULT_MIN_COLOR: f32 = 0.2;
const DEFAULT_MAX_COLOR: f32 = 0.8;
const DEFAULT_MASS_PER_RADIUS: f32 = 3.1;
const DEFAULT_INITIAL_DEPTH: f32 = -3.0;
const DEFAULT_MESH_NAME: &str = "sphere.dae";
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_READBACK_INTERVAL: Duration = Duration::from_millis(150);

/// Everything needed to populate the body store and drive the timers.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub body_count: usize,
    pub bodies_per_row: usize,
    pub min_radius: f32,
    pub max_radius: f32,
    pub velocity_range: RangeInclusive<f32>,
    pub acceleration_range: RangeInclusive<f32>,
    pub color_range: RangeInclusive<f32>,
    pub mass_per_radius: f32,
    pub initial_depth: f32,
    pub mesh_name: String,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub tick_interval: Duration,
    pub readback_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            body_count: DEFAULT_BODY_COUNT,
            bodies_per_row: DEFAULT_BODIES_PER_ROW,
            min_radius: DEFAULT_MIN_RADIUS,
            max_radius: DEFAULT_MAX_RADIUS,
            velocity_range: -DEFAULT_VELOCITY_RANGE..=DEFAULT_VELOCITY_RANGE,
            acceleration_range: -DEFAULT_ACCELERATION_RANGE..=DEFAULT_ACCELERATION_RANGE,
            color_range: DEFAULT_MIN_COLOR..=DEFAULT_MAX_COLOR,
            mass_per_radius: DEFAULT_MASS_PER_RADIUS,
            initial_depth: DEFAULT_INITIAL_DEPTH,
            mesh_name: DEFAULT_MESH_NAME.to_string(),
            seed: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            readback_interval: DEFAULT_READBACK_INTERVAL,
        }
    }
}

impl SimulationConfig {
    pub fn with_body_count(mut self, body_count: usize) -> Self {
        self.body_count = body_count;
        self
    }

    pub fn with_bodies_per_row(mut self, bodies_per_row: usize) -> Self {
        self.bodies_per_row = bodies_per_row;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_radius_range(mut self, min_radius: f32, max_radius: f32) -> Self {
        self.min_radius = min_radius;
        self.max_radius = max_radius;
        self
    }

    /// Zero initial velocity and acceleration; handy for deterministic scenes.
    pub fn at_rest(mut self) -> Self {
        self.velocity_range = 0.0..=0.0;
        self.acceleration_range = 0.0..=0.0;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_readback_interval(mut self, interval: Duration) -> Self {
        self.readback_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), InitError> {
        if self.body_count == 0 {
            return Err(InitError::InvalidConfig("body count must be at least 1".into()));
        }
        if self.bodies_per_row == 0 {
            return Err(InitError::InvalidConfig("bodies per row must be at least 1".into()));
        }
        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius && self.max_radius.is_finite()) {
            return Err(InitError::InvalidConfig(format!(
                "radius range [{}, {}] must be positive and non-empty",
                self.min_radius, self.max_radius
            )));
        }
        if self.mass_per_radius <= 0.0 {
            return Err(InitError::InvalidConfig("mass per radius must be positive".into()));
        }
        check_range("velocity", &self.velocity_range)?;
        check_range("acceleration", &self.acceleration_range)?;
        check_range("color", &self.color_range)?;
        Ok(())
    }
}

fn check_range(name: &str, range: &RangeInclusive<f32>) -> Result<(), InitError> {
    let (start, end) = (*range.start(), *range.end());
    if start.is_finite() && end.is_finite() && start <= end {
        Ok(())
    } else {
        Err(InitError::InvalidConfig(format!(
            "{name} range [{start}, {end}] must be finite and non-empty"
        )))
    }
}
