//! Periodic readback of the selected body's properties.

use std::fmt;
use std::time::{Duration, Instant};

use crate::body::{BodyMetadata, PhysicalState};
use crate::error::DeviceError;
use crate::physics::ComputeBackend;
use crate::simulation::Simulation;

/// Display-ready properties of one body.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySnapshot {
    pub id: usize,
    pub filename: String,
    pub radius: f32,
    pub mass: f32,
    pub center: [f32; 3],
    pub velocity: [f32; 3],
    pub acceleration: [f32; 3],
}

impl PropertySnapshot {
    pub fn new(state: &PhysicalState, metadata: &BodyMetadata) -> Self {
        Self {
            id: metadata.id,
            filename: metadata.source_mesh_name.clone(),
            radius: state.radius,
            mass: metadata.mass,
            center: state.center,
            velocity: state.velocity(),
            acceleration: [state.acceleration[0], state.acceleration[1], state.acceleration[2]],
        }
    }

    /// One-line form for a title bar or status line.
    pub fn summary(&self) -> String {
        format!(
            "body {} | r {:.3} | m {:.3} | pos {} | vel {}",
            self.id,
            self.radius,
            self.mass,
            Vector(&self.center),
            Vector(&self.velocity)
        )
    }
}

struct Vector<'a>(&'a [f32; 3]);

impl fmt::Display for Vector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4})", self.0[0], self.0[1], self.0[2])
    }
}

impl fmt::Display for PropertySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id: {}", self.id)?;
        writeln!(f, "file: {}", self.filename)?;
        writeln!(f, "radius: {:.4}", self.radius)?;
        writeln!(f, "mass: {:.4}", self.mass)?;
        writeln!(f, "position: {}", Vector(&self.center))?;
        writeln!(f, "velocity: {}", Vector(&self.velocity))?;
        write!(f, "acceleration: {}", Vector(&self.acceleration))
    }
}

/// Receives snapshots for display.
pub trait PropertySink {
    fn show_properties(&mut self, snapshot: &PropertySnapshot);
}

impl<F: FnMut(&PropertySnapshot)> PropertySink for F {
    fn show_properties(&mut self, snapshot: &PropertySnapshot) {
        self(snapshot)
    }
}

/// Fires at most once per interval and forwards the selected body's snapshot.
#[derive(Clone, Debug)]
pub struct SelectionReadback {
    interval: Duration,
    last: Option<Instant>,
}

impl SelectionReadback {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Reads and forwards a snapshot if the interval has elapsed. Returns
    /// whether the sink received one.
    pub fn poll<B: ComputeBackend>(
        &mut self,
        now: Instant,
        simulation: &mut Simulation<B>,
        sink: &mut impl PropertySink,
    ) -> Result<bool, DeviceError> {
        if !self.is_due(now) {
            return Ok(false);
        }
        self.last = Some(now);
        Self::read_now(simulation, sink)
    }

    /// Reads and forwards a snapshot immediately; a no-op without a selection
    /// or once the simulation has been stopped.
    pub fn read_now<B: ComputeBackend>(
        simulation: &mut Simulation<B>,
        sink: &mut impl PropertySink,
    ) -> Result<bool, DeviceError> {
        match simulation.read_selected()? {
            Some(snapshot) => {
                sink.show_properties(&snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
