//! Play/pause/stop control and the per-tick pipeline.
//!
//! Each tick runs collision, then update with the measured `delta_time`
//! (zero while paused), then motion. Stopping drops the backend and with it
//! every device resource; afterwards ticks do nothing and queries fail with
//! [`DeviceError::Released`].

use std::time::{Duration, Instant};

use crate::body::{BodyMetadata, PhysicalState};
use crate::error::DeviceError;
use crate::physics::ComputeBackend;
use crate::picking::{reduce_pick_results, Ray};
use crate::readback::PropertySnapshot;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationState {
    Playing,
    Paused,
    Stopped,
}

/// Wall-clock time between ticks.
#[derive(Copy, Clone, Debug, Default)]
pub struct TickClock {
    previous: Option<Instant>,
}

impl TickClock {
    /// Seconds since the previous call. The first call only sets the time base.
    pub fn elapsed(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .previous
            .map(|previous| now.saturating_duration_since(previous))
            .unwrap_or(Duration::ZERO);
        self.previous = Some(now);
        elapsed.as_secs_f32()
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    Advanced { delta_time: f32 },
    /// A stage failed; the tick was abandoned and the next one proceeds normally.
    Dropped(DeviceError),
    Stopped,
}

pub struct Simulation<B: ComputeBackend> {
    backend: Option<B>,
    metadata: Vec<BodyMetadata>,
    state: SimulationState,
    clock: TickClock,
    bounds: [f32; 2],
    selection: Option<usize>,
}

impl<B: ComputeBackend> Simulation<B> {
    /// A simulation starts out playing.
    pub fn new(backend: B, metadata: Vec<BodyMetadata>, bounds: [f32; 2]) -> Self {
        Self {
            backend: Some(backend),
            metadata,
            state: SimulationState::Playing,
            clock: TickClock::default(),
            bounds,
            selection: None,
        }
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn play(&mut self) {
        self.transition(SimulationState::Playing);
    }

    pub fn pause(&mut self) {
        self.transition(SimulationState::Paused);
    }

    /// Releases every device resource. Irreversible for this simulation.
    pub fn stop(&mut self) {
        if self.state == SimulationState::Stopped {
            return;
        }
        self.state = SimulationState::Stopped;
        self.selection = None;
        if self.backend.take().is_some() {
            log::info!("simulation stopped, device resources released");
        }
    }

    fn transition(&mut self, to: SimulationState) {
        if self.state == SimulationState::Stopped {
            log::warn!("ignoring {:?} request on a stopped simulation", to);
            return;
        }
        if self.state != to {
            log::debug!("simulation {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }

    pub fn bounds(&self) -> [f32; 2] {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: [f32; 2]) {
        self.bounds = bounds;
    }

    pub fn metadata(&self) -> &[BodyMetadata] {
        &self.metadata
    }

    pub fn body_count(&self) -> usize {
        self.metadata.len()
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    /// Backend, metadata and selection borrowed together, for drawing.
    pub fn split_mut(&mut self) -> Option<(&mut B, &[BodyMetadata], Option<usize>)> {
        let selection = self.selection;
        self.backend
            .as_mut()
            .map(|backend| (backend, self.metadata.as_slice(), selection))
    }

    /// Runs one tick at time `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let state = self.state;
        let bounds = self.bounds;
        let Some(backend) = self.backend.as_mut() else {
            return TickOutcome::Stopped;
        };

        if let Err(error) = backend.collide(bounds) {
            log::error!("collision stage failed, dropping tick: {error}");
            return TickOutcome::Dropped(error);
        }

        let elapsed = self.clock.elapsed(now);
        let delta_time = match state {
            SimulationState::Playing => elapsed,
            _ => 0.0,
        };

        let stages = backend
            .integrate(delta_time, bounds)
            .and_then(|()| backend.transform_vertices());
        match stages {
            Ok(()) => TickOutcome::Advanced { delta_time },
            Err(error) => {
                log::error!("tick failed, dropping it: {error}");
                TickOutcome::Dropped(error)
            }
        }
    }

    /// Casts `ray` and updates the selection to the nearest body hit, or clears it on a miss.
    pub fn pick(&mut self, ray: &Ray) -> Result<Option<usize>, DeviceError> {
        let backend = self.backend.as_mut().ok_or(DeviceError::Released)?;
        let pairs = backend.pick(ray)?;
        self.selection = reduce_pick_results(&pairs, backend.triangles_per_body());
        log::debug!("pick selected {:?}", self.selection);
        Ok(self.selection)
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn body_state(&mut self, body: usize) -> Result<PhysicalState, DeviceError> {
        self.backend
            .as_mut()
            .ok_or(DeviceError::Released)?
            .read_state(body)
    }

    pub fn write_body_state(&mut self, body: usize, state: &PhysicalState) -> Result<(), DeviceError> {
        self.backend
            .as_mut()
            .ok_or(DeviceError::Released)?
            .write_state(body, state)
    }

    /// Snapshot of the selected body, or `None` with no selection or after stop.
    pub fn read_selected(&mut self) -> Result<Option<PropertySnapshot>, DeviceError> {
        let Some(body) = self.selection else {
            return Ok(None);
        };
        let Some(backend) = self.backend.as_mut() else {
            return Ok(None);
        };

        let state = backend.read_state(body)?;
        let metadata = self
            .metadata
            .get(body)
            .ok_or(DeviceError::InvalidBody { index: body, count: self.metadata.len() })?;
        Ok(Some(PropertySnapshot::new(&state, metadata)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_elapsed_is_zero() {
        let mut clock = TickClock::default();
        let start = Instant::now();
        assert_eq!(clock.elapsed(start), 0.0);
        let dt = clock.elapsed(start + Duration::from_millis(250));
        assert!((dt - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut clock = TickClock::default();
        let start = Instant::now() + Duration::from_secs(1);
        clock.elapsed(start);
        assert_eq!(clock.elapsed(start - Duration::from_millis(10)), 0.0);
    }
}
