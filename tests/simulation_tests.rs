use std::cell::RefCell;
use std::time::{Duration, Instant};

use dynlab::body::{BodyStore, PhysicalState};
use dynlab::camera::Camera;
use dynlab::config::SimulationConfig;
use dynlab::cpu_ref::HostBackend;
use dynlab::error::DeviceError;
use dynlab::mesh::{Mesh, MeshLibrary, BASE_MESH_RADIUS};
use dynlab::physics::ComputeBackend;
use dynlab::picking::{PickPair, Ray};
use dynlab::readback::{PropertySnapshot, SelectionReadback};
use dynlab::{Simulation, SimulationState, TickOutcome};
use glam::Vec3;

const TICK: Duration = Duration::from_millis(16);

fn sphere() -> Mesh {
    Mesh::uv_sphere("sphere.dae", BASE_MESH_RADIUS, 8, 12)
}

fn simulation_from_states(states: Vec<PhysicalState>, bounds: [f32; 2]) -> Simulation<HostBackend> {
    let store = BodyStore::from_states(states, "sphere.dae").unwrap();
    let backend = HostBackend::new(&store, &sphere()).unwrap();
    Simulation::new(backend, store.metadata().to_vec(), bounds)
}

fn default_simulation(seed: u64) -> (Simulation<HostBackend>, BodyStore) {
    let config = SimulationConfig::default().with_seed(seed);
    let store = BodyStore::generate(&config).unwrap();
    let library = MeshLibrary::with_default_sphere(&config.mesh_name);
    let backend = HostBackend::new(&store, library.get(&config.mesh_name).unwrap()).unwrap();
    let bounds = Camera::new(1024, 768).world_bounds();
    (Simulation::new(backend, store.metadata().to_vec(), bounds), store)
}

fn all_states(simulation: &mut Simulation<HostBackend>) -> Vec<PhysicalState> {
    (0..simulation.body_count())
        .map(|i| simulation.body_state(i).unwrap())
        .collect()
}

#[test]
fn test_starts_playing() {
    let (simulation, _) = default_simulation(1);
    assert_eq!(simulation.state(), SimulationState::Playing);
    assert_eq!(simulation.selection(), None);
    assert_eq!(simulation.body_count(), 28);
}

#[test]
fn test_first_tick_does_not_move_bodies() {
    let (mut simulation, store) = default_simulation(1);
    match simulation.tick(Instant::now()) {
        TickOutcome::Advanced { delta_time } => assert_eq!(delta_time, 0.0),
        other => panic!("unexpected outcome {:?}", other),
    }
    for (i, state) in all_states(&mut simulation).iter().enumerate() {
        assert_eq!(state.center, store.states()[i].center, "body {} moved on the first tick", i);
    }
}

#[test]
fn test_playing_ticks_advance_time() {
    let (mut simulation, store) = default_simulation(4);
    let start = Instant::now();
    simulation.tick(start);
    let outcome = simulation.tick(start + TICK);
    match outcome {
        TickOutcome::Advanced { delta_time } => approx::assert_relative_eq!(delta_time, 0.016, epsilon = 1e-6),
        other => panic!("unexpected outcome {:?}", other),
    }

    let moved = all_states(&mut simulation)
        .iter()
        .zip(store.states())
        .filter(|(now, before)| now.center != before.center)
        .count();
    assert!(moved > 0, "at least one body with nonzero velocity moves");
}

#[test]
fn test_pause_freezes_state() {
    let (mut simulation, _) = default_simulation(9);
    let start = Instant::now();
    for step in 0..5 {
        simulation.tick(start + TICK * step);
    }

    simulation.pause();
    assert_eq!(simulation.state(), SimulationState::Paused);
    let before = all_states(&mut simulation);

    for step in 5..15 {
        match simulation.tick(start + TICK * step) {
            TickOutcome::Advanced { delta_time } => assert_eq!(delta_time, 0.0, "paused ticks use zero delta"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let after = all_states(&mut simulation);
    for (i, (a, b)) in before.iter().zip(&after).enumerate() {
        assert_eq!(a.center, b.center, "body {} moved while paused", i);
        assert_eq!(a.velocity_prev, b.velocity_prev, "body {} velocity changed while paused", i);
        assert_eq!(a.velocity_next, b.velocity_next);
        assert_eq!(a.acceleration, b.acceleration);
    }
}

#[test]
fn test_resume_after_pause_uses_single_interval() {
    let (mut simulation, _) = default_simulation(9);
    let start = Instant::now();
    simulation.tick(start);
    simulation.pause();
    simulation.tick(start + Duration::from_secs(5));
    simulation.play();

    match simulation.tick(start + Duration::from_secs(5) + TICK) {
        TickOutcome::Advanced { delta_time } => approx::assert_relative_eq!(delta_time, 0.016, epsilon = 1e-6),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_overlapping_bodies_separate() {
    let states = vec![
        PhysicalState::new(0.5, [5.0, 5.0, -3.0]).with_velocity([1.0, 0.0]),
        PhysicalState::new(0.5, [5.8, 5.0, -3.0]).with_velocity([-1.0, 0.0]),
    ];
    let mut simulation = simulation_from_states(states, [20.0, 20.0]);
    let backend = simulation.backend_mut().unwrap();

    backend.collide([20.0, 20.0]).unwrap();
    backend.integrate(0.016, [20.0, 20.0]).unwrap();
    backend.transform_vertices().unwrap();

    let a = backend.read_state(0).unwrap();
    let b = backend.read_state(1).unwrap();
    let separation = Vec3::from(b.center) - Vec3::from(a.center);
    assert!(separation.length() >= 1.0, "bodies still overlap at {}", separation.length());
    assert!(a.velocity_prev[0] < 0.0 && b.velocity_prev[0] > 0.0, "approaching bodies bounce apart");
}

fn separation_after_one_step(states: Vec<PhysicalState>, delta_time: f32) -> f32 {
    let mut simulation = simulation_from_states(states, [20.0, 20.0]);
    let backend = simulation.backend_mut().unwrap();
    backend.collide([20.0, 20.0]).unwrap();
    backend.integrate(delta_time, [20.0, 20.0]).unwrap();

    let a = backend.read_state(0).unwrap();
    let b = backend.read_state(1).unwrap();
    (Vec3::from(b.center) - Vec3::from(a.center)).length()
}

#[test]
fn test_contact_survives_opposing_acceleration() {
    let states = vec![
        PhysicalState::new(0.5, [5.0, 5.0, -3.0])
            .with_velocity([0.01, 0.0])
            .with_acceleration([0.4, 0.0]),
        PhysicalState::new(0.5, [5.8, 5.0, -3.0])
            .with_velocity([-0.01, 0.0])
            .with_acceleration([-0.4, 0.0]),
    ];
    let separation = separation_after_one_step(states, 0.1);
    assert!(separation >= 1.0, "bodies still overlap at {}", separation);
}

#[test]
fn test_pair_against_wall_separates() {
    let states = vec![
        PhysicalState::new(0.5, [0.5, 5.0, -3.0]).with_velocity([1.0, 0.0]),
        PhysicalState::new(0.5, [1.3, 5.0, -3.0]).with_velocity([-1.0, 0.0]),
    ];
    let separation = separation_after_one_step(states, 0.016);
    assert!(separation >= 1.0, "bodies still overlap at {}", separation);
}

#[test]
fn test_separated_bodies_do_not_interact() {
    let states = vec![
        PhysicalState::new(0.5, [5.0, 5.0, -3.0]).with_velocity([0.5, 0.0]),
        PhysicalState::new(0.5, [8.0, 5.0, -3.0]).with_velocity([-0.5, 0.0]),
    ];
    let mut simulation = simulation_from_states(states, [20.0, 20.0]);
    let backend = simulation.backend_mut().unwrap();

    backend.collide([20.0, 20.0]).unwrap();
    let a = backend.read_state(0).unwrap();
    assert_eq!(a.displacement, [0.0; 4]);
    assert_eq!(a.velocity_next, a.velocity_prev);
}

#[test]
fn test_vertices_follow_their_body() {
    let (mut simulation, store) = default_simulation(12);
    let vertices_per_body = {
        let backend = simulation.backend().unwrap();
        backend.geometry().vertices_per_body as usize
    };
    let before_vertices = simulation.backend_mut().unwrap().read_vertices().unwrap();

    let start = Instant::now();
    simulation.tick(start);
    simulation.tick(start + TICK);
    simulation.tick(start + TICK * 2);

    let after_vertices = simulation.backend_mut().unwrap().read_vertices().unwrap();
    let states = all_states(&mut simulation);

    for (body, state) in states.iter().enumerate() {
        let center_delta = Vec3::from(state.center) - Vec3::from(store.states()[body].center);
        for vertex in [0, vertices_per_body / 2, vertices_per_body - 1] {
            let i = (body * vertices_per_body + vertex) * 3;
            let delta = Vec3::new(
                after_vertices[i] - before_vertices[i],
                after_vertices[i + 1] - before_vertices[i + 1],
                after_vertices[i + 2] - before_vertices[i + 2],
            );
            approx::assert_abs_diff_eq!(delta.x, center_delta.x, epsilon = 1e-4);
            approx::assert_abs_diff_eq!(delta.y, center_delta.y, epsilon = 1e-4);
            approx::assert_abs_diff_eq!(delta.z, center_delta.z, epsilon = 1e-4);
        }
    }
}

#[test]
fn test_motion_stays_planar_and_inside_walls() {
    let (mut simulation, store) = default_simulation(30);
    let bounds = simulation.bounds();
    let start = Instant::now();
    for step in 0..600 {
        simulation.tick(start + TICK * step);
    }

    for (i, state) in all_states(&mut simulation).iter().enumerate() {
        assert_eq!(state.center[2], store.states()[i].center[2], "body {} left its plane", i);
        assert!(state.center[0] >= state.radius - 1e-4 && state.center[0] <= bounds[0] - state.radius + 1e-4);
        assert!(state.center[1] >= state.radius - 1e-4 && state.center[1] <= bounds[1] - state.radius + 1e-4);
    }
}

#[test]
fn test_wall_reflects_velocity() {
    let states = vec![PhysicalState::new(0.5, [19.4, 5.0, -3.0]).with_velocity([3.0, 0.0])];
    let mut simulation = simulation_from_states(states, [20.0, 20.0]);
    let start = Instant::now();
    simulation.tick(start);
    simulation.tick(start + Duration::from_millis(100));

    let state = simulation.body_state(0).unwrap();
    assert_eq!(state.center[0], 19.5);
    assert!(state.velocity_prev[0] < 0.0, "velocity points back into the box");
}

#[test]
fn test_write_then_read_state() {
    let (mut simulation, _) = default_simulation(2);
    let state = PhysicalState::new(0.42, [3.0, 4.0, -3.0])
        .with_velocity([0.1, 0.2])
        .with_acceleration([0.0, -0.3]);
    simulation.write_body_state(5, &state).unwrap();
    assert_eq!(simulation.body_state(5).unwrap(), state);
}

#[test]
fn test_out_of_range_body_is_an_error() {
    let (mut simulation, _) = default_simulation(2);
    assert!(matches!(
        simulation.body_state(28),
        Err(DeviceError::InvalidBody { index: 28, count: 28 })
    ));
}

#[test]
fn test_read_selected_follows_pick() {
    let (mut simulation, store) = default_simulation(6);
    assert_eq!(simulation.read_selected().unwrap(), None, "nothing selected yet");

    let camera = Camera::new(1024, 768);
    let surface = camera.world_to_surface(Vec3::from(store.states()[10].center));
    simulation
        .pick(&Ray::from_surface(&camera, surface.x + 3.0, surface.y + 2.0))
        .unwrap();

    let snapshot = simulation.read_selected().unwrap().unwrap();
    assert_eq!(snapshot.id, 10);
    assert_eq!(snapshot.filename, "sphere.dae");
    assert_eq!(snapshot.radius, store.states()[10].radius);
    assert_eq!(snapshot.mass, store.metadata()[10].mass);
}

#[test]
fn test_readback_polls_at_interval() {
    let (mut simulation, store) = default_simulation(6);
    let camera = Camera::new(1024, 768);
    let mut readback = SelectionReadback::new(Duration::from_millis(150));
    let received: RefCell<Vec<PropertySnapshot>> = RefCell::new(Vec::new());
    let mut sink = |snapshot: &PropertySnapshot| received.borrow_mut().push(snapshot.clone());

    let start = Instant::now();
    assert!(!readback.poll(start, &mut simulation, &mut sink).unwrap(), "no selection, nothing sent");

    let surface = camera.world_to_surface(Vec3::from(store.states()[0].center));
    simulation
        .pick(&Ray::from_surface(&camera, surface.x + 3.0, surface.y + 2.0))
        .unwrap();

    assert!(!readback.poll(start + Duration::from_millis(50), &mut simulation, &mut sink).unwrap());
    assert!(readback.poll(start + Duration::from_millis(150), &mut simulation, &mut sink).unwrap());
    assert!(!readback.poll(start + Duration::from_millis(200), &mut simulation, &mut sink).unwrap());

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, 0);
}

fn assert_snapshot_matches(snapshot: &PropertySnapshot, state: &PhysicalState) {
    let bits = |v: [f32; 3]| v.map(f32::to_bits);
    let acceleration = [state.acceleration[0], state.acceleration[1], state.acceleration[2]];
    assert_eq!(bits(snapshot.center), bits(state.center));
    assert_eq!(bits(snapshot.velocity), bits(state.velocity()));
    assert_eq!(bits(snapshot.acceleration), bits(acceleration));
}

#[test]
fn test_readback_reports_integrated_state() {
    let (mut simulation, store) = default_simulation(8);
    let camera = Camera::new(1024, 768);
    let surface = camera.world_to_surface(Vec3::from(store.states()[4].center));
    simulation
        .pick(&Ray::from_surface(&camera, surface.x + 3.0, surface.y + 2.0))
        .unwrap();
    assert_eq!(simulation.selection(), Some(4));

    let start = Instant::now();
    for tick in 0..5 {
        simulation.tick(start + TICK * tick);
    }
    let state = simulation.body_state(4).unwrap();
    assert_ne!(state.center, store.states()[4].center, "selected body moved");

    let snapshot = simulation.read_selected().unwrap().unwrap();
    assert_snapshot_matches(&snapshot, &state);

    let mut readback = SelectionReadback::new(Duration::from_millis(150));
    let received: RefCell<Vec<PropertySnapshot>> = RefCell::new(Vec::new());
    let mut sink = |snapshot: &PropertySnapshot| received.borrow_mut().push(snapshot.clone());
    assert!(readback.poll(start + TICK * 5, &mut simulation, &mut sink).unwrap());
    assert_snapshot_matches(&received.borrow()[0], &state);
}

#[test]
fn test_stop_releases_everything() {
    let (mut simulation, _) = default_simulation(3);
    let camera = Camera::new(1024, 768);
    simulation.stop();

    assert_eq!(simulation.state(), SimulationState::Stopped);
    assert!(simulation.backend().is_none(), "backend dropped on stop");
    assert!(matches!(simulation.tick(Instant::now()), TickOutcome::Stopped));
    assert!(matches!(
        simulation.pick(&Ray::from_surface(&camera, 100.0, 100.0)),
        Err(DeviceError::Released)
    ));
    assert!(matches!(simulation.body_state(0), Err(DeviceError::Released)));
    assert_eq!(simulation.read_selected().unwrap(), None);

    simulation.play();
    assert_eq!(simulation.state(), SimulationState::Stopped, "play after stop is ignored");
    simulation.pause();
    assert_eq!(simulation.state(), SimulationState::Stopped);
    simulation.stop();
}

/// Fails its collision stage on demand, otherwise delegates.
struct FlakyBackend {
    inner: HostBackend,
    fail_collide: bool,
}

impl ComputeBackend for FlakyBackend {
    fn body_count(&self) -> usize {
        self.inner.body_count()
    }

    fn triangles_per_body(&self) -> u32 {
        self.inner.triangles_per_body()
    }

    fn collide(&mut self, bounds: [f32; 2]) -> Result<(), DeviceError> {
        if std::mem::take(&mut self.fail_collide) {
            return Err(DeviceError::Validation {
                operation: "collision",
                message: "injected".into(),
            });
        }
        self.inner.collide(bounds)
    }

    fn integrate(&mut self, delta_time: f32, bounds: [f32; 2]) -> Result<(), DeviceError> {
        self.inner.integrate(delta_time, bounds)
    }

    fn transform_vertices(&mut self) -> Result<(), DeviceError> {
        self.inner.transform_vertices()
    }

    fn pick(&mut self, ray: &Ray) -> Result<Vec<PickPair>, DeviceError> {
        self.inner.pick(ray)
    }

    fn read_state(&mut self, body: usize) -> Result<PhysicalState, DeviceError> {
        self.inner.read_state(body)
    }

    fn write_state(&mut self, body: usize, state: &PhysicalState) -> Result<(), DeviceError> {
        self.inner.write_state(body, state)
    }

    fn read_vertices(&mut self) -> Result<Vec<f32>, DeviceError> {
        self.inner.read_vertices()
    }
}

#[test]
fn test_failed_stage_drops_only_that_tick() {
    let store = BodyStore::from_states(
        vec![PhysicalState::new(0.5, [5.0, 5.0, -3.0]).with_velocity([1.0, 0.0])],
        "sphere.dae",
    )
    .unwrap();
    let inner = HostBackend::new(&store, &sphere()).unwrap();
    let backend = FlakyBackend { inner, fail_collide: false };
    let mut simulation = Simulation::new(backend, store.metadata().to_vec(), [20.0, 20.0]);

    let start = Instant::now();
    assert!(matches!(simulation.tick(start), TickOutcome::Advanced { .. }));

    simulation.backend_mut().unwrap().fail_collide = true;
    assert!(matches!(
        simulation.tick(start + TICK),
        TickOutcome::Dropped(DeviceError::Validation { .. })
    ));
    assert_eq!(simulation.body_state(0).unwrap().center, [5.0, 5.0, -3.0], "dropped tick moved nothing");

    match simulation.tick(start + TICK * 2) {
        TickOutcome::Advanced { delta_time } => approx::assert_relative_eq!(delta_time, 0.032, epsilon = 1e-6),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(simulation.body_state(0).unwrap().center[0] > 5.0);
    assert_eq!(simulation.state(), SimulationState::Playing);
}
