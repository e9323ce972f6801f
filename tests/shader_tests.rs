use dynlab::physics::shaders::{
    build_source, ProgramDefines, COLLISION_ENTRY, MOTION_ENTRY, MOTION_PROGRAM, PICK_ENTRY, PICK_PROGRAM,
    UPDATE_ENTRY,
};
use dynlab::picking::NO_HIT_DISTANCE;

const SPHERES_SHADER: &str = include_str!("../src/shaders/spheres.wgsl");

#[test]
fn test_kernel_entry_points_exist() {
    for entry in [COLLISION_ENTRY, UPDATE_ENTRY, MOTION_ENTRY] {
        assert!(
            MOTION_PROGRAM.source.contains(&format!("fn {entry}(")),
            "motion program is missing {}",
            entry
        );
    }
    assert!(PICK_PROGRAM.source.contains(&format!("fn {PICK_ENTRY}(")));
}

#[test]
fn test_kernels_guard_padded_work_items() {
    assert!(MOTION_PROGRAM.source.contains("if (i >= NUM_OBJECTS)"));
    assert!(MOTION_PROGRAM.source.contains("if (v >= NUM_VERTICES * NUM_OBJECTS)"));
    assert!(PICK_PROGRAM.source.contains("if (triangle < NUM_TRIANGLES)"));
}

#[test]
fn test_sizes_come_from_prelude() {
    for name in ["NUM_OBJECTS", "NUM_VERTICES", "VECS_PER_OBJECT"] {
        assert!(
            !MOTION_PROGRAM.source.contains(&format!("const {name}")),
            "{} must be supplied by the prelude",
            name
        );
    }

    let defines = ProgramDefines::new()
        .define_u32("NUM_TRIANGLES", 20_160)
        .define_u32("PICK_WORKGROUP_SIZE", 128)
        .define_f32("NO_HIT_DISTANCE", NO_HIT_DISTANCE);
    let source = build_source(&PICK_PROGRAM, &defines);

    assert!(source.starts_with("const NUM_TRIANGLES: u32 = 20160u;\n"));
    assert!(source.contains("const PICK_WORKGROUP_SIZE: u32 = 128u;"));
    assert!(source.contains("const NO_HIT_DISTANCE: f32 = 10000.0;"));
    assert!(source.ends_with(PICK_PROGRAM.source));
}

#[test]
fn test_pick_layout_matches_host() {
    let source = PICK_PROGRAM.source;
    assert!(source.contains("@group(0) @binding(0) var<storage, read> vertices"));
    assert!(source.contains("@group(0) @binding(1) var<storage, read> indices"));
    assert!(source.contains("@group(0) @binding(2) var<storage, read_write> results: array<PickPair>"));
    assert!(source.contains("@group(0) @binding(3) var<uniform> ray"));
    assert_eq!(std::mem::size_of::<dynlab::picking::PickPair>(), 8);
}

#[test]
fn test_draw_shader_interface() {
    assert!(SPHERES_SHADER.contains("fn vs_main("));
    assert!(SPHERES_SHADER.contains("fn fs_main("));
    assert!(SPHERES_SHADER.contains("var<uniform> mvp"));
    assert!(SPHERES_SHADER.contains("var<uniform> color"));
    assert!(SPHERES_SHADER.contains("@location(0) in_coords"));
    assert!(SPHERES_SHADER.contains("@location(1) in_normals"));
}
