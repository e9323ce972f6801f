//! Orthographic viewport camera.
//!
//! The visible world spans `[0, width / 50] x [0, height / 50]` in x/y, so the
//! spheres keep their on-screen size when the window is resized. The same
//! extent is handed to the update kernel as the bounding walls.

use glam::{Mat4, Vec2, Vec3, Vec4};

pub const PIXELS_PER_UNIT: f32 = 50.0;
const NEAR_PLANE: f32 = 2.5;
const FAR_PLANE: f32 = 20.0;
const EYE_OFFSET: Vec3 = Vec3::new(0.0, 0.0, -5.0);

pub struct Camera {
    width: f32,
    height: f32,
    view_matrix: Mat4,
    mvp_matrix: Mat4,
    mvp_inverse: Mat4,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        let mut camera = Self {
            width: 1.0,
            height: 1.0,
            view_matrix: Mat4::from_translation(EYE_OFFSET),
            mvp_matrix: Mat4::IDENTITY,
            mvp_inverse: Mat4::IDENTITY,
        };
        camera.resize(width, height);
        camera
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1) as f32;
        self.height = height.max(1) as f32;
        self.update_matrices();
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Half of the viewport in pixels.
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// World-space size of the visible area; the update kernel's walls.
    pub fn world_bounds(&self) -> [f32; 2] {
        [self.width / PIXELS_PER_UNIT, self.height / PIXELS_PER_UNIT]
    }

    pub fn mvp_matrix(&self) -> Mat4 {
        self.mvp_matrix
    }

    pub fn mvp_inverse(&self) -> Mat4 {
        self.mvp_inverse
    }

    pub fn mvp_cols(&self) -> [[f32; 4]; 4] {
        self.mvp_matrix.to_cols_array_2d()
    }

    /// Normalized device coordinates of a surface position (y grows downward on screen).
    pub fn surface_to_ndc(&self, x: f32, y: f32) -> Vec2 {
        let half = self.half_extents();
        Vec2::new((x - half.x) / half.x, (half.y - y) / half.y)
    }

    /// Surface position of a world point; the inverse of the picking transform in x/y.
    pub fn world_to_surface(&self, point: Vec3) -> Vec2 {
        let clip = self.mvp_matrix * Vec4::new(point.x, point.y, point.z, 1.0);
        let ndc = clip.truncate() / clip.w;
        let half = self.half_extents();
        Vec2::new(ndc.x * half.x + half.x, half.y - ndc.y * half.y)
    }

    fn update_matrices(&mut self) {
        let [right, top] = self.world_bounds();
        let projection = Mat4::orthographic_rh(0.0, right, 0.0, top, NEAR_PLANE, FAR_PLANE);
        self.mvp_matrix = projection * self.view_matrix;
        self.mvp_inverse = self.mvp_matrix.inverse();
    }
}
