//! Rotation and perspective projection shared by every scene.
//!
//! Scenes describe their primitives in scene space (y grows downwards, like
//! screen space, and z grows away from the viewer). A [`Camera`] rotates a
//! point about Y, then about X, pushes the scene back by a fixed offset and
//! applies a perspective divide. Points that land on or behind the camera
//! plane project to `None` and are never drawn.

use glam::{Vec2, Vec3};

/// A position in scene space.
pub type Point3 = Vec3;

/// Perspective denominators at or below this are treated as behind the camera.
pub const MIN_DEPTH: f32 = 1e-3;

/// Pixel size of a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// True when either dimension is zero or negative; nothing useful can be drawn.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Whether a screen point lies within the viewport grown by `margin` on every side.
    pub fn contains_with_margin(&self, p: Vec2, margin: f32) -> bool {
        p.x >= -margin && p.x <= self.width + margin && p.y >= -margin && p.y <= self.height + margin
    }
}

/// A point after projection into screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Screen-space x in pixels.
    pub x: f32,
    /// Screen-space y in pixels.
    pub y: f32,
    /// Perspective factor, always strictly positive.
    pub scale: f32,
    /// Camera-space z; larger is farther away. Only used for sorting and fading.
    pub depth: f32,
}

impl ProjectedPoint {
    pub fn screen(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Linear interpolation in screen space.
    pub fn lerp_screen(&self, other: &ProjectedPoint, t: f32) -> Vec2 {
        self.screen().lerp(other.screen(), t)
    }
}

/// Rotate about the vertical axis.
pub fn rotate_y(p: Point3, angle: f32) -> Point3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(p.x * cos - p.z * sin, p.y, p.x * sin + p.z * cos)
}

/// Rotate about the horizontal axis.
pub fn rotate_x(p: Point3, angle: f32) -> Point3 {
    let (sin, cos) = angle.sin_cos();
    Vec3::new(p.x, p.y * cos - p.z * sin, p.y * sin + p.z * cos)
}

/// `focal / denominator`, or `None` when the denominator is not safely positive.
pub fn perspective_scale(focal: f32, denominator: f32) -> Option<f32> {
    if !denominator.is_finite() || denominator <= MIN_DEPTH {
        return None;
    }
    let scale = focal / denominator;
    (scale.is_finite() && scale > 0.0).then_some(scale)
}

/// Map an already-rotated point to the screen, centred on the viewport.
pub fn to_screen(viewport: Viewport, x: f32, y: f32, scale: f32) -> Vec2 {
    viewport.center() + Vec2::new(x, y) * scale
}

/// Translation-only projection: `z` is used directly as depth and `scale = focal / z`.
///
/// Used by scenes that never rotate their geometry.
pub fn project_translated(p: Point3, focal: f32, viewport: Viewport) -> Option<ProjectedPoint> {
    if p.z <= 0.0 {
        return None;
    }
    let scale = perspective_scale(focal, p.z)?;
    let screen = to_screen(viewport, p.x, p.y, scale);
    Some(ProjectedPoint {
        x: screen.x,
        y: screen.y,
        scale,
        depth: p.z,
    })
}

/// Fixed orientation plus perspective parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Tilt about X in radians.
    pub rotation_x: f32,
    /// Turn about Y in radians.
    pub rotation_y: f32,
    /// Focal length `F`.
    pub focal_length: f32,
    /// Distance `D` the whole scene is pushed away from the camera.
    pub offset: f32,
}

impl Camera {
    pub fn new(rotation_x: f32, rotation_y: f32, focal_length: f32, offset: f32) -> Self {
        Self {
            rotation_x,
            rotation_y,
            focal_length,
            offset,
        }
    }

    /// Rotate about Y, then about X.
    pub fn rotate(&self, p: Point3) -> Point3 {
        rotate_x(rotate_y(p, self.rotation_y), self.rotation_x)
    }

    /// Project a scene-space point, or `None` if it sits behind the camera plane.
    pub fn project(&self, p: Point3, viewport: Viewport) -> Option<ProjectedPoint> {
        let r = self.rotate(p);
        let scale = perspective_scale(self.focal_length, self.focal_length + r.z + self.offset)?;
        let screen = to_screen(viewport, r.x, r.y, scale);
        Some(ProjectedPoint {
            x: screen.x,
            y: screen.y,
            scale,
            depth: r.z,
        })
    }
}
