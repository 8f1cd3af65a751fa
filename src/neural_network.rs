//! Floating-cuboid network with travelling signal pulses.
//!
//! There is no depth buffer, so occlusion relies on two levels of painter's
//! ordering: cuboids are drawn farthest first, and within each cuboid its six
//! faces are drawn farthest first.

use anyhow::{ensure, Result};
use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::projection::{Camera, Point3, ProjectedPoint, Viewport};
use crate::scene::Scene;
use crate::surface::{DrawSurface, Rgba, Stroke};

const COLOR_LINE: Rgba = Rgba::new(180, 180, 180, 0.35);
const COLOR_ACCENT: Rgba = Rgba::new(255, 255, 255, 0.95);
const COLOR_FILL: Rgba = Rgba::new(0, 0, 0, 0.95);
const COLOR_TEXTURE: Rgba = Rgba::new(255, 255, 255, 0.25);

/// Vertex indices of each quad face (front, right, back, left, top, bottom).
pub const CUBOID_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [1, 5, 6, 2],
    [5, 4, 7, 6],
    [4, 0, 3, 7],
    [3, 2, 6, 7],
    [4, 5, 1, 0],
];

pub type CuboidId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    pub id: CuboidId,
    pub center: Point3,
    /// Half the edge length.
    pub size: f32,
    /// Offset into the floating motion so cuboids bob independently.
    pub phase: f32,
}

impl Cuboid {
    pub fn new(id: CuboidId, x: f32, y: f32, z: f32, size: f32, phase: f32) -> Self {
        Self {
            id,
            center: Vec3::new(x, y, z),
            size,
            phase,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: CuboidId,
    pub to: CuboidId,
}

/// A pulse travelling along an edge. Alive while `progress < 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub from: CuboidId,
    pub to: CuboidId,
    pub progress: f32,
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub perspective: f32,
    pub camera_offset: f32,
    pub rotation_x: f32,
    pub rotation_y: f32,
    /// Clock increment per tick.
    pub step: f32,
    pub float_amplitude: f32,
    /// Probability per tick of launching a new signal.
    pub spawn_chance: f64,
    pub signal_speed: f32,
    /// Random surface lines per cuboid.
    pub texture_lines: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            perspective: 800.0,
            camera_offset: 400.0,
            rotation_x: 0.4,
            rotation_y: -0.5,
            step: 0.015,
            float_amplitude: 10.0,
            spawn_chance: 0.05,
            signal_speed: 0.02,
            texture_lines: 4,
        }
    }
}

/// The six cuboids of the hero scene.
pub fn reference_cuboids() -> Vec<Cuboid> {
    vec![
        Cuboid::new(0, 0.0, 0.0, 0.0, 45.0, 0.0),
        Cuboid::new(1, 280.0, 0.0, 60.0, 35.0, 2.0),
        Cuboid::new(2, -300.0, 100.0, 80.0, 40.0, 1.0),
        Cuboid::new(3, 180.0, -90.0, -40.0, 30.0, 4.0),
        Cuboid::new(4, -220.0, -70.0, -30.0, 35.0, 3.0),
        Cuboid::new(5, 160.0, 80.0, -10.0, 25.0, 5.0),
    ]
}

pub fn reference_edges() -> Vec<Edge> {
    [(0, 1), (0, 2), (0, 3), (0, 4), (1, 5), (2, 4), (1, 3)]
        .into_iter()
        .map(|(from, to)| Edge { from, to })
        .collect()
}

/// Vertical bobbing offset: `sin(clock + phase) · amplitude`.
pub fn floating_offset(clock: f32, phase: f32, amplitude: f32) -> f32 {
    (clock + phase).sin() * amplitude
}

/// Corners at `±size` on each local axis; 0..4 on the near (`-z`) side, 4..8 on the far side.
pub fn cuboid_vertices(center: Point3, size: f32) -> [Point3; 8] {
    let s = size;
    [
        Vec3::new(-s, -s, -s),
        Vec3::new(s, -s, -s),
        Vec3::new(s, s, -s),
        Vec3::new(-s, s, -s),
        Vec3::new(-s, -s, s),
        Vec3::new(s, -s, s),
        Vec3::new(s, s, s),
        Vec3::new(-s, s, s),
    ]
    .map(|v| center + v)
}

/// Face indices into [`CUBOID_FACES`], farthest average depth first.
pub fn face_order(verts: &[ProjectedPoint; 8]) -> [usize; 6] {
    let depth = |face: usize| CUBOID_FACES[face].iter().map(|&v| verts[v].depth).sum::<f32>() / 4.0;
    let mut order = [0, 1, 2, 3, 4, 5];
    order.sort_by(|&a, &b| depth(b).total_cmp(&depth(a)));
    order
}

/// Projected geometry for one cuboid in one tick.
#[derive(Debug, Clone)]
pub struct CuboidPass {
    pub id: CuboidId,
    pub verts: [ProjectedPoint; 8],
    pub faces: [usize; 6],
}

pub struct NeuralNetwork {
    config: NetworkConfig,
    camera: Camera,
    cuboids: Vec<Cuboid>,
    edges: Vec<Edge>,
    signals: Vec<Signal>,
    textures: Vec<Vec<(usize, usize)>>,
    clock: f32,
    rng: SmallRng,
}

impl NeuralNetwork {
    /// The reference layout with texture lines and signals drawn from `seed`.
    pub fn new(seed: u64) -> Self {
        Self::build(NetworkConfig::default(), reference_cuboids(), reference_edges(), seed)
    }

    pub fn with_config(config: NetworkConfig, seed: u64) -> Self {
        Self::build(config, reference_cuboids(), reference_edges(), seed)
    }

    /// Custom layout. Cuboid ids must equal their index and every edge must
    /// connect two existing, distinct cuboids.
    pub fn with_layout(config: NetworkConfig, cuboids: Vec<Cuboid>, edges: Vec<Edge>, seed: u64) -> Result<Self> {
        for (i, cuboid) in cuboids.iter().enumerate() {
            ensure!(cuboid.id == i, "cuboid at index {} has id {}", i, cuboid.id);
        }
        for edge in &edges {
            ensure!(
                edge.from < cuboids.len() && edge.to < cuboids.len(),
                "edge {}->{} references a missing cuboid",
                edge.from,
                edge.to
            );
            ensure!(edge.from != edge.to, "edge {}->{} is a self loop", edge.from, edge.to);
        }
        Ok(Self::build(config, cuboids, edges, seed))
    }

    fn build(config: NetworkConfig, cuboids: Vec<Cuboid>, edges: Vec<Edge>, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let textures = cuboids
            .iter()
            .map(|_| {
                (0..config.texture_lines)
                    .map(|_| (rng.gen_range(0..8), rng.gen_range(0..8)))
                    .collect()
            })
            .collect();
        let camera = Camera::new(config.rotation_x, config.rotation_y, config.perspective, config.camera_offset);
        Self {
            config,
            camera,
            cuboids,
            edges,
            signals: Vec::new(),
            textures,
            clock: 0.0,
            rng,
        }
    }

    pub fn cuboids(&self) -> &[Cuboid] {
        &self.cuboids
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Vertex index pairs of a cuboid's surface lines. `None` for an unknown id.
    pub fn texture_lines(&self, id: CuboidId) -> Option<&[(usize, usize)]> {
        self.textures.get(id).map(Vec::as_slice)
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Centre of a cuboid including its current floating offset. `None` for an unknown id.
    pub fn animated_center(&self, id: CuboidId) -> Option<Point3> {
        self.cuboids.get(id).map(|c| self.floated(c))
    }

    fn floated(&self, cuboid: &Cuboid) -> Point3 {
        cuboid.center + Vec3::Y * floating_offset(self.clock, cuboid.phase, self.config.float_amplitude)
    }

    fn project_centers(&self, viewport: Viewport) -> Vec<Option<ProjectedPoint>> {
        self.cuboids
            .iter()
            .map(|c| self.camera.project(self.floated(c), viewport))
            .collect()
    }

    /// Cuboid ids ordered farthest first by projected centre depth. Cuboids behind the camera are left out.
    pub fn draw_order(&self, viewport: Viewport) -> Vec<CuboidId> {
        let mut order: Vec<(CuboidId, f32)> = self
            .project_centers(viewport)
            .into_iter()
            .enumerate()
            .filter_map(|(id, p)| p.map(|p| (id, p.depth)))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1));
        order.into_iter().map(|(id, _)| id).collect()
    }

    /// Project one cuboid's corners and order its faces. `None` if any corner is
    /// behind the camera or the id is unknown.
    pub fn cuboid_pass(&self, id: CuboidId, viewport: Viewport) -> Option<CuboidPass> {
        let cuboid = self.cuboids.get(id)?;
        let corners = cuboid_vertices(self.floated(cuboid), cuboid.size);
        let mut verts = [ProjectedPoint {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            depth: 0.0,
        }; 8];
        for (slot, corner) in verts.iter_mut().zip(corners) {
            *slot = self.camera.project(corner, viewport)?;
        }
        Some(CuboidPass {
            id,
            faces: face_order(&verts),
            verts,
        })
    }

    /// Launch a signal along a random edge in a random direction, progress 0.
    pub fn spawn_signal(&mut self) -> Option<Signal> {
        if self.edges.is_empty() {
            return None;
        }
        let edge = self.edges[self.rng.gen_range(0..self.edges.len())];
        let (from, to) = if self.rng.gen_bool(0.5) {
            (edge.from, edge.to)
        } else {
            (edge.to, edge.from)
        };
        let signal = Signal {
            from,
            to,
            progress: 0.0,
            speed: self.config.signal_speed,
        };
        self.signals.push(signal);
        Some(signal)
    }

    /// Move every signal forward, dropping those that reach the end.
    fn advance_signals(&mut self) {
        for i in (0..self.signals.len()).rev() {
            let signal = &mut self.signals[i];
            signal.progress += signal.speed;
            if signal.progress >= 1.0 {
                self.signals.remove(i);
            }
        }
    }

    /// Advance the clock and the signal population by one tick without drawing.
    pub fn update(&mut self) {
        self.clock += self.config.step;
        if self.rng.gen_bool(self.config.spawn_chance.clamp(0.0, 1.0)) {
            self.spawn_signal();
        }
        self.advance_signals();
    }

    /// Draw the current state: edges, signals, then cuboids back to front.
    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        let viewport = surface.viewport();
        if viewport.is_degenerate() {
            return;
        }
        let centers = self.project_centers(viewport);

        let edge_stroke = Stroke::new(COLOR_LINE, 1.0);
        for edge in &self.edges {
            if let (Some(a), Some(b)) = (centers[edge.from], centers[edge.to]) {
                surface.stroke_line(a.screen(), b.screen(), edge_stroke);
            }
        }

        for signal in &self.signals {
            if let (Some(a), Some(b)) = (centers[signal.from], centers[signal.to]) {
                surface.fill_circle(a.lerp_screen(&b, signal.progress), 2.0, Rgba::WHITE, 10.0);
            }
        }

        let outline = Stroke::new(COLOR_ACCENT, 1.5);
        let texture = Stroke::new(COLOR_TEXTURE, 0.5);
        for id in self.draw_order(viewport) {
            let Some(pass) = self.cuboid_pass(id, viewport) else {
                continue;
            };
            for &face in &pass.faces {
                let quad = CUBOID_FACES[face].map(|v| pass.verts[v].screen());
                surface.fill_stroke_polygon(&quad, COLOR_FILL, outline);
            }

            let lines: Vec<(Vec2, Vec2)> = self
                .texture_lines(id)
                .unwrap_or_default()
                .iter()
                .map(|&(s, e)| (pass.verts[s].screen(), pass.verts[e].screen()))
                .collect();
            surface.stroke_segments(&lines, texture);

            for v in &pass.verts {
                surface.fill_rect(v.x - 1.5, v.y - 1.5, 3.0, 3.0, Rgba::WHITE);
            }
        }
    }
}

impl Scene for NeuralNetwork {
    fn name(&self) -> &'static str {
        "neural_network"
    }

    fn tick(&mut self, surface: &mut dyn DrawSurface) {
        surface.clear();
        self.update();
        self.draw(surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawCommand, RecordingSurface};

    fn quiet() -> NetworkConfig {
        NetworkConfig {
            spawn_chance: 0.0,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_reference_edges_are_valid() {
        let cuboids = reference_cuboids();
        for edge in reference_edges() {
            assert!(edge.from < cuboids.len() && edge.to < cuboids.len());
        }
        assert!(NeuralNetwork::with_layout(NetworkConfig::default(), cuboids, reference_edges(), 1).is_ok());
    }

    #[test]
    fn test_layout_rejects_dangling_edge() {
        let edges = vec![Edge { from: 0, to: 9 }];
        assert!(NeuralNetwork::with_layout(NetworkConfig::default(), reference_cuboids(), edges, 1).is_err());

        let mut cuboids = reference_cuboids();
        cuboids[2].id = 7;
        assert!(NeuralNetwork::with_layout(NetworkConfig::default(), cuboids, vec![], 1).is_err());
    }

    #[test]
    fn test_floating_offset() {
        assert_eq!(floating_offset(0.0, 0.0, 10.0), 0.0);

        let mut net = NeuralNetwork::with_config(quiet(), 3);
        assert_eq!(net.animated_center(0), Some(net.cuboids()[0].center));
        // 105 steps of 0.015 land at 1.575, just past π/2.
        for _ in 0..105 {
            net.update();
        }
        let offset = net.animated_center(0).unwrap().y - net.cuboids()[0].center.y;
        assert!(offset > 9.99 && offset <= 10.0, "offset {offset}");
    }

    #[test]
    fn test_signal_lifecycle() {
        let mut net = NeuralNetwork::with_config(quiet(), 11);
        let spawned = net.spawn_signal().unwrap();
        assert_eq!(spawned.progress, 0.0);
        let edge_ok = net
            .edges()
            .iter()
            .any(|e| (e.from, e.to) == (spawned.from, spawned.to) || (e.to, e.from) == (spawned.from, spawned.to));
        assert!(edge_ok);

        let mut last = spawned.progress;
        let mut ticks = 0;
        loop {
            net.update();
            ticks += 1;
            match net.signals().first() {
                Some(s) => {
                    assert!(s.progress > last);
                    assert!(s.progress < 1.0);
                    last = s.progress;
                }
                None => {
                    assert!(last + spawned.speed >= 1.0);
                    break;
                }
            }
            assert!(ticks < 100);
        }
        assert!((49..=51).contains(&ticks));
    }

    #[test]
    fn test_removal_keeps_other_signals() {
        let mut net = NeuralNetwork::with_config(quiet(), 5);
        net.spawn_signal();
        for _ in 0..25 {
            net.update();
        }
        net.spawn_signal();
        net.spawn_signal();
        for _ in 0..30 {
            net.update();
        }
        // The first signal is gone, the two younger ones survive.
        assert_eq!(net.signals().len(), 2);
        assert!(net.signals().iter().all(|s| s.progress < 1.0));
    }

    #[test]
    fn test_faces_drawn_far_to_near() {
        let net = NeuralNetwork::with_config(quiet(), 2);
        let viewport = Viewport::new(1200.0, 800.0);
        for id in 0..net.cuboids().len() {
            let pass = net.cuboid_pass(id, viewport).unwrap();
            let depth = |f: usize| CUBOID_FACES[f].iter().map(|&v| pass.verts[v].depth).sum::<f32>() / 4.0;
            for pair in pass.faces.windows(2) {
                assert!(depth(pair[0]) >= depth(pair[1]));
            }
        }
    }

    #[test]
    fn test_cuboids_drawn_far_to_near() {
        let net = NeuralNetwork::new(2);
        let viewport = Viewport::new(1200.0, 800.0);
        let order = net.draw_order(viewport);
        assert_eq!(order.len(), 6);
        let depths: Vec<f32> = order
            .iter()
            .map(|&id| net.camera.project(net.animated_center(id).unwrap(), viewport).unwrap().depth)
            .collect();
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_texture_lines_fixed_per_seed() {
        let a = NeuralNetwork::new(42);
        let b = NeuralNetwork::new(42);
        for id in 0..a.cuboids().len() {
            assert_eq!(a.texture_lines(id), b.texture_lines(id));
            let lines = a.texture_lines(id).unwrap();
            assert_eq!(lines.len(), 4);
            assert!(lines.iter().all(|&(s, e)| s < 8 && e < 8));
        }
    }

    #[test]
    fn test_unknown_cuboid_id_is_none() {
        let net = NeuralNetwork::new(1);
        let missing = net.cuboids().len();
        assert_eq!(net.texture_lines(missing), None);
        assert_eq!(net.animated_center(missing), None);
        assert!(net.cuboid_pass(missing, Viewport::new(800.0, 600.0)).is_none());
    }

    #[test]
    fn test_first_frame_has_no_pulses() {
        let mut net = NeuralNetwork::with_config(quiet(), 9);
        assert!(net.signals().is_empty());
        let mut surface = RecordingSurface::new(1200, 800);
        net.tick(&mut surface);

        assert_eq!(surface.count(|c| matches!(c, DrawCommand::FillCircle { .. })), 0);
        assert_eq!(surface.count(|c| matches!(c, DrawCommand::StrokeLine { .. })), 7);
        assert_eq!(surface.count(|c| matches!(c, DrawCommand::Polygon { .. })), 36);
        assert_eq!(surface.count(|c| matches!(c, DrawCommand::FillRect { .. })), 48);
    }
}
