//! Starry particle wave field.
//!
//! A dense `amount_x × amount_y` grid of points rolling under two sine waves
//! plus a faster, smaller shimmer. Particles are never stored: each one is a
//! pure function of its grid indices and the scene clock, recomputed every tick.

use glam::Vec3;

use crate::projection::{project_translated, Viewport};
use crate::scene::Scene;
use crate::surface::{DrawSurface, Rgba};

/// Compiled-in wave constants.
#[derive(Debug, Clone)]
pub struct WaveConfig {
    pub amount_x: u32,
    pub amount_y: u32,
    /// Grid spacing in scene units.
    pub separation: f32,
    pub fov: f32,
    /// Vertical camera offset added to every wave height before projection.
    pub camera_y: f32,
    /// Forward translation applied to every row's z before the perspective divide.
    pub camera_offset_z: f32,
    /// Clock increment per tick.
    pub step: f32,
    /// Particles projected further than this outside the viewport are culled.
    pub cull_margin: f32,
    /// Particles dimmer than this are skipped.
    pub alpha_floor: f32,
    /// On-screen sizes below this draw as squares, others as circles.
    pub star_size: f32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            amount_x: 300,
            amount_y: 100,
            separation: 18.0,
            fov: 400.0,
            camera_y: -350.0,
            camera_offset_z: 100.0,
            step: 0.05,
            cull_margin: 50.0,
            alpha_floor: 0.1,
            star_size: 2.0,
        }
    }
}

/// How a particle is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleShape {
    /// Flat square of the given side, anchored at its top-left corner.
    Square { side: f32 },
    /// Round light of the given radius, centred on the point.
    Circle { radius: f32 },
}

/// A visible particle for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveParticle {
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub shape: ParticleShape,
}

/// Height of the wave surface at a grid cell.
pub fn wave_height(ix: u32, iy: u32, count: f32) -> f32 {
    let (ix, iy) = (ix as f32, iy as f32);
    // Main rolling wave
    let mut y = (ix * 0.15 + count).sin() * 25.0 + (iy * 0.15 + count).sin() * 25.0;
    // Shimmer
    y += (ix * 0.5 + count * 2.0).sin() * 3.0;
    y
}

/// Brightness from perspective scale, fading far rows; clamped to at most 1.
pub fn cell_alpha(scale: f32, iy: u32, amount_y: u32) -> f32 {
    let fade = 1.0 - (iy as f32 / amount_y as f32) * 0.8;
    (scale * 2.0 * fade).min(1.0)
}

/// On-screen particle size for a perspective scale.
pub fn particle_size(scale: f32) -> f32 {
    (scale * 2.5).max(0.6)
}

pub struct ParticleWave {
    config: WaveConfig,
    count: f32,
}

impl ParticleWave {
    pub fn new() -> Self {
        Self::with_config(WaveConfig::default())
    }

    pub fn with_config(config: WaveConfig) -> Self {
        Self { config, count: 0.0 }
    }

    pub fn config(&self) -> &WaveConfig {
        &self.config
    }

    /// Scene clock.
    pub fn count(&self) -> f32 {
        self.count
    }

    /// The particle at `(ix, iy)` under the current clock, or `None` if it is
    /// behind the camera, off screen or too dim to draw.
    pub fn particle(&self, ix: u32, iy: u32, viewport: Viewport) -> Option<WaveParticle> {
        let cfg = &self.config;
        let x = ix as f32 * cfg.separation - (cfg.amount_x as f32 * cfg.separation) / 2.0;
        let z = iy as f32 * cfg.separation;
        let y = wave_height(ix, iy, self.count);

        let p = project_translated(
            Vec3::new(x, y + cfg.camera_y, z + cfg.camera_offset_z),
            cfg.fov,
            viewport,
        )?;
        if !viewport.contains_with_margin(p.screen(), cfg.cull_margin) {
            return None;
        }

        let alpha = cell_alpha(p.scale, iy, cfg.amount_y);
        if alpha < cfg.alpha_floor {
            return None;
        }

        let size = particle_size(p.scale);
        let shape = if size < cfg.star_size {
            ParticleShape::Square { side: size }
        } else {
            ParticleShape::Circle { radius: size / 2.0 }
        };
        Some(WaveParticle {
            x: p.x,
            y: p.y,
            alpha,
            shape,
        })
    }

    /// All particles drawn by a tick at the current clock, in draw order.
    pub fn visible_particles(&self, viewport: Viewport) -> impl Iterator<Item = WaveParticle> + '_ {
        let amount_y = self.config.amount_y;
        (0..self.config.amount_x)
            .flat_map(move |ix| (0..amount_y).map(move |iy| (ix, iy)))
            .filter_map(move |(ix, iy)| self.particle(ix, iy, viewport))
    }
}

impl Default for ParticleWave {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for ParticleWave {
    fn name(&self) -> &'static str {
        "particle_wave"
    }

    fn tick(&mut self, surface: &mut dyn DrawSurface) {
        self.count += self.config.step;
        surface.clear();

        let viewport = surface.viewport();
        if viewport.is_degenerate() {
            return;
        }

        for particle in self.visible_particles(viewport) {
            let color = Rgba::white(particle.alpha);
            match particle.shape {
                ParticleShape::Square { side } => surface.fill_rect(particle.x, particle.y, side, side, color),
                ParticleShape::Circle { radius } => {
                    surface.fill_circle(glam::Vec2::new(particle.x, particle.y), radius, color, 0.0)
                }
            }
        }
    }
}
