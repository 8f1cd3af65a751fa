//! Rotating cylinder of skill labels.
//!
//! Labels sit on a two-turn helix around a vertical cylinder. Every tick the
//! whole cylinder turns a little about Y; labels are projected, faded and
//! scaled by depth, and drawn back to front.

use glam::{Vec2, Vec3};

use crate::projection::{perspective_scale, rotate_y, to_screen, Viewport};
use crate::scene::Scene;
use crate::surface::{DrawSurface, Rgba, TextStyle};

const FONT_FAMILY: &str = "\"Space Mono\", monospace";

pub const SKILLS: [&str; 16] = [
    "Product Strategy",
    "User Research",
    "Agile & Scrum",
    "Data Analysis",
    "Roadmapping",
    "UX/UI Design",
    "A/B Testing",
    "Go-to-Market",
    "Stakeholder Mgmt",
    "SQL",
    "Python",
    "Figma",
    "Jira",
    "KPI Tracking",
    "Growth Hacking",
    "Wireframing",
];

#[derive(Debug, Clone)]
pub struct CylinderConfig {
    pub radius: f32,
    pub fov: f32,
    /// Rotation increment per tick, radians.
    pub step: f32,
    /// Vertical position of the first label.
    pub top: f32,
    /// Vertical distance from the first label to the last.
    pub span: f32,
    pub base_font_px: f32,
    pub min_font_px: f32,
}

impl Default for CylinderConfig {
    fn default() -> Self {
        Self {
            radius: 180.0,
            fov: 350.0,
            step: 0.003,
            top: -160.0,
            span: 320.0,
            base_font_px: 16.0,
            min_font_px: 10.0,
        }
    }
}

/// A label fixed on the cylinder surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    /// Azimuth around the cylinder axis, radians.
    pub angle: f32,
    pub vertical_position: f32,
}

/// Helix slot for label `index` of `count`: `(angle, vertical_position)`.
///
/// Two full turns across the set; vertical position runs linearly from `top`
/// to `top + span`. A lone label sits at the top.
pub fn helix_slot(index: usize, count: usize, top: f32, span: f32) -> (f32, f32) {
    let angle = (index as f32 / count as f32) * std::f32::consts::PI * 4.0;
    let y = if count > 1 {
        top + (span * index as f32) / (count - 1) as f32
    } else {
        top
    };
    (angle, y)
}

/// Place `texts` on the helix in order.
pub fn place_labels<S: AsRef<str>>(texts: &[S], config: &CylinderConfig) -> Vec<Label> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let (angle, vertical_position) = helix_slot(i, texts.len(), config.top, config.span);
            Label {
                text: text.as_ref().to_string(),
                angle,
                vertical_position,
            }
        })
        .collect()
}

/// Depth fade: `(scale - 0.5) · 2.5` clamped to `[0.1, 1]`.
pub fn label_opacity(scale: f32) -> f32 {
    ((scale - 0.5) * 2.5).clamp(0.1, 1.0)
}

/// A label projected for the current rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel<'a> {
    pub text: &'a str,
    pub screen: Vec2,
    pub scale: f32,
    pub depth: f32,
    pub opacity: f32,
    pub font_px: f32,
}

pub struct SkillsCylinder {
    config: CylinderConfig,
    labels: Vec<Label>,
    rotation: f32,
}

impl SkillsCylinder {
    pub fn new() -> Self {
        Self::with_labels(&SKILLS, CylinderConfig::default())
    }

    pub fn with_labels<S: AsRef<str>>(texts: &[S], config: CylinderConfig) -> Self {
        let labels = place_labels(texts, &config);
        Self {
            config,
            labels,
            rotation: 0.0,
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Labels projected under the current rotation, sorted back to front.
    pub fn placed_labels(&self, viewport: Viewport) -> Vec<PlacedLabel<'_>> {
        let cfg = &self.config;
        let mut placed: Vec<PlacedLabel<'_>> = self
            .labels
            .iter()
            .filter_map(|label| {
                let rest = Vec3::new(cfg.radius * label.angle.cos(), label.vertical_position, cfg.radius * label.angle.sin());
                let p = rotate_y(rest, self.rotation);
                let scale = perspective_scale(cfg.fov, cfg.fov + p.z + cfg.radius)?;
                Some(PlacedLabel {
                    text: &label.text,
                    screen: to_screen(viewport, p.x, p.y, scale),
                    scale,
                    depth: p.z,
                    opacity: label_opacity(scale),
                    font_px: (cfg.base_font_px * scale).max(cfg.min_font_px),
                })
            })
            .collect();
        placed.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        placed
    }
}

impl Default for SkillsCylinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SkillsCylinder {
    fn name(&self) -> &'static str {
        "skills_cylinder"
    }

    fn tick(&mut self, surface: &mut dyn DrawSurface) {
        self.rotation += self.config.step;
        surface.clear();

        let viewport = surface.viewport();
        if viewport.is_degenerate() {
            return;
        }
        for label in self.placed_labels(viewport) {
            let style = TextStyle {
                font_px: label.font_px,
                family: FONT_FAMILY,
                color: Rgba::white(label.opacity),
            };
            surface.fill_text(label.text, label.screen, &style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DrawCommand, RecordingSurface};
    use std::f32::consts::PI;

    #[test]
    fn test_placement_is_deterministic() {
        let config = CylinderConfig::default();
        let a = place_labels(&SKILLS, &config);
        let b = place_labels(&SKILLS, &config);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_helix_spans_two_turns() {
        let (a0, y0) = helix_slot(0, 16, -160.0, 320.0);
        let (a8, _) = helix_slot(8, 16, -160.0, 320.0);
        let (_, y15) = helix_slot(15, 16, -160.0, 320.0);
        assert_eq!((a0, y0), (0.0, -160.0));
        assert!((a8 - 2.0 * PI).abs() < 1e-5);
        assert!((y15 - 160.0).abs() < 1e-4);

        let labels = place_labels(&SKILLS, &CylinderConfig::default());
        assert!(labels.windows(2).all(|w| w[1].angle > w[0].angle && w[1].vertical_position > w[0].vertical_position));
    }

    #[test]
    fn test_single_label_sits_at_top() {
        assert_eq!(helix_slot(0, 1, -160.0, 320.0), (0.0, -160.0));
    }

    #[test]
    fn test_opacity_remap() {
        assert_eq!(label_opacity(0.3), 0.1);
        assert_eq!(label_opacity(2.0), 1.0);
        assert!((label_opacity(0.7) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_labels_back_to_front_with_depth_font() {
        let cylinder = SkillsCylinder::new();
        let placed = cylinder.placed_labels(Viewport::new(600.0, 500.0));
        assert_eq!(placed.len(), 16);
        assert!(placed.windows(2).all(|w| w[0].depth >= w[1].depth));

        let nearest = placed.last().unwrap();
        let farthest = placed.first().unwrap();
        assert!(nearest.font_px > farthest.font_px || farthest.font_px == 10.0);
        assert!(nearest.opacity >= farthest.opacity);
        for label in &placed {
            assert!(label.font_px >= 10.0);
            assert!((0.1..=1.0).contains(&label.opacity));
        }
    }

    #[test]
    fn test_tick_turns_and_draws_every_label() {
        let mut cylinder = SkillsCylinder::new();
        let mut surface = RecordingSurface::new(600, 500);
        cylinder.tick(&mut surface);
        cylinder.tick(&mut surface);
        assert!((cylinder.rotation() - 0.006).abs() < 1e-6);
        assert_eq!(surface.commands.len(), 16);
        assert!(surface.commands.iter().all(|c| matches!(c, DrawCommand::Text { .. })));
    }
}
