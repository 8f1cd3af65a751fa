//! Software rasteriser for offline rendering, backed by a `tiny_skia::Pixmap`.
//!
//! Shapes are anti-aliased paths composited source-over, which is close enough
//! to a browser canvas for previews and regression frames.

use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec2;
use tiny_skia::{Color, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform};

use crate::projection::Viewport;
use crate::surface::{DrawSurface, Rgba, Stroke, TextStyle};

/// Concentric halo rings drawn under a glowing circle.
const GLOW_RINGS: u32 = 4;

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    let alpha = (color.a.clamp(0.0, 1.0) * 255.0).round() as u8;
    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
    paint.anti_alias = true;
    paint
}

fn skia_stroke(stroke: Stroke) -> tiny_skia::Stroke {
    tiny_skia::Stroke {
        width: stroke.width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

/// RGBA8 frame. Holds no pixmap while the surface is 0 wide or 0 high.
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixmap: Option<Pixmap>,
    text_skipped: usize,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixmap: Pixmap::new(width, height),
            text_skipped: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw premultiplied RGBA bytes; empty for a degenerate surface.
    pub fn as_rgba(&self) -> &[u8] {
        self.pixmap.as_ref().map(|p| p.data()).unwrap_or(&[])
    }

    /// Pixel at `(x, y)` as straight-alpha `[r, g, b, a]`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Number of text draws ignored because no font is bundled.
    pub fn text_skipped(&self) -> usize {
        self.text_skipped
    }

    /// The image composited over an opaque background.
    pub fn flatten(&self, background: Rgba) -> Vec<u8> {
        let (Some(frame), Some(mut out)) = (self.pixmap.as_ref(), Pixmap::new(self.width, self.height)) else {
            return Vec::new();
        };
        out.fill(Color::from_rgba8(background.r, background.g, background.b, 255));
        out.draw_pixmap(0, 0, frame.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        out.take()
    }

    /// Write the frame as a PNG over `background`.
    pub fn save_png(&self, path: &Path, background: Rgba) -> Result<()> {
        image::save_buffer(
            path,
            &self.flatten(background),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
        .with_context(|| format!("Failed to write frame {}", path.display()))
    }
}

impl DrawSurface for PixelSurface {
    fn viewport(&self) -> Viewport {
        Viewport::new(self.width as f32, self.height as f32)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixmap = Pixmap::new(width, height);
    }

    fn clear(&mut self) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill(Color::TRANSPARENT);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        let (Some(pixmap), Some(rect)) = (self.pixmap.as_mut(), Rect::from_xywh(x, y, width, height)) else {
            return;
        };
        pixmap.fill_rect(rect, &paint(color), Transform::identity(), None);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba, glow: f32) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        if glow > 0.0 {
            let halo = Rgba { a: color.a / (GLOW_RINGS * 2) as f32, ..color };
            for ring in (1..=GLOW_RINGS).rev() {
                let r = radius + glow * ring as f32 / GLOW_RINGS as f32;
                if let Some(path) = PathBuilder::from_circle(center.x, center.y, r) {
                    pixmap.fill_path(&path, &paint(halo), FillRule::Winding, Transform::identity(), None);
                }
            }
        }
        if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
            pixmap.fill_path(&path, &paint(color), FillRule::Winding, Transform::identity(), None);
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        let mut pb = PathBuilder::new();
        pb.move_to(from.x, from.y);
        pb.line_to(to.x, to.y);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint(stroke.color), &skia_stroke(stroke), Transform::identity(), None);
        }
    }

    fn fill_stroke_polygon(&mut self, points: &[Vec2], fill: Rgba, stroke: Stroke) {
        let (Some(pixmap), Some((first, rest))) = (self.pixmap.as_mut(), points.split_first()) else {
            return;
        };
        if rest.len() < 2 {
            return;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(first.x, first.y);
        for p in rest {
            pb.line_to(p.x, p.y);
        }
        pb.close();
        let Some(path) = pb.finish() else {
            return;
        };
        pixmap.fill_path(&path, &paint(fill), FillRule::Winding, Transform::identity(), None);
        pixmap.stroke_path(&path, &paint(stroke.color), &skia_stroke(stroke), Transform::identity(), None);
    }

    fn fill_text(&mut self, text: &str, _at: Vec2, _style: &TextStyle) {
        if self.text_skipped == 0 {
            log::debug!("Text is not rasterised offline; skipping '{}' and later labels", text);
        }
        self.text_skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_covers_pixels() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(1.0, 1.0, 2.0, 2.0, Rgba::WHITE);
        assert_eq!(surface.pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(2, 2), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_partial_coverage_scales_alpha() {
        let mut surface = PixelSurface::new(2, 2);
        surface.fill_rect(0.0, 0.0, 0.5, 1.0, Rgba::WHITE);
        let [_, _, _, a] = surface.pixel(0, 0).unwrap();
        assert!((96..=160).contains(&a), "alpha {a}");
        assert_eq!(surface.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_polygon_fill_and_outline() {
        let mut surface = PixelSurface::new(10, 10);
        let quad = [
            Vec2::new(2.0, 2.0),
            Vec2::new(8.0, 2.0),
            Vec2::new(8.0, 8.0),
            Vec2::new(2.0, 8.0),
        ];
        surface.fill_stroke_polygon(&quad, Rgba::BLACK, Stroke::new(Rgba::WHITE, 1.0));
        assert_eq!(surface.pixel(5, 5), Some([0, 0, 0, 255]));
        let [r, _, _, _] = surface.pixel(5, 2).unwrap();
        assert!(r > 100);
        assert_eq!(surface.pixel(0, 9), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_and_nan_are_ignored() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_circle(Vec2::new(f32::NAN, 1.0), 2.0, Rgba::WHITE, 0.0);
        surface.stroke_line(Vec2::new(-100.0, -100.0), Vec2::new(-50.0, -50.0), Stroke::new(Rgba::WHITE, 1.0));
        assert!(surface.as_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_resize_to_zero_is_tolerated() {
        let mut surface = PixelSurface::new(4, 4);
        surface.resize(0, 0);
        surface.fill_rect(0.0, 0.0, 10.0, 10.0, Rgba::WHITE);
        surface.clear();
        assert!(surface.as_rgba().is_empty());
        assert!(surface.viewport().is_degenerate());
    }

    #[test]
    fn test_glow_reaches_past_the_radius() {
        let mut plain = PixelSurface::new(20, 20);
        let mut glowing = PixelSurface::new(20, 20);
        plain.fill_circle(Vec2::new(10.0, 10.0), 2.0, Rgba::WHITE, 0.0);
        glowing.fill_circle(Vec2::new(10.0, 10.0), 2.0, Rgba::WHITE, 6.0);
        assert_eq!(plain.pixel(10, 10), Some([255, 255, 255, 255]));
        assert_eq!(plain.pixel(15, 10), Some([0, 0, 0, 0]));
        let [_, _, _, halo] = glowing.pixel(15, 10).unwrap();
        assert!(halo > 0 && halo < 255);
    }

    #[test]
    fn test_polygon_with_two_points_is_ignored() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_stroke_polygon(&[Vec2::ZERO, Vec2::new(3.0, 3.0)], Rgba::WHITE, Stroke::new(Rgba::WHITE, 1.0));
        assert!(surface.as_rgba().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_flatten_over_black() {
        let mut surface = PixelSurface::new(1, 1);
        surface.fill_rect(0.0, 0.0, 1.0, 1.0, Rgba::white(0.5));
        let flat = surface.flatten(Rgba::BLACK);
        assert_eq!(flat[3], 255);
        assert!((127..=129).contains(&flat[0]));
    }
}
