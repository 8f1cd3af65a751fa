//! Immediate-mode 2D drawing surface.
//!
//! [`DrawSurface`] is the small slice of a canvas 2D context the scenes need.
//! It is implemented by the browser canvas (`wasm` module), the native
//! software rasteriser ([`crate::raster::PixelSurface`]) and by
//! [`RecordingSurface`], which keeps the issued calls for inspection.

use glam::Vec2;
use serde::Serialize;

use crate::projection::Viewport;

/// Monochrome-friendly RGBA colour. Alpha is in `[0, 1]` like a CSS `rgba()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 1.0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 1.0);

    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// White with the given alpha, clamped to `[0, 1]`.
    pub fn white(alpha: f32) -> Self {
        Self::new(255, 255, 255, alpha.clamp(0.0, 1.0))
    }

    /// CSS colour string, e.g. `rgba(255, 255, 255, 0.5)`.
    pub fn css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Outline colour and width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
}

impl Stroke {
    pub const fn new(color: Rgba, width: f32) -> Self {
        Self { color, width }
    }
}

/// Horizontally and vertically centred text request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font_px: f32,
    pub family: &'static str,
    pub color: Rgba,
}

impl TextStyle {
    /// CSS font shorthand, e.g. `16px "Space Mono", monospace`.
    pub fn css_font(&self) -> String {
        format!("{}px {}", self.font_px, self.family)
    }
}

/// The drawing operations a scene may issue during one tick.
pub trait DrawSurface {
    /// Current pixel size.
    fn viewport(&self) -> Viewport;

    /// Reallocate the backing store. Contents are cleared.
    fn resize(&mut self, width: u32, height: u32);

    /// Erase the whole surface to transparent.
    fn clear(&mut self);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba);

    /// Filled circle; `glow` is a blur radius for a soft halo of the same colour (0 for none).
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba, glow: f32);

    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke);

    /// Several independent segments stroked as one path.
    fn stroke_segments(&mut self, segments: &[(Vec2, Vec2)], stroke: Stroke) {
        for &(from, to) in segments {
            self.stroke_line(from, to, stroke);
        }
    }

    /// Closed polygon, filled first and then outlined.
    fn fill_stroke_polygon(&mut self, points: &[Vec2], fill: Rgba, stroke: Stroke);

    /// Text centred on `at`.
    fn fill_text(&mut self, text: &str, at: Vec2, style: &TextStyle);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba,
    },
    FillCircle {
        center: [f32; 2],
        radius: f32,
        color: Rgba,
        glow: f32,
    },
    StrokeLine {
        from: [f32; 2],
        to: [f32; 2],
        stroke: Stroke,
    },
    StrokeSegments {
        segments: Vec<[[f32; 2]; 2]>,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<[f32; 2]>,
        fill: Rgba,
        stroke: Stroke,
    },
    Text {
        text: String,
        at: [f32; 2],
        style: TextStyle,
    },
}

/// Surface that records the calls issued since the last [`DrawSurface::clear`].
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    viewport: Viewport,
    /// Draw calls issued since the most recent clear.
    pub commands: Vec<DrawCommand>,
    /// Number of clears seen, i.e. frames started.
    pub clears: usize,
    /// Number of resizes seen.
    pub resizes: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width as f32, height as f32),
            ..Default::default()
        }
    }

    pub fn count(&self, pred: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl DrawSurface for RecordingSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width as f32, height as f32);
        self.commands.clear();
        self.resizes += 1;
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clears += 1;
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba, glow: f32) {
        self.commands.push(DrawCommand::FillCircle {
            center: center.to_array(),
            radius,
            color,
            glow,
        });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke) {
        self.commands.push(DrawCommand::StrokeLine {
            from: from.to_array(),
            to: to.to_array(),
            stroke,
        });
    }

    fn stroke_segments(&mut self, segments: &[(Vec2, Vec2)], stroke: Stroke) {
        self.commands.push(DrawCommand::StrokeSegments {
            segments: segments.iter().map(|(a, b)| [a.to_array(), b.to_array()]).collect(),
            stroke,
        });
    }

    fn fill_stroke_polygon(&mut self, points: &[Vec2], fill: Rgba, stroke: Stroke) {
        self.commands.push(DrawCommand::Polygon {
            points: points.iter().map(|p| p.to_array()).collect(),
            fill,
            stroke,
        });
    }

    fn fill_text(&mut self, text: &str, at: Vec2, style: &TextStyle) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at: at.to_array(),
            style: style.clone(),
        });
    }
}
