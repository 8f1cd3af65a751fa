use std::f64::consts::TAU;
use std::rc::Rc;

use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, Window};

use crate::profiling;
use crate::projection::Viewport;
use crate::scene::{mount, surface_dimension, MountedScene, SceneKind, SizeSource};
use crate::scheduler::{FrameHost, FrameQueue, FrameRequestId};
use crate::surface::{DrawSurface, Rgba, Stroke, TextStyle};

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
pub fn set_profiling(enabled: bool) {
    profiling::set_profiling_enabled(enabled);
}

/// `requestAnimationFrame` as a frame host.
///
/// One long-lived JS closure serves every request and runs the oldest queued
/// callback; the browser fires frame callbacks in request order. Cancelled
/// callbacks are dropped from the queue, so nothing outlives `unmount`.
struct AnimationFrameHost {
    window: Window,
    queue: Rc<FrameQueue>,
    on_frame: Closure<dyn FnMut()>,
}

impl AnimationFrameHost {
    fn new(window: Window) -> Self {
        let queue = Rc::new(FrameQueue::default());
        let due = queue.clone();
        let on_frame = Closure::<dyn FnMut()>::new(move || {
            due.run_next();
        });
        Self { window, queue, on_frame }
    }
}

impl FrameHost for AnimationFrameHost {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<FrameRequestId> {
        match self.window.request_animation_frame(self.on_frame.as_ref().unchecked_ref()) {
            Ok(id) => {
                let id = FrameRequestId(id);
                self.queue.push(id, callback);
                Some(id)
            }
            Err(e) => {
                log::error!("requestAnimationFrame failed: {:?}", e);
                None
            }
        }
    }

    fn cancel_frame(&self, id: FrameRequestId) {
        let _ = self.window.cancel_animation_frame(id.0);
        self.queue.cancel(id);
    }
}

impl Drop for AnimationFrameHost {
    fn drop(&mut self) {
        // `on_frame` is freed with the host, so no request may still point at it.
        for id in self.queue.ids() {
            let _ = self.window.cancel_animation_frame(id.0);
        }
        drop(self.queue.take_all());
    }
}

/// A `<canvas>` and its 2D context.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// `None` if the canvas has no 2D context.
    pub fn from_canvas(canvas: HtmlCanvasElement) -> Option<Self> {
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()?
            .dyn_into::<CanvasRenderingContext2d>()
            .ok()?;
        Some(Self { canvas, ctx })
    }

    fn trace_path(&self, points: &[Vec2]) {
        self.ctx.begin_path();
        if let Some((first, rest)) = points.split_first() {
            self.ctx.move_to(first.x as f64, first.y as f64);
            for p in rest {
                self.ctx.line_to(p.x as f64, p.y as f64);
            }
        }
    }

    fn apply_stroke(&self, stroke: Stroke) {
        self.ctx.set_stroke_style_str(&stroke.color.css());
        self.ctx.set_line_width(stroke.width as f64);
    }
}

impl DrawSurface for CanvasSurface {
    fn viewport(&self) -> Viewport {
        Viewport::new(self.canvas.width() as f32, self.canvas.height() as f32)
    }

    fn resize(&mut self, width: u32, height: u32) {
        // Assigning the backing size also clears the canvas and resets context state.
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn clear(&mut self) {
        let v = self.viewport();
        self.ctx.clear_rect(0.0, 0.0, v.width as f64, v.height as f64);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        self.ctx.set_fill_style_str(&color.css());
        self.ctx.fill_rect(x as f64, y as f64, width as f64, height as f64);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba, glow: f32) {
        let css = color.css();
        self.ctx.set_fill_style_str(&css);
        if glow > 0.0 {
            self.ctx.set_shadow_color(&css);
            self.ctx.set_shadow_blur(glow as f64);
        }
        self.ctx.begin_path();
        let _ = self.ctx.arc(center.x as f64, center.y as f64, radius as f64, 0.0, TAU);
        self.ctx.fill();
        if glow > 0.0 {
            self.ctx.set_shadow_blur(0.0);
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, stroke: Stroke) {
        self.apply_stroke(stroke);
        self.trace_path(&[from, to]);
        self.ctx.stroke();
    }

    fn stroke_segments(&mut self, segments: &[(Vec2, Vec2)], stroke: Stroke) {
        self.apply_stroke(stroke);
        self.ctx.begin_path();
        for (from, to) in segments {
            self.ctx.move_to(from.x as f64, from.y as f64);
            self.ctx.line_to(to.x as f64, to.y as f64);
        }
        self.ctx.stroke();
    }

    fn fill_stroke_polygon(&mut self, points: &[Vec2], fill: Rgba, stroke: Stroke) {
        self.ctx.set_line_join("round");
        self.ctx.set_line_cap("round");
        self.ctx.set_fill_style_str(&fill.css());
        self.apply_stroke(stroke);
        self.trace_path(points);
        self.ctx.close_path();
        self.ctx.fill();
        self.ctx.stroke();
    }

    fn fill_text(&mut self, text: &str, at: Vec2, style: &TextStyle) {
        self.ctx.set_text_align("center");
        self.ctx.set_text_baseline("middle");
        self.ctx.set_font(&style.css_font());
        self.ctx.set_fill_style_str(&style.color.css());
        let _ = self.ctx.fill_text(text, at.x as f64, at.y as f64);
    }
}

fn measure(source: SizeSource, window: &Window, canvas: &HtmlCanvasElement) -> (u32, u32) {
    let (w, h) = match source {
        SizeSource::Window => (
            window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0),
            window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0),
        ),
        SizeSource::Element => (canvas.offset_width() as f64, canvas.offset_height() as f64),
    };
    (surface_dimension(w), surface_dimension(h))
}

/// A mounted scene. Call `unmount` when the canvas leaves the page.
#[wasm_bindgen]
pub struct WasmScene {
    inner: Option<MountedScene<CanvasSurface>>,
}

#[wasm_bindgen]
impl WasmScene {
    /// Stop animating and detach the resize listener. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if let Some(mut mounted) = self.inner.take() {
            mounted.unmount();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.as_ref().map(|m| m.is_running()).unwrap_or(false)
    }

    pub fn name(&self) -> Option<String> {
        self.inner.as_ref().map(|m| m.name().to_string())
    }
}

/// Mount `scene` ("wave", "network" or "skills") onto `canvas`.
///
/// Returns `None`, without starting anything, when the scene name is unknown
/// or the canvas has no 2D context.
#[wasm_bindgen]
pub fn mount_scene(canvas: HtmlCanvasElement, scene: &str) -> Option<WasmScene> {
    init_panic_hook();

    let kind = match scene.parse::<SceneKind>() {
        Ok(kind) => kind,
        Err(e) => {
            log::error!("{}", e);
            return None;
        }
    };
    let window = web_sys::window()?;
    let source = kind.size_source();

    let surface = CanvasSurface::from_canvas(canvas.clone()).map(|mut surface| {
        let (w, h) = measure(source, &window, &canvas);
        surface.resize(w, h);
        surface
    });

    let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
    let host = Rc::new(AnimationFrameHost::new(window.clone()));
    let mut mounted = mount(surface, kind.create(seed), host)?;

    let scheduler = mounted.scheduler().clone();
    let listen_window = window.clone();
    let on_resize = Closure::<dyn FnMut()>::new(move || {
        let (w, h) = measure(source, &listen_window, &canvas);
        scheduler.notify_resize(w, h);
    });
    if let Err(e) = window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref()) {
        log::warn!("Could not listen for resize: {:?}", e);
    }
    mounted.on_unmount(move || {
        let _ = window.remove_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref());
        drop(on_resize);
    });

    Some(WasmScene { inner: Some(mounted) })
}

#[wasm_bindgen]
pub fn mount_particle_wave(canvas: HtmlCanvasElement) -> Option<WasmScene> {
    mount_scene(canvas, SceneKind::Wave.as_str())
}

#[wasm_bindgen]
pub fn mount_neural_network(canvas: HtmlCanvasElement) -> Option<WasmScene> {
    mount_scene(canvas, SceneKind::Network.as_str())
}

#[wasm_bindgen]
pub fn mount_skills_cylinder(canvas: HtmlCanvasElement) -> Option<WasmScene> {
    mount_scene(canvas, SceneKind::Skills.as_str())
}
