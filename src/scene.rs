//! Scene trait and mount/unmount glue.
//!
//! Mounting binds a scene to a drawing surface and a frame scheduler: each
//! refresh runs one `tick`, resize notifications reallocate the surface
//! between ticks, and unmounting stops the loop and runs any registered
//! listener teardown exactly once.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::neural_network::NeuralNetwork;
use crate::particle_wave::ParticleWave;
use crate::profiling;
use crate::scheduler::{FrameHost, FrameLoopHandle, FrameScheduler};
use crate::skills_cylinder::SkillsCylinder;
use crate::surface::DrawSurface;

/// An animated visualisation driven one fixed step per frame.
pub trait Scene {
    fn name(&self) -> &'static str;

    /// Advance the simulation one step and redraw the whole surface.
    fn tick(&mut self, surface: &mut dyn DrawSurface);
}

/// Where a scene takes its surface size from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSource {
    /// The host window's inner size (full-page backgrounds).
    Window,
    /// The canvas element's own box.
    Element,
}

/// The built-in scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Wave,
    Network,
    Skills,
}

impl SceneKind {
    pub const ALL: [SceneKind; 3] = [SceneKind::Wave, SceneKind::Network, SceneKind::Skills];

    /// Build a fresh scene. `seed` feeds the scenes that use randomness.
    pub fn create(self, seed: u64) -> Box<dyn Scene> {
        match self {
            SceneKind::Wave => Box::new(ParticleWave::new()),
            SceneKind::Network => Box::new(NeuralNetwork::new(seed)),
            SceneKind::Skills => Box::new(SkillsCylinder::new()),
        }
    }

    pub fn size_source(self) -> SizeSource {
        match self {
            SceneKind::Wave => SizeSource::Window,
            SceneKind::Network | SceneKind::Skills => SizeSource::Element,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SceneKind::Wave => "wave",
            SceneKind::Network => "network",
            SceneKind::Skills => "skills",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wave" | "particle_wave" | "particles" => Ok(SceneKind::Wave),
            "network" | "neural_network" | "cubes" => Ok(SceneKind::Network),
            "skills" | "skills_cylinder" | "cylinder" => Ok(SceneKind::Skills),
            other => Err(format!("unknown scene '{}' (expected wave, network or skills)", other)),
        }
    }
}

/// Clamp a host-reported dimension to a surface size; negatives become 0.
pub fn surface_dimension(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// A scene running on a surface.
pub struct MountedScene<S: DrawSurface + 'static> {
    name: &'static str,
    surface: Rc<RefCell<S>>,
    handle: FrameLoopHandle,
}

impl<S: DrawSurface + 'static> MountedScene<S> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        self.handle.scheduler()
    }

    pub fn is_running(&self) -> bool {
        self.handle.scheduler().is_running()
    }

    /// Host viewport or element box changed. Degenerate sizes are applied as-is.
    pub fn resize(&self, width: f64, height: f64) {
        self.handle
            .scheduler()
            .notify_resize(surface_dimension(width), surface_dimension(height));
    }

    /// Register teardown work to run on unmount, e.g. removing an event listener.
    pub fn on_unmount(&mut self, detach: impl FnOnce() + 'static) {
        self.handle.on_release(detach);
    }

    /// Stop the loop and release listeners. Safe to call more than once.
    pub fn unmount(&mut self) {
        if !self.handle.is_released() {
            log::info!("Unmounting {}", self.name);
        }
        self.handle.release();
    }
}

/// Start `scene` on `surface`. With no surface (not attached yet, or no 2D
/// context) nothing starts and `None` is returned.
pub fn mount<S: DrawSurface + 'static>(
    surface: Option<S>,
    mut scene: Box<dyn Scene>,
    host: Rc<dyn FrameHost>,
) -> Option<MountedScene<S>> {
    let name = scene.name();
    let Some(surface) = surface else {
        log::warn!("No drawing surface for {}; not starting", name);
        return None;
    };
    let viewport = surface.viewport();
    log::info!("Mounting {} at {}x{}", name, viewport.width, viewport.height);

    let surface = Rc::new(RefCell::new(surface));
    let scheduler = FrameScheduler::new(host);
    profiling::reset_frame_counter();

    let resize_target = surface.clone();
    scheduler.on_resize(move |width, height| {
        resize_target.borrow_mut().resize(width, height);
    });

    let tick_target = surface.clone();
    scheduler.start(move || {
        let mut surface = tick_target.borrow_mut();
        profiling::timed(name, || scene.tick(&mut *surface));
        if profiling::should_log_stats() {
            let viewport = surface.viewport();
            log::info!("[STATS] {} at {}x{}", name, viewport.width, viewport.height);
        }
    });

    Some(MountedScene {
        name,
        surface,
        handle: FrameLoopHandle::new(scheduler),
    })
}
