pub mod projection;
pub mod surface;
pub mod scheduler;
pub mod scene;
pub mod profiling;

// Scenes
pub mod particle_wave;
pub mod neural_network;
pub mod skills_cylinder;

#[cfg(not(target_arch = "wasm32"))]
pub mod raster;
#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
