//! vibrant
//!
//! A small 2D renderer with deferred lighting and a live-editable scene. Sprites are drawn into
//! low-resolution color and normal buffers, lights are accumulated over those in a screen-space
//! pass and the result is scaled up onto the window.
//!
//! High-level modules
//! - `config`: TOML settings for the window, render targets, shader paths and logging
//! - `context`: window surface, device and queue
//! - `data_structures`: attribute store, scene objects, transforms and lights
//! - `editor`: scene editing operations and attribute inspection
//! - `error`: the crate error type
//! - `flow`: winit event loop driving the editor and the renderer
//! - `gpu`: handle-based graphics driver trait and its wgpu backend
//! - `pipelines`: shader programs and uniform blocks
//! - `render`: the four-pass deferred frame
//! - `resources`: GPU resource registry, framebuffers, shaders, textures and quads
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod editor;
pub mod error;
pub mod flow;
pub mod gpu;
pub mod pipelines;
pub mod render;
pub mod resources;

pub use error::{Error, Result};

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use winit::dpi::PhysicalSize;
