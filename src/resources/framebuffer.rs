//! Offscreen render targets whose size follows the window at a fixed scale.

use winit::dpi::PhysicalSize;

use crate::{
    error::{Error, Result},
    gpu::{FramebufferId, FramebufferStatus, Gpu, TextureDesc, TextureFormat, TextureId},
    resources::ResourceRegistry,
};

/// A framebuffer with a single RGB color attachment.
///
/// `size` always equals [`scaled_size`] of the current window size and `scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub id: FramebufferId,
    pub scale: f32,
    pub size: PhysicalSize<u32>,
    pub color: TextureId,
    /// Never allocated; the 2D passes do not depth test.
    pub depth: Option<TextureId>,
}

/// `max(1, floor(extent * scale))` on each axis.
pub fn scaled_size(window: PhysicalSize<u32>, scale: f32) -> PhysicalSize<u32> {
    let axis = |extent: u32| ((extent as f32 * scale).floor() as u32).max(1);
    PhysicalSize::new(axis(window.width), axis(window.height))
}

/// Allocates a framebuffer sized at `scale` times the window and registers it.
pub fn create_framebuffer(
    gpu: &mut dyn Gpu,
    registry: &mut ResourceRegistry,
    window: PhysicalSize<u32>,
    scale: f32,
) -> Result<FramebufferId> {
    let size = scaled_size(window, scale);
    let id = gpu.create_framebuffer();
    let color = registry.create_texture(
        gpu,
        &TextureDesc {
            label: format!("framebuffer color {}", id.0),
            width: size.width,
            height: size.height,
            format: TextureFormat::Rgb8,
        },
        None,
    )?;
    gpu.attach_color(id, color)?;
    if let FramebufferStatus::Incomplete(reason) = gpu.framebuffer_status(id) {
        gpu.delete_framebuffers(&[id]);
        return Err(Error::FramebufferIncomplete(reason));
    }
    log::debug!(
        "created {id} at scale {scale}: {}x{}",
        size.width,
        size.height
    );
    registry.track_framebuffer(Framebuffer {
        id,
        scale,
        size,
        color,
        depth: None,
    });
    Ok(id)
}

/// Resizes every registered framebuffer for a new window size, keeping all handles.
///
/// # Panics
///
/// If a framebuffer is no longer complete after its storage was reallocated.
pub fn on_window_resize(
    gpu: &mut dyn Gpu,
    registry: &mut ResourceRegistry,
    window: PhysicalSize<u32>,
) -> Result<()> {
    for framebuffer in registry.framebuffers_mut() {
        framebuffer.size = scaled_size(window, framebuffer.scale);
        gpu.resize_texture(
            framebuffer.color,
            framebuffer.size.width,
            framebuffer.size.height,
        )?;
        let status = gpu.framebuffer_status(framebuffer.id);
        assert_eq!(
            status,
            FramebufferStatus::Complete,
            "{} became incomplete after resizing to {}x{}",
            framebuffer.id,
            framebuffer.size.width,
            framebuffer.size.height
        );
    }
    log::info!(
        "resized {} framebuffers for a {}x{} window",
        registry.framebuffers().len(),
        window.width,
        window.height
    );
    Ok(())
}
