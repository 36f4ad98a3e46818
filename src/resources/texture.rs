//! Image files and built-in textures.

use std::path::Path;

use image::DynamicImage;

use crate::{
    error::{Error, Result},
    gpu::{Gpu, TextureDesc, TextureFormat, TextureId},
    resources::ResourceRegistry,
};

/// Neutral tangent-space normal, the blue/purple-ish colour of a flat normal map.
pub const FLAT_NORMAL: [u8; 3] = [127, 127, 255];
pub const WHITE: [u8; 3] = [255, 255, 255];

/// Textures new sprites start out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTextures {
    pub color: TextureId,
    pub normal: TextureId,
}

impl DefaultTextures {
    /// Creates a 1x1 white color texture and a 1x1 flat normal texture.
    pub fn create(gpu: &mut dyn Gpu, registry: &mut ResourceRegistry) -> Result<Self> {
        let color = registry.create_texture(gpu, &solid("default color"), Some(&WHITE))?;
        let normal = registry.create_texture(gpu, &solid("default normal"), Some(&FLAT_NORMAL))?;
        Ok(Self { color, normal })
    }
}

fn solid(label: &str) -> TextureDesc {
    TextureDesc {
        label: label.to_string(),
        width: 1,
        height: 1,
        format: TextureFormat::Rgb8,
    }
}

/// Splits a decoded image into the format matching its channel count and tightly packed pixels.
pub fn image_pixels(img: &DynamicImage) -> (TextureFormat, Vec<u8>) {
    let format = TextureFormat::from_channels(img.color().channel_count());
    let pixels = match format {
        TextureFormat::R8 => img.to_luma8().into_raw(),
        TextureFormat::Rg8 => img.to_luma_alpha8().into_raw(),
        TextureFormat::Rgb8 => img.to_rgb8().into_raw(),
        TextureFormat::Rgba8 => img.to_rgba8().into_raw(),
    };
    (format, pixels)
}

/// Decodes the image at `path` and uploads it as a registered texture.
pub fn load_texture(
    gpu: &mut dyn Gpu,
    registry: &mut ResourceRegistry,
    path: impl AsRef<Path>,
) -> Result<TextureId> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::PathNotFound(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|source| Error::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    let (format, pixels) = image_pixels(&img);
    let desc = TextureDesc {
        label: path.display().to_string(),
        width: img.width(),
        height: img.height(),
        format,
    };
    let texture = registry.create_texture(gpu, &desc, Some(&pixels))?;
    log::info!(
        "loaded {texture} from {} ({}x{} {:?})",
        path.display(),
        desc.width,
        desc.height,
        format
    );
    Ok(texture)
}
