//! Error taxonomy of the renderer.
//!
//! Attribute lookups, resource creation and shader builds all report through [`Error`]. Only the
//! interactive texture load in [`crate::editor`] recovers from one; everything else is propagated
//! to the application loop, which terminates with the diagnostic.

use std::path::PathBuf;

use crate::{data_structures::attribute::AttributeKind, gpu::ShaderStage};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("attribute `{key}` holds a {found} but a {expected} was requested")]
    AttributeTypeMismatch {
        key: String,
        expected: AttributeKind,
        found: AttributeKind,
    },

    #[error("framebuffer is not complete: {0}")]
    FramebufferIncomplete(String),

    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("uniform block of {len} bytes exceeds the {max} byte limit")]
    UniformBlockTooLarge { len: usize, max: u64 },

    #[error("shader program link failed: {0}")]
    ShaderLink(String),

    #[error("failed to read file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("failed to decode image {path}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A handle was passed to the driver that it never minted or already deleted.
    #[error("unknown {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u32 },

    #[error("graphics backend error: {0}")]
    Backend(String),
}
