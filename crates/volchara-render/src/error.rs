//! Error types for the render crate.

use crate::object::ObjectId;
use thiserror::Error;
use volchara_gpu::GpuError;

/// Render error type.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Core(#[from] volchara_core::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Object {object:?} uses texture {index} but only {loaded} are loaded")]
    InvalidTextureIndex {
        object: ObjectId,
        index: u32,
        loaded: u32,
    },

    #[error("Unknown object: {0:?}")]
    UnknownObject(ObjectId),
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
