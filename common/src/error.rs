use thiserror::Error;

use crate::{
    config::ConfigError,
    gfx::{dds::DdsError, sprite_batch::SpriteBatchError, sprite_font::SpriteFontError},
};

/// Everything that can abort application startup or a frame.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to create window class")]
    WindowClass,

    #[error("failed to create window")]
    WindowCreation,

    #[error("failed to create device and swap chain: {0}")]
    DeviceCreation(String),

    #[cfg(windows)]
    #[error("windows error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("texture error: {0}")]
    Texture(String),

    #[error("shader compilation failed: {0}")]
    Shader(String),

    #[error(transparent)]
    Dds(#[from] DdsError),

    #[error(transparent)]
    SpriteFont(#[from] SpriteFontError),

    #[error(transparent)]
    SpriteBatch(#[from] SpriteBatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<image::ImageError> for AppError {
    fn from(e: image::ImageError) -> Self {
        AppError::Texture(e.to_string())
    }
}
