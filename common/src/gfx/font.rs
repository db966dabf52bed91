use std::path::Path;

use glam::Vec2;
use windows::Win32::Graphics::Direct3D11::ID3D11Device;

use crate::{
    error::AppError,
    gfx::{
        color::Color,
        sprite_batch::DrawParams,
        sprite_font::SpriteFontData,
        sprite_renderer::SpriteBatch,
        texture::Texture,
    },
};

/// A bitmap font whose glyph sheet lives on the GPU.
pub struct SpriteFont {
    data: SpriteFontData,
    texture: Texture,
}

impl SpriteFont {
    pub fn new(device: &ID3D11Device, data: SpriteFontData) -> Result<Self, AppError> {
        let texture = Texture::create(device, data.texture())?;
        Ok(Self { data, texture })
    }

    pub fn from_file(device: &ID3D11Device, path: &Path) -> Result<Self, AppError> {
        let data = SpriteFontData::load(path)?;
        log::debug!(
            "loaded sprite font {} ({} glyphs)",
            path.display(),
            data.glyphs().len()
        );
        Self::new(device, data)
    }

    /// Queues one sprite per visible glyph. `position` is the top-left of
    /// the first line.
    pub fn draw_string(
        &self,
        batch: &mut SpriteBatch,
        text: &str,
        position: Vec2,
        color: Color,
    ) -> Result<(), AppError> {
        for placement in self.data.layout(text)? {
            let params = DrawParams::at(position + placement.offset)
                .source(placement.source)
                .color(color);
            batch.draw_with(&self.texture, params)?;
        }
        Ok(())
    }
}
