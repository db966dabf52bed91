//! CPU-side texture images, ready for upload.

use std::path::Path;

use crate::{
    error::AppError,
    gfx::{dds, format::PixelFormat},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub row_pitch: usize,
    pub offset: usize,
    pub len: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mips: Vec<MipLevel>,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Lays out `mip_count` levels back to back, halving each dimension.
    /// Returns `None` when `data` is too short for the chain.
    pub fn with_mip_chain(
        width: u32,
        height: u32,
        format: PixelFormat,
        mip_count: u32,
        data: Vec<u8>,
    ) -> Option<Self> {
        // No 2D chain is longer than 32 levels; a larger count is caught
        // below once the data runs out.
        let mut mips = Vec::with_capacity(mip_count.clamp(1, 32) as usize);
        let (mut w, mut h) = (width, height);
        let mut offset = 0;

        for _ in 0..mip_count.max(1) {
            let info = format.surface_info(w, h);
            if offset + info.byte_count > data.len() {
                return None;
            }
            mips.push(MipLevel {
                width: w,
                height: h,
                row_pitch: info.row_pitch,
                offset,
                len: info.byte_count,
            });
            offset += info.byte_count;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }

        Some(Self {
            width,
            height,
            format,
            mips,
            data,
        })
    }

    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        Self::with_mip_chain(width, height, PixelFormat::Rgba8Unorm, 1, data)
    }

    pub fn mip_bytes(&self, level: usize) -> &[u8] {
        let mip = &self.mips[level];
        &self.data[mip.offset..mip.offset + mip.len]
    }

    /// Decodes any format the `image` crate supports into premultiplied RGBA8.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        let mut texture = Self::from_rgba8(width, height, image.into_raw())
            .ok_or_else(|| AppError::Texture("decoded image has wrong size".into()))?;
        texture.premultiply_alpha();
        Ok(texture)
    }

    /// `.dds` files go through the DDS parser, anything else through `image`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let bytes = std::fs::read(path)?;
        let is_dds = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dds"));

        let texture = if is_dds {
            dds::parse(&bytes)?
        } else {
            Self::from_image_bytes(&bytes)?
        };

        log::debug!(
            "loaded {} ({}x{}, {:?}, {} mips)",
            path.display(),
            texture.width,
            texture.height,
            texture.format,
            texture.mips.len()
        );
        Ok(texture)
    }

    /// No-op for anything but 8-bit RGBA/BGRA layouts.
    pub fn premultiply_alpha(&mut self) {
        if !matches!(
            self.format,
            PixelFormat::Rgba8Unorm
                | PixelFormat::Rgba8UnormSrgb
                | PixelFormat::Bgra8Unorm
                | PixelFormat::Bgra8UnormSrgb
        ) {
            return;
        }

        for pixel in self.data.chunks_exact_mut(4) {
            let alpha = pixel[3] as u32;
            for channel in &mut pixel[..3] {
                *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_offsets() {
        let data = vec![0u8; 16 * 4 + 4 * 4 + 4];
        let texture = TextureData::with_mip_chain(4, 4, PixelFormat::Rgba8Unorm, 3, data).unwrap();
        let levels: Vec<_> = texture
            .mips
            .iter()
            .map(|m| (m.width, m.height, m.offset, m.len))
            .collect();
        assert_eq!(levels, vec![(4, 4, 0, 64), (2, 2, 64, 16), (1, 1, 80, 4)]);
        assert_eq!(texture.mip_bytes(2).len(), 4);
    }

    #[test]
    fn mip_chain_rejects_short_data() {
        assert!(TextureData::with_mip_chain(4, 4, PixelFormat::Rgba8Unorm, 2, vec![0; 64]).is_none());
        assert!(TextureData::with_mip_chain(1, 1, PixelFormat::Rgba8Unorm, u32::MAX, vec![0; 4]).is_none());
    }

    #[test]
    fn premultiply_rounds_to_nearest() {
        let mut texture = TextureData::from_rgba8(2, 1, vec![255, 128, 0, 128, 10, 20, 30, 0]).unwrap();
        texture.premultiply_alpha();
        assert_eq!(texture.data, vec![128, 64, 0, 128, 0, 0, 0, 0]);
    }

    #[test]
    fn compressed_data_is_not_premultiplied() {
        let mut texture = TextureData::with_mip_chain(4, 4, PixelFormat::Bc1Unorm, 1, vec![7; 8]).unwrap();
        texture.premultiply_alpha();
        assert_eq!(texture.data, vec![7; 8]);
    }

    #[test]
    fn decodes_png_through_image_crate() {
        let mut png = Vec::new();
        let source = image::RgbaImage::from_raw(1, 2, vec![255, 0, 0, 255, 0, 255, 0, 0]).unwrap();
        source
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let texture = TextureData::from_image_bytes(&png).unwrap();
        assert_eq!((texture.width, texture.height), (1, 2));
        assert_eq!(texture.format, PixelFormat::Rgba8Unorm);
        assert_eq!(texture.data, vec![255, 0, 0, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = TextureData::load(Path::new("no/such/Test.dds")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
