/// Texture formats the loaders understand, with their DXGI values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Bgrx8Unorm,
    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc2UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
}

/// Byte layout of one mip level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub row_pitch: usize,
    pub row_count: usize,
    pub byte_count: usize,
}

impl PixelFormat {
    pub fn from_dxgi(value: u32) -> Option<Self> {
        Some(match value {
            28 => PixelFormat::Rgba8Unorm,
            29 => PixelFormat::Rgba8UnormSrgb,
            71 => PixelFormat::Bc1Unorm,
            72 => PixelFormat::Bc1UnormSrgb,
            74 => PixelFormat::Bc2Unorm,
            75 => PixelFormat::Bc2UnormSrgb,
            77 => PixelFormat::Bc3Unorm,
            78 => PixelFormat::Bc3UnormSrgb,
            87 => PixelFormat::Bgra8Unorm,
            88 => PixelFormat::Bgrx8Unorm,
            91 => PixelFormat::Bgra8UnormSrgb,
            _ => return None,
        })
    }

    pub fn dxgi_value(self) -> u32 {
        match self {
            PixelFormat::Rgba8Unorm => 28,
            PixelFormat::Rgba8UnormSrgb => 29,
            PixelFormat::Bc1Unorm => 71,
            PixelFormat::Bc1UnormSrgb => 72,
            PixelFormat::Bc2Unorm => 74,
            PixelFormat::Bc2UnormSrgb => 75,
            PixelFormat::Bc3Unorm => 77,
            PixelFormat::Bc3UnormSrgb => 78,
            PixelFormat::Bgra8Unorm => 87,
            PixelFormat::Bgrx8Unorm => 88,
            PixelFormat::Bgra8UnormSrgb => 91,
        }
    }

    /// Bytes per 4x4 block for block-compressed formats.
    pub fn block_size(self) -> Option<usize> {
        match self {
            PixelFormat::Bc1Unorm | PixelFormat::Bc1UnormSrgb => Some(8),
            PixelFormat::Bc2Unorm
            | PixelFormat::Bc2UnormSrgb
            | PixelFormat::Bc3Unorm
            | PixelFormat::Bc3UnormSrgb => Some(16),
            _ => None,
        }
    }

    pub fn surface_info(self, width: u32, height: u32) -> SurfaceInfo {
        let (width, height) = (width as usize, height as usize);
        let (row_pitch, row_count) = match self.block_size() {
            Some(block_size) => {
                let blocks_wide = width.div_ceil(4).max(1);
                let blocks_high = height.div_ceil(4).max(1);
                (blocks_wide * block_size, blocks_high)
            }
            // All uncompressed formats here are 32 bits per pixel.
            None => (width * 4, height),
        };
        SurfaceInfo {
            row_pitch,
            row_count,
            byte_count: row_pitch * row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dxgi_values_round_trip() {
        for value in [28, 29, 71, 72, 74, 75, 77, 78, 87, 88, 91] {
            assert_eq!(PixelFormat::from_dxgi(value).unwrap().dxgi_value(), value);
        }
        assert_eq!(PixelFormat::from_dxgi(2), None);
    }

    #[test]
    fn uncompressed_pitch() {
        let info = PixelFormat::Rgba8Unorm.surface_info(13, 7);
        assert_eq!(info.row_pitch, 52);
        assert_eq!(info.row_count, 7);
        assert_eq!(info.byte_count, 364);
    }

    #[test]
    fn compressed_pitch_rounds_up_to_blocks() {
        let bc1 = PixelFormat::Bc1Unorm.surface_info(5, 5);
        assert_eq!((bc1.row_pitch, bc1.row_count, bc1.byte_count), (16, 2, 32));

        // Mip tails smaller than a block still occupy one block.
        let bc3 = PixelFormat::Bc3Unorm.surface_info(1, 1);
        assert_eq!((bc3.row_pitch, bc3.row_count, bc3.byte_count), (16, 1, 16));
    }
}
