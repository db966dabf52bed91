//! DirectDraw Surface (`.dds`) parsing for 2D textures.
//!
//! Accepts the legacy header with DXT1..DXT5 or 32-bit RGB masks and the
//! DX10 extension header. Cube maps, volumes and texture arrays are rejected.

use crate::gfx::{
    format::PixelFormat,
    reader::{ByteReader, UnexpectedEof},
    texture_data::TextureData,
};

const DDS_MAGIC: u32 = 0x2053_3444; // "DDS "
const HEADER_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;

const DDSD_MIPMAPCOUNT: u32 = 0x0002_0000;
const DDSD_DEPTH: u32 = 0x0080_0000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;

const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x0020_0000;

const DX10_DIMENSION_TEXTURE2D: u32 = 3;
const DX10_MISC_TEXTURECUBE: u32 = 0x4;

/// `D3D11_REQ_MIP_LEVELS`.
const MAX_MIP_LEVELS: u32 = 15;

const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

#[derive(Debug, thiserror::Error)]
pub enum DdsError {
    #[error("not a DDS file")]
    BadMagic,

    #[error("bad DDS header size {0}")]
    BadHeaderSize(u32),

    #[error("truncated DDS file: {0}")]
    Truncated(#[from] UnexpectedEof),

    #[error("unsupported DDS pixel format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported DDS resource: {0}")]
    UnsupportedResource(&'static str),

    #[error("DDS texture has zero size")]
    ZeroSize,

    #[error("DDS pixel data is shorter than its mip chain")]
    DataTooShort,

    #[error("DDS mip count {count} exceeds the {max} levels of a {width}x{height} texture")]
    BadMipCount {
        count: u32,
        max: u32,
        width: u32,
        height: u32,
    },
}

struct LegacyPixelFormat {
    flags: u32,
    four_cc: u32,
    rgb_bit_count: u32,
    masks: [u32; 4],
}

fn read_legacy_pixel_format(reader: &mut ByteReader) -> Result<LegacyPixelFormat, DdsError> {
    let size = reader.read_u32()?;
    if size != PIXEL_FORMAT_SIZE {
        return Err(DdsError::BadHeaderSize(size));
    }
    Ok(LegacyPixelFormat {
        flags: reader.read_u32()?,
        four_cc: reader.read_u32()?,
        rgb_bit_count: reader.read_u32()?,
        masks: [
            reader.read_u32()?,
            reader.read_u32()?,
            reader.read_u32()?,
            reader.read_u32()?,
        ],
    })
}

fn legacy_format(pf: &LegacyPixelFormat) -> Result<PixelFormat, DdsError> {
    if pf.flags & DDPF_FOURCC != 0 {
        return match pf.four_cc {
            x if x == four_cc(b"DXT1") => Ok(PixelFormat::Bc1Unorm),
            x if x == four_cc(b"DXT2") || x == four_cc(b"DXT3") => Ok(PixelFormat::Bc2Unorm),
            x if x == four_cc(b"DXT4") || x == four_cc(b"DXT5") => Ok(PixelFormat::Bc3Unorm),
            other => Err(DdsError::UnsupportedFormat(format!(
                "FourCC {:?}",
                String::from_utf8_lossy(&other.to_le_bytes())
            ))),
        };
    }

    if pf.flags & DDPF_RGB != 0 && pf.rgb_bit_count == 32 {
        let has_alpha = pf.flags & DDPF_ALPHAPIXELS != 0 && pf.masks[3] != 0;
        match (pf.masks[0], pf.masks[1], pf.masks[2], has_alpha) {
            (0x0000_00ff, 0x0000_ff00, 0x00ff_0000, true) => return Ok(PixelFormat::Rgba8Unorm),
            (0x00ff_0000, 0x0000_ff00, 0x0000_00ff, true) => return Ok(PixelFormat::Bgra8Unorm),
            (0x00ff_0000, 0x0000_ff00, 0x0000_00ff, false) => return Ok(PixelFormat::Bgrx8Unorm),
            _ => {}
        }
    }

    Err(DdsError::UnsupportedFormat(format!(
        "flags {:#x}, {} bpp, masks {:08x?}",
        pf.flags, pf.rgb_bit_count, pf.masks
    )))
}

/// Levels from `width`x`height` down to 1x1, capped at what D3D11 allows.
fn full_mip_chain_len(width: u32, height: u32) -> u32 {
    (32 - width.max(height).leading_zeros()).min(MAX_MIP_LEVELS)
}

pub fn parse(bytes: &[u8]) -> Result<TextureData, DdsError> {
    let mut reader = ByteReader::new(bytes);

    if reader.read_u32()? != DDS_MAGIC {
        return Err(DdsError::BadMagic);
    }

    let header_size = reader.read_u32()?;
    if header_size != HEADER_SIZE {
        return Err(DdsError::BadHeaderSize(header_size));
    }
    let flags = reader.read_u32()?;
    let height = reader.read_u32()?;
    let width = reader.read_u32()?;
    let _pitch_or_linear_size = reader.read_u32()?;
    let depth = reader.read_u32()?;
    let mip_map_count = reader.read_u32()?;
    reader.skip(11 * 4)?;
    let pixel_format = read_legacy_pixel_format(&mut reader)?;
    let _caps = reader.read_u32()?;
    let caps2 = reader.read_u32()?;
    reader.skip(3 * 4)?;

    if width == 0 || height == 0 {
        return Err(DdsError::ZeroSize);
    }

    let format = if pixel_format.flags & DDPF_FOURCC != 0 && pixel_format.four_cc == four_cc(b"DX10")
    {
        let dxgi_format = reader.read_u32()?;
        let dimension = reader.read_u32()?;
        let misc_flag = reader.read_u32()?;
        let array_size = reader.read_u32()?;
        let _misc_flags2 = reader.read_u32()?;

        if dimension != DX10_DIMENSION_TEXTURE2D {
            return Err(DdsError::UnsupportedResource("only 2D textures are supported"));
        }
        if misc_flag & DX10_MISC_TEXTURECUBE != 0 {
            return Err(DdsError::UnsupportedResource("cube maps are not supported"));
        }
        if array_size == 0 {
            return Err(DdsError::UnsupportedResource("array size is zero"));
        }
        if array_size > 1 {
            return Err(DdsError::UnsupportedResource("texture arrays are not supported"));
        }

        PixelFormat::from_dxgi(dxgi_format)
            .ok_or_else(|| DdsError::UnsupportedFormat(format!("DXGI format {dxgi_format}")))?
    } else {
        if caps2 & DDSCAPS2_CUBEMAP != 0 {
            return Err(DdsError::UnsupportedResource("cube maps are not supported"));
        }
        if caps2 & DDSCAPS2_VOLUME != 0 || (flags & DDSD_DEPTH != 0 && depth > 1) {
            return Err(DdsError::UnsupportedResource("volume textures are not supported"));
        }
        legacy_format(&pixel_format)?
    };

    let mip_count = if flags & DDSD_MIPMAPCOUNT != 0 {
        mip_map_count.max(1)
    } else {
        1
    };

    let max_mip_count = full_mip_chain_len(width, height);
    if mip_count > max_mip_count {
        return Err(DdsError::BadMipCount {
            count: mip_count,
            max: max_mip_count,
            width,
            height,
        });
    }

    let data = reader.read_bytes(reader.remaining())?.to_vec();
    TextureData::with_mip_chain(width, height, format, mip_count, data).ok_or(DdsError::DataTooShort)
}
