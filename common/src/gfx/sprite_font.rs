//! Bitmap fonts in the `DXTKfont` binary layout produced by MakeSpriteFont.
//!
//! Layout (little endian): 8 byte magic, glyph count, glyphs (character,
//! source rectangle as left/top/right/bottom, x offset, y offset, x advance),
//! line spacing, default character, then the glyph sheet as width, height,
//! DXGI format, row stride, row count and pixel rows.

use std::path::Path;

use glam::{vec2, Vec2};

use crate::gfx::{
    format::PixelFormat,
    reader::{ByteReader, UnexpectedEof},
    sprite_batch::Rect,
    texture_data::TextureData,
};

const MAGIC: &[u8; 8] = b"DXTKfont";

#[derive(Debug, thiserror::Error)]
pub enum SpriteFontError {
    #[error("not a sprite font")]
    BadMagic,

    #[error("truncated sprite font: {0}")]
    Truncated(#[from] UnexpectedEof),

    #[error("sprite font glyphs are not sorted by character")]
    UnsortedGlyphs,

    #[error("sprite font texture format {0} is not supported")]
    UnsupportedFormat(u32),

    #[error("sprite font texture rows do not match its size")]
    BadTextureLayout,

    #[error("character {0:?} is not in the font and there is no default character")]
    MissingGlyph(char),

    #[error("failed to read font {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glyph {
    pub character: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_advance: f32,
}

impl Glyph {
    pub fn source(&self) -> Rect {
        Rect::from_ltrb(self.left, self.top, self.right, self.bottom)
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left) as f32
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top) as f32
    }
}

/// One glyph of laid out text, relative to the string's origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphPlacement {
    pub source: Rect,
    pub offset: Vec2,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpriteFontData {
    glyphs: Vec<Glyph>,
    line_spacing: f32,
    default_character: Option<char>,
    texture: TextureData,
}

fn is_whitespace(character: u32) -> bool {
    char::from_u32(character).is_some_and(char::is_whitespace)
}

impl SpriteFontData {
    pub fn parse(bytes: &[u8]) -> Result<Self, SpriteFontError> {
        let mut reader = ByteReader::new(bytes);

        if reader.read_bytes(MAGIC.len())? != MAGIC {
            return Err(SpriteFontError::BadMagic);
        }

        let glyph_count = reader.read_u32()? as usize;
        let mut glyphs = Vec::with_capacity(glyph_count.min(reader.remaining() / 32));
        for _ in 0..glyph_count {
            glyphs.push(Glyph {
                character: reader.read_u32()?,
                left: reader.read_i32()?,
                top: reader.read_i32()?,
                right: reader.read_i32()?,
                bottom: reader.read_i32()?,
                x_offset: reader.read_f32()?,
                y_offset: reader.read_f32()?,
                x_advance: reader.read_f32()?,
            });
        }

        if glyphs.windows(2).any(|w| w[0].character >= w[1].character) {
            return Err(SpriteFontError::UnsortedGlyphs);
        }

        let line_spacing = reader.read_f32()?;
        let default_character = char::from_u32(reader.read_u32()?).filter(|c| *c != '\0');

        let width = reader.read_u32()?;
        let height = reader.read_u32()?;
        let format_value = reader.read_u32()?;
        let stride = reader.read_u32()? as usize;
        let rows = reader.read_u32()? as usize;
        let pixels = reader.read_bytes(stride * rows)?;

        let format = PixelFormat::from_dxgi(format_value)
            .ok_or(SpriteFontError::UnsupportedFormat(format_value))?;
        let expected = format.surface_info(width, height);
        if stride != expected.row_pitch || rows != expected.row_count {
            return Err(SpriteFontError::BadTextureLayout);
        }
        let texture = TextureData::with_mip_chain(width, height, format, 1, pixels.to_vec())
            .ok_or(SpriteFontError::BadTextureLayout)?;

        Ok(Self {
            glyphs,
            line_spacing,
            default_character,
            texture,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SpriteFontError> {
        let bytes = std::fs::read(path).map_err(|source| SpriteFontError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let font = Self::parse(&bytes)?;
        log::debug!(
            "loaded font {} ({} glyphs, line spacing {})",
            path.display(),
            font.glyphs.len(),
            font.line_spacing
        );
        Ok(font)
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn texture(&self) -> &TextureData {
        &self.texture
    }

    pub fn line_spacing(&self) -> f32 {
        self.line_spacing
    }

    pub fn set_line_spacing(&mut self, spacing: f32) {
        self.line_spacing = spacing;
    }

    pub fn default_character(&self) -> Option<char> {
        self.default_character
    }

    /// Characters missing from the font render as this one, if present.
    pub fn set_default_character(&mut self, character: Option<char>) {
        self.default_character = character;
    }

    pub fn contains(&self, character: char) -> bool {
        self.glyphs
            .binary_search_by_key(&(character as u32), |g| g.character)
            .is_ok()
    }

    pub fn find_glyph(&self, character: char) -> Result<&Glyph, SpriteFontError> {
        let lookup = |c: char| {
            self.glyphs
                .binary_search_by_key(&(c as u32), |g| g.character)
                .ok()
                .map(|i| &self.glyphs[i])
        };

        lookup(character)
            .or_else(|| self.default_character.and_then(lookup))
            .ok_or(SpriteFontError::MissingGlyph(character))
    }

    /// Walks `text` calling `action(glyph, x, y)` with each glyph's pen position.
    fn for_each_glyph<F>(
        &self,
        text: &str,
        ignore_whitespace: bool,
        mut action: F,
    ) -> Result<(), SpriteFontError>
    where
        F: FnMut(&Glyph, f32, f32),
    {
        let (mut x, mut y) = (0.0f32, 0.0f32);

        for character in text.chars() {
            match character {
                '\r' => continue,
                '\n' => {
                    x = 0.0;
                    y += self.line_spacing;
                }
                _ => {
                    let glyph = self.find_glyph(character)?;
                    x = (x + glyph.x_offset).max(0.0);
                    let advance = glyph.width() + glyph.x_advance;

                    // Whitespace with a visible subrect still draws.
                    if !ignore_whitespace
                        || !character.is_whitespace()
                        || glyph.width() > 1.0
                        || glyph.height() > 1.0
                    {
                        action(glyph, x, y);
                    }
                    x += advance;
                }
            }
        }

        Ok(())
    }

    /// Positions of the visible glyphs of `text`.
    pub fn layout(&self, text: &str) -> Result<Vec<GlyphPlacement>, SpriteFontError> {
        let mut placements = Vec::with_capacity(text.len());
        self.for_each_glyph(text, true, |glyph, x, y| {
            placements.push(GlyphPlacement {
                source: glyph.source(),
                offset: vec2(x, y + glyph.y_offset),
            });
        })?;
        Ok(placements)
    }

    /// Size of the box `text` occupies when drawn.
    pub fn measure(&self, text: &str) -> Result<Vec2, SpriteFontError> {
        let line_spacing = self.line_spacing;
        let mut size = Vec2::ZERO;
        self.for_each_glyph(text, false, |glyph, x, y| {
            let width = glyph.width();
            let height = if is_whitespace(glyph.character) {
                line_spacing
            } else {
                (glyph.height() + glyph.y_offset).max(line_spacing)
            };
            size = size.max(vec2(x + width, y + height));
        })?;
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(character: char, left: i32, width: i32, x_offset: f32, x_advance: f32) -> Glyph {
        Glyph {
            character: character as u32,
            left,
            top: 0,
            right: left + width,
            bottom: 10,
            x_offset,
            y_offset: 2.0,
            x_advance,
        }
    }

    /// Serializes a small font: space, 'A', 'B', '?' on a 4x4 RGBA sheet.
    fn sample_font_bytes(default_character: u32) -> Vec<u8> {
        let space = Glyph {
            bottom: 1,
            ..glyph(' ', 0, 0, 0.0, 4.0)
        };
        let glyphs = [
            space,
            glyph('?', 0, 5, 0.0, 1.0),
            glyph('A', 5, 8, 1.0, 1.0),
            glyph('B', 13, 6, -20.0, 2.0),
        ];
        font_bytes(&glyphs, default_character)
    }

    fn font_bytes(glyphs: &[Glyph], default_character: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(glyphs.len() as u32).to_le_bytes());
        for g in glyphs.iter() {
            out.extend_from_slice(&g.character.to_le_bytes());
            for v in [g.left, g.top, g.right, g.bottom] {
                out.extend_from_slice(&v.to_le_bytes());
            }
            for v in [g.x_offset, g.y_offset, g.x_advance] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        out.extend_from_slice(&12.0f32.to_le_bytes());
        out.extend_from_slice(&default_character.to_le_bytes());
        for v in [4u32, 4, 28, 16, 4] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend(std::iter::repeat(0xff).take(64));
        out
    }

    fn sample_font() -> SpriteFontData {
        SpriteFontData::parse(&sample_font_bytes(0)).unwrap()
    }

    #[test]
    fn parses_header_glyphs_and_texture() {
        let font = sample_font();
        assert_eq!(font.glyphs().len(), 4);
        assert_eq!(font.line_spacing(), 12.0);
        assert_eq!(font.default_character(), None);
        assert_eq!(font.texture().format, PixelFormat::Rgba8Unorm);
        assert_eq!((font.texture().width, font.texture().height), (4, 4));
        assert_eq!(font.find_glyph('A').unwrap().source(), Rect::new(5.0, 0.0, 8.0, 10.0));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            SpriteFontData::parse(b"DXTKfonx\0\0\0\0"),
            Err(SpriteFontError::BadMagic)
        ));

        let bytes = sample_font_bytes(0);
        assert!(matches!(
            SpriteFontData::parse(&bytes[..bytes.len() - 1]),
            Err(SpriteFontError::Truncated(_))
        ));

        let mut wrong_format = sample_font_bytes(0);
        let format_offset = wrong_format.len() - 64 - 12;
        wrong_format[format_offset..format_offset + 4].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            SpriteFontData::parse(&wrong_format),
            Err(SpriteFontError::UnsupportedFormat(2))
        ));
    }

    #[test]
    fn rejects_unsorted_glyphs() {
        let mut bytes = sample_font_bytes(0);
        // Rename '?' (second glyph) to 'Z' so it sorts after 'A'.
        let second = 8 + 4 + 32;
        bytes[second..second + 4].copy_from_slice(&('Z' as u32).to_le_bytes());
        assert!(matches!(
            SpriteFontData::parse(&bytes),
            Err(SpriteFontError::UnsortedGlyphs)
        ));
    }

    #[test]
    fn missing_glyph_uses_default_character() {
        let font = sample_font();
        assert!(matches!(
            font.find_glyph('x'),
            Err(SpriteFontError::MissingGlyph('x'))
        ));

        let font = SpriteFontData::parse(&sample_font_bytes('?' as u32)).unwrap();
        assert_eq!(font.find_glyph('x').unwrap().character, '?' as u32);
        assert!(!font.contains('x'));
    }

    #[test]
    fn layout_advances_pen_and_skips_whitespace() {
        let font = sample_font();
        let placements = font.layout("A A").unwrap();
        let offsets: Vec<_> = placements.iter().map(|p| p.offset).collect();
        // 'A': x = 0 + 1, advance 9. ' ': advance 4. 'A': x = 14 + 1.
        assert_eq!(offsets, vec![vec2(1.0, 2.0), vec2(15.0, 2.0)]);
        assert_eq!(placements[0].source, Rect::new(5.0, 0.0, 8.0, 10.0));
    }

    #[test]
    fn whitespace_skip_looks_at_the_input_character() {
        // 'x' falls back to the blank space glyph but is not itself whitespace.
        let font = SpriteFontData::parse(&sample_font_bytes(' ' as u32)).unwrap();
        let placements = font.layout("x").unwrap();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].source, Rect::new(0.0, 0.0, 0.0, 1.0));
        assert!(font.layout(" ").unwrap().is_empty());
    }

    #[test]
    fn whitespace_with_visible_subrect_is_drawn() {
        let glyphs = [glyph(' ', 0, 3, 0.0, 1.0), glyph('A', 5, 8, 1.0, 1.0)];
        let font = SpriteFontData::parse(&font_bytes(&glyphs, 0)).unwrap();
        let offsets: Vec<_> = font.layout("A A").unwrap().iter().map(|p| p.offset).collect();
        // 'A' at 1 advances 9, ' ' at 10 advances 4, 'A' at 14 + 1.
        assert_eq!(offsets, vec![vec2(1.0, 2.0), vec2(10.0, 2.0), vec2(15.0, 2.0)]);
    }

    #[test]
    fn layout_handles_newlines_and_negative_offsets() {
        let font = sample_font();
        let placements = font.layout("A\r\nB").unwrap();
        assert_eq!(placements.len(), 2);
        // 'B' has a large negative x offset which clamps to the line start.
        assert_eq!(placements[1].offset, vec2(0.0, 14.0));
    }

    #[test]
    fn layout_fails_on_unknown_character_without_default() {
        let font = sample_font();
        assert!(matches!(
            font.layout("HELLO"),
            Err(SpriteFontError::MissingGlyph('H'))
        ));
    }

    #[test]
    fn measure_uses_line_spacing_as_minimum_height() {
        let font = sample_font();
        assert_eq!(font.measure("A").unwrap(), vec2(9.0, 12.0));
        assert_eq!(font.measure("AA").unwrap(), vec2(19.0, 12.0));
        assert_eq!(font.measure("A\nA").unwrap(), vec2(9.0, 24.0));
        assert_eq!(font.measure("").unwrap(), Vec2::ZERO);
    }
}
