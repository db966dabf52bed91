//! Platform independent half of the sprite batch: queueing, sorting, vertex
//! generation and draw-call batching. The Direct3D half lives in
//! `sprite_renderer`.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{vec2, Mat4, Vec2, Vec4};

use crate::gfx::color::Color;

/// Sprites submitted in a single draw call at most.
pub const MAX_BATCH_SIZE: usize = 2048;
pub const VERTICES_PER_SPRITE: usize = 4;
pub const INDICES_PER_SPRITE: usize = 6;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coord: [f32; 2],
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpriteSortMode {
    /// Submission order, drawn at `end`.
    #[default]
    Deferred,
    /// Each sprite is drawn as soon as it is submitted.
    Immediate,
    Texture,
    BackToFront,
    FrontToBack,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SpriteEffects: u32 {
        const FLIP_HORIZONTALLY = 1;
        const FLIP_VERTICALLY = 2;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(
            left as f32,
            top as f32,
            (right - left) as f32,
            (bottom - top) as f32,
        )
    }

    pub fn origin(&self) -> Vec2 {
        vec2(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        vec2(self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Destination {
    /// Top-left position; the drawn size is the source size times `scale`.
    Position { position: Vec2, scale: Vec2 },
    /// Stretch into a rectangle.
    Rect(Rect),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawParams {
    pub destination: Destination,
    pub source: Option<Rect>,
    pub color: Color,
    pub rotation: f32,
    pub origin: Vec2,
    pub effects: SpriteEffects,
    pub depth: f32,
}

impl DrawParams {
    pub fn at(position: Vec2) -> Self {
        Self {
            destination: Destination::Position {
                position,
                scale: Vec2::ONE,
            },
            source: None,
            color: Color::WHITE,
            rotation: 0.0,
            origin: Vec2::ZERO,
            effects: SpriteEffects::empty(),
            depth: 0.0,
        }
    }

    pub fn stretched(rect: Rect) -> Self {
        Self {
            destination: Destination::Rect(rect),
            ..Self::at(Vec2::ZERO)
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn source(mut self, source: Rect) -> Self {
        self.source = Some(source);
        self
    }

    /// Only meaningful for `Destination::Position`.
    pub fn scale(mut self, scale: Vec2) -> Self {
        if let Destination::Position { scale: s, .. } = &mut self.destination {
            *s = scale;
        }
        self
    }

    pub fn rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn effects(mut self, effects: SpriteEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

const CORNER_OFFSETS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
];

/// Builds the quad for one sprite. Corners are ordered top-left, top-right,
/// bottom-left, bottom-right before rotation.
pub fn sprite_vertices(texture_size: Vec2, params: &DrawParams) -> [SpriteVertex; 4] {
    let source = params
        .source
        .unwrap_or(Rect::new(0.0, 0.0, texture_size.x, texture_size.y));
    let inverse_texture_size = texture_size.recip();
    let source_origin_uv = source.origin() * inverse_texture_size;
    let source_size_uv = source.size() * inverse_texture_size;

    let (position, size) = match params.destination {
        Destination::Position { position, scale } => (position, source.size() * scale),
        Destination::Rect(rect) => (rect.origin(), rect.size()),
    };

    let origin = if source.width != 0.0 && source.height != 0.0 {
        params.origin / source.size()
    } else {
        params.origin * inverse_texture_size
    };

    let (sin, cos) = if params.rotation != 0.0 {
        params.rotation.sin_cos()
    } else {
        (0.0, 1.0)
    };

    let mirror = (params.effects.bits() & 3) as usize;

    std::array::from_fn(|i| {
        let offset = (CORNER_OFFSETS[i] - origin) * size;
        let rotated = vec2(
            offset.x * cos - offset.y * sin,
            offset.x * sin + offset.y * cos,
        );
        let corner = position + rotated;
        let uv = CORNER_OFFSETS[i ^ mirror] * source_size_uv + source_origin_uv;

        SpriteVertex {
            position: [corner.x, corner.y, params.depth],
            color: params.color.0,
            tex_coord: uv.to_array(),
        }
    })
}

/// Index pattern shared by every batch: two triangles per quad.
pub fn sprite_indices(sprite_count: usize) -> Vec<u16> {
    debug_assert!(sprite_count * VERTICES_PER_SPRITE <= u16::MAX as usize + 1);

    (0..sprite_count)
        .flat_map(|i| {
            let base = (i * VERTICES_PER_SPRITE) as u16;
            [base, base + 1, base + 2, base + 1, base + 3, base + 2]
        })
        .collect()
}

/// Maps pixel coordinates (origin top-left, y down) to clip space.
///
/// Uploaded as-is to a `row_major` constant, so the shader computes
/// `mul(position, transform)`.
pub fn viewport_transform(width: f32, height: f32) -> Mat4 {
    let x_scale = if width > 0.0 { 2.0 / width } else { 0.0 };
    let y_scale = if height > 0.0 { 2.0 / height } else { 0.0 };

    Mat4::from_cols(
        Vec4::new(x_scale, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -y_scale, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(-1.0, 1.0, 0.0, 1.0),
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueuedSprite<K> {
    pub texture: K,
    pub texture_size: Vec2,
    pub params: DrawParams,
}

/// Order in which queued sprites are drawn. Sorting is stable.
pub fn sort_order<K: Ord>(sprites: &[QueuedSprite<K>], mode: SpriteSortMode) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sprites.len()).collect();

    match mode {
        SpriteSortMode::Deferred | SpriteSortMode::Immediate => {}
        SpriteSortMode::Texture => order.sort_by(|&a, &b| sprites[a].texture.cmp(&sprites[b].texture)),
        SpriteSortMode::BackToFront => order.sort_by(|&a, &b| {
            sprites[b]
                .params
                .depth
                .total_cmp(&sprites[a].params.depth)
        }),
        SpriteSortMode::FrontToBack => order.sort_by(|&a, &b| {
            sprites[a]
                .params
                .depth
                .total_cmp(&sprites[b].params.depth)
        }),
    }

    order
}

/// A run of consecutive sprites sharing a texture; one draw call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch<K> {
    pub texture: K,
    pub start: usize,
    pub count: usize,
}

pub fn batch_runs<K: Copy + PartialEq>(textures: &[K]) -> Vec<Batch<K>> {
    let mut batches: Vec<Batch<K>> = Vec::new();

    for (i, &texture) in textures.iter().enumerate() {
        match batches.last_mut() {
            Some(batch) if batch.texture == texture && batch.count < MAX_BATCH_SIZE => {
                batch.count += 1;
            }
            _ => batches.push(Batch {
                texture,
                start: i,
                count: 1,
            }),
        }
    }

    batches
}

/// Sorted vertices plus the draw calls covering them.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedSprites<K> {
    pub vertices: Vec<SpriteVertex>,
    pub batches: Vec<Batch<K>>,
}

impl<K> PreparedSprites<K> {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batch_vertices(&self, batch: &Batch<K>) -> &[SpriteVertex] {
        let start = batch.start * VERTICES_PER_SPRITE;
        &self.vertices[start..start + batch.count * VERTICES_PER_SPRITE]
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpriteBatchError {
    #[error("begin called twice without end")]
    AlreadyBegun,

    #[error("sprite batch used outside begin/end")]
    NotBegun,

    #[error("texture has zero size")]
    EmptyTexture,
}

/// Begin/end bookkeeping and the sprite queue.
#[derive(Debug)]
pub struct SpriteQueue<K> {
    sprites: Vec<QueuedSprite<K>>,
    mode: Option<SpriteSortMode>,
}

impl<K> Default for SpriteQueue<K> {
    fn default() -> Self {
        Self {
            sprites: Vec::new(),
            mode: None,
        }
    }
}

impl<K: Copy + Ord> SpriteQueue<K> {
    pub fn begin(&mut self, mode: SpriteSortMode) -> Result<(), SpriteBatchError> {
        if self.mode.is_some() {
            return Err(SpriteBatchError::AlreadyBegun);
        }
        self.mode = Some(mode);
        Ok(())
    }

    pub fn sort_mode(&self) -> Option<SpriteSortMode> {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Returns `true` when the sprite must be flushed right away
    /// (immediate mode).
    pub fn push(
        &mut self,
        texture: K,
        texture_size: Vec2,
        params: DrawParams,
    ) -> Result<bool, SpriteBatchError> {
        let mode = self.mode.ok_or(SpriteBatchError::NotBegun)?;
        if texture_size.x <= 0.0 || texture_size.y <= 0.0 {
            return Err(SpriteBatchError::EmptyTexture);
        }

        self.sprites.push(QueuedSprite {
            texture,
            texture_size,
            params,
        });
        Ok(mode == SpriteSortMode::Immediate)
    }

    /// Sorts, generates vertices and empties the queue.
    pub fn take_prepared(&mut self) -> PreparedSprites<K> {
        let mode = self.mode.unwrap_or_default();
        let order = sort_order(&self.sprites, mode);

        let mut vertices = Vec::with_capacity(order.len() * VERTICES_PER_SPRITE);
        let mut textures = Vec::with_capacity(order.len());
        for &i in &order {
            let sprite = &self.sprites[i];
            vertices.extend_from_slice(&sprite_vertices(sprite.texture_size, &sprite.params));
            textures.push(sprite.texture);
        }
        self.sprites.clear();

        PreparedSprites {
            vertices,
            batches: batch_runs(&textures),
        }
    }

    pub fn end(&mut self) -> Result<PreparedSprites<K>, SpriteBatchError> {
        if self.mode.is_none() {
            return Err(SpriteBatchError::NotBegun);
        }
        let prepared = self.take_prepared();
        self.mode = None;
        Ok(prepared)
    }

    /// Drops queued sprites and leaves the batch, e.g. after a failed draw.
    pub fn abort(&mut self) {
        self.sprites.clear();
        self.mode = None;
    }
}

/// Where the next batch goes in the circular dynamic vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingSlot {
    /// Map with discard (buffer wrapped or first use) instead of no-overwrite.
    pub discard: bool,
    /// First sprite slot of the reservation.
    pub start: usize,
}

#[derive(Debug)]
pub struct SpriteRing {
    capacity: usize,
    position: usize,
}

impl SpriteRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            position: 0,
        }
    }

    pub fn reserve(&mut self, count: usize) -> RingSlot {
        debug_assert!(count <= self.capacity);

        if self.position + count > self.capacity {
            self.position = 0;
        }
        let slot = RingSlot {
            discard: self.position == 0,
            start: self.position,
        };
        self.position += count;
        slot
    }

    /// Forget the write position, e.g. after the device context was reset.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    const TEXTURE: Vec2 = Vec2::new(64.0, 32.0);

    fn positions(vertices: &[SpriteVertex]) -> Vec<[f32; 2]> {
        vertices
            .iter()
            .map(|v| [v.position[0], v.position[1]])
            .collect()
    }

    fn uvs(vertices: &[SpriteVertex]) -> Vec<[f32; 2]> {
        vertices.iter().map(|v| v.tex_coord).collect()
    }

    #[test]
    fn plain_sprite_covers_texture() {
        let vertices = sprite_vertices(TEXTURE, &DrawParams::at(vec2(100.0, 100.0)));
        assert_eq!(
            positions(&vertices),
            vec![[100.0, 100.0], [164.0, 100.0], [100.0, 132.0], [164.0, 132.0]]
        );
        assert_eq!(uvs(&vertices), vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        assert!(vertices.iter().all(|v| v.color == Color::WHITE.0 && v.position[2] == 0.0));
    }

    #[test]
    fn source_rect_selects_sub_image() {
        let params = DrawParams::at(vec2(10.0, 20.0))
            .source(Rect::new(16.0, 8.0, 16.0, 16.0))
            .scale(vec2(2.0, 2.0))
            .depth(0.5);
        let vertices = sprite_vertices(TEXTURE, &params);
        assert_eq!(positions(&vertices)[3], [42.0, 52.0]);
        assert_eq!(uvs(&vertices)[0], [0.25, 0.25]);
        assert_eq!(uvs(&vertices)[3], [0.5, 0.75]);
        assert_eq!(vertices[0].position[2], 0.5);
    }

    #[test]
    fn stretched_destination_ignores_source_size() {
        let params = DrawParams::stretched(Rect::new(0.0, 0.0, 200.0, 100.0));
        let vertices = sprite_vertices(TEXTURE, &params);
        assert_eq!(positions(&vertices)[3], [200.0, 100.0]);
    }

    #[test]
    fn rotation_about_center_origin() {
        let params = DrawParams::at(vec2(50.0, 50.0))
            .origin(vec2(32.0, 16.0))
            .rotation(FRAC_PI_2);
        let vertices = sprite_vertices(TEXTURE, &params);
        // Top-left corner (-32, -16) rotated a quarter turn lands at (16, -32).
        assert_relative_eq!(vertices[0].position[0], 66.0, epsilon = 1e-4);
        assert_relative_eq!(vertices[0].position[1], 18.0, epsilon = 1e-4);
        // Bottom-right corner (32, 16) lands at (-16, 32).
        assert_relative_eq!(vertices[3].position[0], 34.0, epsilon = 1e-4);
        assert_relative_eq!(vertices[3].position[1], 82.0, epsilon = 1e-4);
    }

    #[test]
    fn flips_swap_texture_coordinates() {
        let horizontal = sprite_vertices(
            TEXTURE,
            &DrawParams::at(Vec2::ZERO).effects(SpriteEffects::FLIP_HORIZONTALLY),
        );
        assert_eq!(uvs(&horizontal), vec![[1.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);

        let both = sprite_vertices(
            TEXTURE,
            &DrawParams::at(Vec2::ZERO).effects(SpriteEffects::all()),
        );
        assert_eq!(uvs(&both)[0], [1.0, 1.0]);
        // Positions are unaffected by flipping.
        assert_eq!(positions(&both)[0], [0.0, 0.0]);
    }

    #[test]
    fn index_pattern() {
        assert_eq!(sprite_indices(2), vec![0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
        let full = sprite_indices(MAX_BATCH_SIZE);
        assert_eq!(full.len(), MAX_BATCH_SIZE * INDICES_PER_SPRITE);
        assert_eq!(*full.last().unwrap(), (MAX_BATCH_SIZE * 4 - 2) as u16);
    }

    #[test]
    fn viewport_transform_maps_corners() {
        let m = viewport_transform(800.0, 600.0);
        let top_left = m.transform_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        let bottom_right = m.transform_point3(glam::Vec3::new(800.0, 600.0, 0.0));
        assert_relative_eq!(top_left.x, -1.0);
        assert_relative_eq!(top_left.y, 1.0);
        assert_relative_eq!(bottom_right.x, 1.0);
        assert_relative_eq!(bottom_right.y, -1.0);
        // Row-major upload layout keeps the translation in the last row.
        assert_eq!(&m.to_cols_array()[12..], &[-1.0, 1.0, 0.0, 1.0]);
    }

    fn queued(texture: u32, depth: f32) -> QueuedSprite<u32> {
        QueuedSprite {
            texture,
            texture_size: TEXTURE,
            params: DrawParams::at(Vec2::ZERO).depth(depth),
        }
    }

    #[test]
    fn sort_modes() {
        let sprites = [queued(2, 0.5), queued(1, 0.1), queued(2, 0.9), queued(1, 0.5)];
        assert_eq!(sort_order(&sprites, SpriteSortMode::Deferred), vec![0, 1, 2, 3]);
        assert_eq!(sort_order(&sprites, SpriteSortMode::Texture), vec![1, 3, 0, 2]);
        assert_eq!(sort_order(&sprites, SpriteSortMode::BackToFront), vec![2, 0, 3, 1]);
        assert_eq!(sort_order(&sprites, SpriteSortMode::FrontToBack), vec![1, 0, 3, 2]);
    }

    #[test]
    fn runs_split_on_texture_change_and_batch_size() {
        assert_eq!(
            batch_runs(&[7, 7, 3, 7]),
            vec![
                Batch { texture: 7, start: 0, count: 2 },
                Batch { texture: 3, start: 2, count: 1 },
                Batch { texture: 7, start: 3, count: 1 },
            ]
        );

        let many = vec![1u8; MAX_BATCH_SIZE * 2 + 5];
        let runs = batch_runs(&many);
        let counts: Vec<_> = runs.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![MAX_BATCH_SIZE, MAX_BATCH_SIZE, 5]);
        assert_eq!(runs[2].start, MAX_BATCH_SIZE * 2);
    }

    #[test]
    fn queue_requires_begin_and_end_pairs() {
        let mut queue = SpriteQueue::<u32>::default();
        assert_eq!(
            queue.push(0, TEXTURE, DrawParams::at(Vec2::ZERO)),
            Err(SpriteBatchError::NotBegun)
        );
        assert_eq!(queue.end().unwrap_err(), SpriteBatchError::NotBegun);

        queue.begin(SpriteSortMode::Deferred).unwrap();
        assert_eq!(
            queue.begin(SpriteSortMode::Texture),
            Err(SpriteBatchError::AlreadyBegun)
        );
        assert_eq!(
            queue.push(0, Vec2::ZERO, DrawParams::at(Vec2::ZERO)),
            Err(SpriteBatchError::EmptyTexture)
        );
        assert_eq!(queue.push(0, TEXTURE, DrawParams::at(Vec2::ZERO)), Ok(false));
        let prepared = queue.end().unwrap();
        assert_eq!(prepared.vertices.len(), 4);
        assert_eq!(queue.sort_mode(), None);
    }

    #[test]
    fn aborted_batch_can_begin_again() {
        let mut queue = SpriteQueue::<u32>::default();
        queue.begin(SpriteSortMode::Deferred).unwrap();
        queue.push(1, TEXTURE, DrawParams::at(Vec2::ZERO)).unwrap();
        assert_eq!(
            queue.push(2, Vec2::ZERO, DrawParams::at(Vec2::ZERO)),
            Err(SpriteBatchError::EmptyTexture)
        );
        queue.abort();

        assert!(queue.is_empty());
        assert_eq!(queue.sort_mode(), None);
        for _ in 0..2 {
            queue.begin(SpriteSortMode::Deferred).unwrap();
            queue.push(3, TEXTURE, DrawParams::at(Vec2::ZERO)).unwrap();
            let prepared = queue.end().unwrap();
            assert_eq!(prepared.batches, vec![Batch { texture: 3, start: 0, count: 1 }]);
        }
    }

    #[test]
    fn immediate_mode_requests_flush() {
        let mut queue = SpriteQueue::<u32>::default();
        queue.begin(SpriteSortMode::Immediate).unwrap();
        assert_eq!(queue.push(5, TEXTURE, DrawParams::at(Vec2::ZERO)), Ok(true));
        let prepared = queue.take_prepared();
        assert_eq!(prepared.batches, vec![Batch { texture: 5, start: 0, count: 1 }]);
        assert!(queue.is_empty());
        assert_eq!(queue.sort_mode(), Some(SpriteSortMode::Immediate));
        assert!(queue.end().unwrap().is_empty());
    }

    #[test]
    fn prepared_vertices_follow_sort_order() {
        let mut queue = SpriteQueue::<u32>::default();
        queue.begin(SpriteSortMode::Texture).unwrap();
        queue.push(9, TEXTURE, DrawParams::at(vec2(1.0, 0.0))).unwrap();
        queue.push(3, TEXTURE, DrawParams::at(vec2(2.0, 0.0))).unwrap();
        queue.push(9, TEXTURE, DrawParams::at(vec2(3.0, 0.0))).unwrap();
        let prepared = queue.end().unwrap();

        assert_eq!(prepared.batches.len(), 2);
        let first = prepared.batch_vertices(&prepared.batches[0]);
        assert_eq!(first.len(), 4);
        assert_eq!(first[0].position[0], 2.0);
        let second = prepared.batch_vertices(&prepared.batches[1]);
        assert_eq!(second.len(), 8);
        assert_eq!((second[0].position[0], second[4].position[0]), (1.0, 3.0));
    }

    #[test]
    fn ring_wraps_with_discard() {
        let mut ring = SpriteRing::new(10);
        assert_eq!(ring.reserve(4), RingSlot { discard: true, start: 0 });
        assert_eq!(ring.reserve(4), RingSlot { discard: false, start: 4 });
        assert_eq!(ring.reserve(4), RingSlot { discard: true, start: 0 });
        assert_eq!(ring.reserve(6), RingSlot { discard: false, start: 4 });
        ring.reset();
        assert_eq!(ring.reserve(1), RingSlot { discard: true, start: 0 });
    }
}
