use bytemuck::{Pod, Zeroable};

/// Linear RGBA color, components in `0.0..=1.0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);
    pub const PURPLE: Color = Color([0.501_960_8, 0.0, 0.501_960_8, 1.0]);
}
