pub mod color;
pub mod dds;
pub mod driver;
pub mod format;
pub mod reader;
pub mod sprite_batch;
pub mod sprite_font;
pub mod texture_data;

#[cfg(windows)]
pub mod device;
#[cfg(windows)]
pub mod font;
#[cfg(windows)]
pub mod shader;
#[cfg(windows)]
pub mod sprite_renderer;
#[cfg(windows)]
pub mod texture;
