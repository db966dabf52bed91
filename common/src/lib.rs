pub mod config;
pub mod error;
pub mod gfx;
pub mod os;
pub mod util;

pub use config::{AppConfig, CommandLine};
pub use error::AppError;
