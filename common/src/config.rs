//! Application settings and command-line switches.
//!
//! Every setting has a default matching the values the scaffold always used,
//! so a missing `dx_learn.toml` is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gfx::color::Color;

pub const DEFAULT_CONFIG_FILE: &str = "dx_learn.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub client_width: u32,
    pub client_height: u32,
    pub clear_color: [f32; 4],
    pub asset_dir: PathBuf,
    pub font_file: String,
    pub texture_file: String,
    pub vsync: bool,
    pub debug_layer: bool,
    pub exit_on_escape: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "DIRECTX11 APPLICATION".to_string(),
            client_width: 800,
            client_height: 600,
            clear_color: Color::PURPLE.0,
            asset_dir: PathBuf::from("assets"),
            font_file: "Arial.spritefont".to_string(),
            texture_file: "Test.dds".to_string(),
            vsync: false,
            debug_layer: true,
            exit_on_escape: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// An explicit path must exist; the default file is optional.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                log::info!("loading config from {}", path.display());
                Self::load(path)
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    log::info!("loading config from {}", path.display());
                    Self::load(path)
                } else {
                    log::debug!("no {DEFAULT_CONFIG_FILE}, using built-in defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_width == 0 || self.client_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "client area must be non-empty, got {}x{}",
                self.client_width, self.client_height
            )));
        }
        if self.title.contains('\0') {
            return Err(ConfigError::Invalid("title contains a NUL byte".into()));
        }
        Ok(())
    }

    pub fn font_path(&self) -> PathBuf {
        self.asset_dir.join(&self.font_file)
    }

    pub fn texture_path(&self) -> PathBuf {
        self.asset_dir.join(&self.texture_file)
    }

    pub fn clear_color(&self) -> Color {
        Color(self.clear_color)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandLine {
    pub use_warp_device: bool,
    pub use_reference_device: bool,
    pub config_path: Option<PathBuf>,
}

impl CommandLine {
    /// Parses arguments, program name excluded. Switches accept `-` or `/`.
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut command_line = CommandLine::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg.eq_ignore_ascii_case("-warp") || arg.eq_ignore_ascii_case("/warp") {
                command_line.use_warp_device = true;
            } else if arg.eq_ignore_ascii_case("-ref") || arg.eq_ignore_ascii_case("/ref") {
                command_line.use_reference_device = true;
            } else if arg.eq_ignore_ascii_case("-config") || arg.eq_ignore_ascii_case("/config")
            {
                match args.next() {
                    Some(path) => command_line.config_path = Some(PathBuf::from(path)),
                    None => log::warn!("{arg} expects a path"),
                }
            } else {
                log::warn!("ignoring unknown argument {arg}");
            }
        }

        command_line
    }
}

pub fn build_command_line() -> CommandLine {
    CommandLine::parse(std::env::args().skip(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_the_scaffold() {
        let config = AppConfig::default();
        assert_eq!(config.title, "DIRECTX11 APPLICATION");
        assert_eq!((config.client_width, config.client_height), (800, 600));
        assert_eq!(config.clear_color(), Color::PURPLE);
        assert_eq!(config.font_path(), Path::new("assets").join("Arial.spritefont"));
        assert_eq!(config.texture_path(), Path::new("assets").join("Test.dds"));
        assert!(!config.vsync);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = AppConfig::from_toml_str(
            "title = \"Custom\"\nclient_width = 1024\nvsync = true\n",
            Path::new("inline.toml"),
        )
        .unwrap();
        assert_eq!(config.title, "Custom");
        assert_eq!(config.client_width, 1024);
        assert_eq!(config.client_height, 600);
        assert!(config.vsync);
        assert_eq!(config.texture_file, "Test.dds");
    }

    #[test]
    fn zero_sized_client_area_is_rejected() {
        let err = AppConfig::from_toml_str("client_height = 0", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let err = AppConfig::from_toml_str("title = ", Path::new("broken.toml")).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, Path::new("broken.toml")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn load_reads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("dx_learn_config_{}.toml", std::process::id()));
        std::fs::write(&path, "client_width = 640\nclient_height = 480\n").unwrap();
        let config = AppConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        let config = config.unwrap();
        assert_eq!((config.client_width, config.client_height), (640, 480));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = AppConfig::load_or_default(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn command_line_switches() {
        let command_line = CommandLine::parse(args(&["/WARP", "-ref", "-config", "my.toml"]));
        assert!(command_line.use_warp_device);
        assert!(command_line.use_reference_device);
        assert_eq!(command_line.config_path, Some(PathBuf::from("my.toml")));
    }

    #[test]
    fn command_line_ignores_unknown_and_dangling_arguments() {
        let command_line = CommandLine::parse(args(&["--verbose", "-config"]));
        assert_eq!(command_line, CommandLine::default());
    }
}
