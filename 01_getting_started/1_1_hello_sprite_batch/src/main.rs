#![windows_subsystem = "windows"]

use common::{
    config::{build_command_line, AppConfig},
    util::init_logging,
    CommandLine,
};

const TITLE: &str = "DirectX Learn";

#[cfg(windows)]
mod app {
    use common::{
        gfx::{
            color::Color, device::Direct3D, font::SpriteFont, sprite_batch::SpriteSortMode,
            sprite_renderer::SpriteBatch, texture::Texture,
        },
        os::DxApp,
        trace_hr, AppConfig, AppError,
    };
    use glam::vec2;

    pub struct TestApp {
        sprite_batch: SpriteBatch,
        sprite_font: SpriteFont,
        /// `None` when the texture failed to load; the sprite is skipped.
        texture: Option<Texture>,
        clear_color: Color,
    }

    impl TestApp {
        fn draw_scene(&mut self) -> Result<(), AppError> {
            if let Some(texture) = &self.texture {
                self.sprite_batch.draw(texture, vec2(100.0, 100.0), Color::WHITE)?;
            }
            self.sprite_font.draw_string(
                &mut self.sprite_batch,
                "HELLO WORLD",
                vec2(300.0, 300.0),
                Color::WHITE,
            )
        }
    }

    impl DxApp for TestApp {
        fn init(gfx: &mut Direct3D, config: &AppConfig) -> Result<Self, AppError> {
            let sprite_batch = SpriteBatch::new(gfx.device(), gfx.context())?;
            let sprite_font = SpriteFont::from_file(gfx.device(), &config.font_path())?;
            let texture = trace_hr!(Texture::from_file(gfx.device(), &config.texture_path()));

            Ok(Self {
                sprite_batch,
                sprite_font,
                texture,
                clear_color: config.clear_color(),
            })
        }

        fn update(&mut self, _gfx: &Direct3D, _dt: f32) {}

        fn render(&mut self, gfx: &mut Direct3D, _dt: f32) -> Result<(), AppError> {
            gfx.clear(self.clear_color);

            // The batch must be left on every path or the next frame's
            // `begin` fails.
            let drawn = self.sprite_batch.begin(SpriteSortMode::Deferred).and_then(|()| {
                match self.draw_scene() {
                    Ok(()) => self.sprite_batch.end(),
                    Err(e) => {
                        self.sprite_batch.abort();
                        Err(e)
                    }
                }
            });

            let _ = trace_hr!(gfx.present());
            drawn
        }
    }
}

fn load_config(command_line: &CommandLine) -> Option<AppConfig> {
    match AppConfig::load_or_default(command_line.config_path.as_deref()) {
        Ok(mut config) => {
            // The framework title only survives when nothing overrides it.
            if config.title == AppConfig::default().title {
                config.title = TITLE.to_string();
            }
            Some(config)
        }
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}

#[cfg(windows)]
fn main() {
    init_logging(log::LevelFilter::Info);

    let command_line = build_command_line();
    let Some(config) = load_config(&command_line) else {
        std::process::exit(1);
    };

    match common::os::run::<app::TestApp>(&config, &command_line) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("failed to initialize: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(windows))]
fn main() {
    init_logging(log::LevelFilter::Info);

    let command_line = build_command_line();
    if let Some(config) = load_config(&command_line) {
        log::error!("\"{}\" needs Windows and Direct3D 11", config.title);
    }
    std::process::exit(1);
}
