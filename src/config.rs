//! Configuration loading from pet.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use pet_ui::{DisplayGeometry, WindowConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::behavior::{BehaviorState, Direction, DwellTimes, SheetLayout, Weights};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DESKTOP_PET_CONFIG";

/// Config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "pet.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window creation settings. `x`/`y` only place the window until the pet
    /// is moved to [`BehaviorConfig::start_position`], right after creation.
    pub window: WindowConfig,
    pub sprite: SpriteConfig,
    pub behavior: BehaviorConfig,
}

/// Sprite sheet configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// Path to the sprite sheet image
    pub path: PathBuf,
    /// Width and height of one frame in pixels
    pub frame_size: u32,
    /// Milliseconds each animation frame is shown
    pub speed_ms: u64,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cat.png"),
            frame_size: 32,
            speed_ms: 100,
        }
    }
}

impl SpriteConfig {
    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            frame_size: self.frame_size,
            speed_ms: self.speed_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Dwell-gated random transitions
    Random,
    /// Stay in the initial state forever
    Fixed,
}

/// Minimum dwell per state, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    pub sleep: f32,
    pub walk: f32,
    pub idle: f32,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            sleep: 20.0,
            walk: 5.0,
            idle: 5.0,
        }
    }
}

/// Behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub policy: PolicyKind,
    pub initial_state: BehaviorState,
    pub facing: Direction,
    /// State entered when pointer motion wakes a sleeping pet
    pub alert_state: BehaviorState,
    /// Distance between the pet's top edge and the bottom of the screen
    pub bottom_offset: u32,
    /// Pixels walked per tick
    pub walk_step: u32,
    pub dwell: DwellConfig,
    pub weights: Weights,
    /// Fixed RNG seed for reproducible behavior
    pub seed: Option<u64>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Random,
            initial_state: BehaviorState::Walk,
            facing: Direction::Right,
            alert_state: BehaviorState::Idle1,
            bottom_offset: 64,
            walk_step: 1,
            dwell: DwellConfig::default(),
            weights: Weights::default(),
            seed: None,
        }
    }
}

impl BehaviorConfig {
    /// Where the pet starts: centered horizontally, `bottom_offset` above
    /// the bottom of the screen.
    pub fn start_position(&self, display: DisplayGeometry) -> (i32, i32) {
        (
            (display.width / 2) as i32,
            display.height as i32 - self.bottom_offset as i32,
        )
    }

    pub fn dwell_times(&self) -> DwellTimes {
        DwellTimes {
            sleep: Duration::from_secs_f32(self.dwell.sleep),
            walk: Duration::from_secs_f32(self.dwell.walk),
            idle: Duration::from_secs_f32(self.dwell.idle),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `$DESKTOP_PET_CONFIG`, else pet.toml in the current
    /// directory, else built-in defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(path);
        }
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::load(DEFAULT_CONFIG_FILE);
        }
        log::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sprite.frame_size == 0 {
            return Err(ConfigError::Invalid("sprite.frame_size must be > 0".into()));
        }
        if self.sprite.frame_size > self.window.width || self.sprite.frame_size > self.window.height
        {
            return Err(ConfigError::Invalid(format!(
                "sprite.frame_size {} does not fit a {}x{} window",
                self.sprite.frame_size, self.window.width, self.window.height
            )));
        }
        if self.sprite.speed_ms == 0 {
            return Err(ConfigError::Invalid("sprite.speed_ms must be > 0".into()));
        }
        let dwell = &self.behavior.dwell;
        if [dwell.sleep, dwell.walk, dwell.idle]
            .iter()
            .any(|secs| !secs.is_finite() || *secs < 0.0)
        {
            return Err(ConfigError::Invalid(
                "behavior.dwell values must be non-negative seconds".into(),
            ));
        }
        if self.behavior.policy == PolicyKind::Random && self.behavior.weights.total() == 0 {
            return Err(ConfigError::Invalid(
                "behavior.weights must not all be zero".into(),
            ));
        }
        Ok(())
    }
}
