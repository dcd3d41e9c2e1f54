use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{DEFAULT_MAZE_H, DEFAULT_MAZE_W, ENEMY_SPEED, PLAYER_SPEED};
use crate::director::{default_phases, Difficulty, GameMode, Phase};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub maze_width: usize,
    pub maze_height: usize,
    pub seed: Option<u64>,
    /// Reuse `seed` for every level instead of deriving a fresh one.
    pub daily_challenge: bool,
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub boss_level_interval: u32,
    pub player_speed: f32,
    pub enemy_speed: f32,
    pub phases: Vec<Phase>,
    pub repair_disconnected_mazes: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            maze_width: DEFAULT_MAZE_W,
            maze_height: DEFAULT_MAZE_H,
            seed: None,
            daily_challenge: false,
            mode: GameMode::default(),
            difficulty: Difficulty::default(),
            boss_level_interval: 5,
            player_speed: PLAYER_SPEED,
            enemy_speed: ENEMY_SPEED,
            phases: default_phases(),
            repair_disconnected_mazes: false,
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.player_speed.is_finite() && self.player_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "player_speed must be positive, got {}",
                self.player_speed
            )));
        }
        if !(self.enemy_speed.is_finite() && self.enemy_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "enemy_speed must be positive, got {}",
                self.enemy_speed
            )));
        }
        if self.daily_challenge && self.seed.is_none() {
            return Err(ConfigError::Invalid(
                "daily_challenge requires a seed".to_string(),
            ));
        }
        if let Some(bad) = self
            .phases
            .iter()
            .find(|p| p.secs.is_some_and(|s| !(s.is_finite() && s > 0.0)))
        {
            return Err(ConfigError::Invalid(format!(
                "phase durations must be positive, got {:?}",
                bad.secs
            )));
        }
        Ok(())
    }
}
