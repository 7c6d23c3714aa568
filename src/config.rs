//! Runtime configuration, loaded from TOML.
//!
//! Every field has a default, so an empty or missing file gives a runnable
//! setup with no hardware attached.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use shakmaty::Color;
use thiserror::Error;

use crate::hardware::ActuatorTimings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which color the human plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub human_color: Side,
    pub engine: EngineConfig,
    pub ponder: PonderConfig,
    pub actuator: ActuatorConfig,
    pub clock: ClockConfig,
    pub vision: VisionConfig,
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub depth: u8,
    pub skill_level: u8,
    pub search_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/games/stockfish"),
            depth: 10,
            skill_level: 20,
            search_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PonderConfig {
    pub enabled: bool,
    pub join_timeout_ms: u64,
}

impl Default for PonderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            join_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActuatorConfig {
    /// Serial device of the arm controller; unset means dry run.
    pub port: Option<String>,
    pub baud: u32,
    pub ack_timeout_ms: u64,
    pub home_timeout_ms: u64,
    pub inter_command_delay_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            ack_timeout_ms: 30_000,
            home_timeout_ms: 10_000,
            inter_command_delay_ms: 300,
        }
    }
}

impl ActuatorConfig {
    pub fn timings(&self) -> ActuatorTimings {
        ActuatorTimings {
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            home_timeout: Duration::from_millis(self.home_timeout_ms),
            inter_command_delay: Duration::from_millis(self.inter_command_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Serial device of the clock; unset means no clock.
    pub port: Option<String>,
    pub baud: u32,
    pub initial_seconds: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            initial_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisionConfig {
    /// File the external classifier keeps overwriting with its latest grid.
    pub grid_path: PathBuf,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            grid_path: PathBuf::from("board.grid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    pub detection_attempts: u32,
    pub retry_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub max_changed_squares: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            detection_attempts: 3,
            retry_delay_ms: 1000,
            poll_interval_ms: 50,
            max_changed_squares: 4,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Drop all hardware ports.
    pub fn without_hardware(mut self) -> Self {
        self.actuator.port = None;
        self.clock.port = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").expect("empty config");
        assert_eq!(config, Config::default());
        assert_eq!(config.human_color, Side::White);
        assert_eq!(config.engine.depth, 10);
        assert_eq!(config.controller.detection_attempts, 3);
        assert_eq!(config.actuator.timings(), ActuatorTimings::default());
        assert_eq!(config.actuator.port, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            human_color = "black"

            [engine]
            depth = 14

            [actuator]
            port = "/dev/ttyUSB1"
            inter_command_delay_ms = 0

            [clock]
            port = "/dev/ttyUSB0"
            "#,
        )
        .expect("valid config");

        assert_eq!(Color::from(config.human_color), Color::Black);
        assert_eq!(config.engine.depth, 14);
        assert_eq!(config.engine.skill_level, 20);
        assert_eq!(config.actuator.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.actuator.baud, 9600);
        assert!(config.actuator.timings().inter_command_delay.is_zero());
        assert_eq!(config.clock.initial_seconds, 600);

        let dry = config.without_hardware();
        assert_eq!(dry.actuator.port, None);
        assert_eq!(dry.clock.port, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("[engine]\ndepht = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn bad_color_is_rejected() {
        assert!(Config::from_toml("human_color = \"green\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config =
            Config::load(Path::new("/nonexistent/chessbot.toml")).expect("defaults");
        assert_eq!(config, Config::default());
    }
}
