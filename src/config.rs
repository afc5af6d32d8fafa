use std::collections::BTreeMap;

use anyhow::Context;
use config::{Config, ConfigError, Environment, File, FileFormat};
use motor_shield::{NumberingMode, Pin, StopMode};
use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pins: PinSettings,
    pub motors: MotorSettings,
    pub excavator: ExcavatorSettings,
    pub relay: RelaySettings,
}

/// Which pin port drives the shield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortKind {
    /// Log pin traffic only.
    #[default]
    DryRun,
    /// Raspberry Pi GPIO through rppal (needs the `rppal` feature).
    Rppal,
}

/// Wiring of the shield to the host header.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PinSettings {
    pub port: PortKind,
    pub numbering: NumberingMode,
    pub latch: Pin,
    pub clock: Pin,
    pub serial: Pin,
    pub motor1: Option<Pin>,
    pub motor2: Option<Pin>,
    pub motor3: Option<Pin>,
    pub motor4: Option<Pin>,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            port: PortKind::DryRun,
            numbering: NumberingMode::Bcm,
            latch: 21,
            clock: 20,
            serial: 16,
            motor1: Some(5),
            motor2: Some(6),
            motor3: Some(13),
            motor4: Some(19),
        }
    }
}

impl PinSettings {
    pub fn motor_pins(&self) -> [Option<Pin>; 4] {
        [self.motor1, self.motor2, self.motor3, self.motor4]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MotorSettings {
    pub stop_mode: StopMode,
    /// Keyed by motor identity ("1".."4"); TOML table keys are strings.
    pub pwm_frequency_hz: BTreeMap<String, u32>,
}

impl MotorSettings {
    /// Frequency overrides as `(identity, hz)` pairs.
    ///
    /// Identities outside 1..4 are passed through; the controller rejects them.
    pub fn pwm_frequencies(&self) -> anyhow::Result<Vec<(u8, u32)>> {
        self.pwm_frequency_hz
            .iter()
            .map(|(key, &hz)| {
                let id = key
                    .trim()
                    .parse::<u8>()
                    .with_context(|| format!("motors.pwm_frequency_hz key {key:?} is not a motor number"))?;
                Ok((id, hz))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExcavatorSettings {
    /// Duty cycle for every gesture; `None` drives the enable pins fully on.
    pub speed: Option<u8>,
    pub settle_ms: u64,
    pub max_run_secs: u64,
}

impl Default for ExcavatorSettings {
    fn default() -> Self {
        Self {
            speed: None,
            settle_ms: 1000,
            max_run_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 65432,
        }
    }
}

/// Load settings from `path`, then apply `EXCAVATOR__SECTION__KEY` overrides.
pub fn load_settings(path: &str) -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(
            Environment::with_prefix("EXCAVATOR")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<Settings>());

    match settings {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
fn parse_settings(toml: &str) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
