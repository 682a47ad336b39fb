use mcsm_protocol::codec::utf16_len;
use mcsm_protocol::{legacy, ProtocolFamily, ServerInfo};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Names accepted by [`ServerConfig::get_option`] and [`ServerConfig::set_option`].
pub const OPTION_NAMES: &[&str] = &[
    "bind",
    "port",
    "message",
    "motd",
    "players",
    "max_players",
    "protocol_version",
    "reported_version",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reported_version '{0}' has no numeric minor component")]
    InvalidReportedVersion(String),
    #[error("protocol_version must not be negative (got {0})")]
    NegativeProtocolVersion(i32),
    #[error("{field} is {units} UTF-16 code units long, the legacy protocol allows {max}")]
    TooLong {
        field: &'static str,
        units: usize,
        max: usize,
    },
    #[error("invalid value '{value}' for option {option}: {reason}")]
    InvalidValue {
        option: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind", alias = "host")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Disconnect message shown to clients that try to log in.
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_motd")]
    pub motd: String,
    #[serde(default)]
    pub players: u32,
    #[serde(default = "default_max_players", alias = "maxPlayers")]
    pub max_players: u32,
    #[serde(default = "default_protocol_version", alias = "protocolVersion")]
    pub protocol_version: i32,
    #[serde(default = "default_reported_version", alias = "reportedVersion")]
    pub reported_version: String,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    25565
}

fn default_message() -> String {
    "GRAB A COFFEE, WORK IN PROGRESS".into()
}

fn default_motd() -> String {
    "WORK IN PROGRESS".into()
}

fn default_max_players() -> u32 {
    10
}

fn default_protocol_version() -> i32 {
    47
}

fn default_reported_version() -> String {
    "1.8.3".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            message: default_message(),
            motd: default_motd(),
            players: 0,
            max_players: default_max_players(),
            protocol_version: default_protocol_version(),
            reported_version: default_reported_version(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<ServerConfig>(&contents)?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check everything the encoders rely on, so they never see a value they
    /// cannot put on the wire.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if ProtocolFamily::from_reported_version(&self.reported_version).is_none() {
            return Err(ConfigError::InvalidReportedVersion(
                self.reported_version.clone(),
            ));
        }
        if self.protocol_version < 0 {
            return Err(ConfigError::NegativeProtocolVersion(self.protocol_version));
        }

        let max = u16::MAX as usize;
        let status = legacy::status_string(&self.server_info());
        for (field, value) in [("message", self.message.as_str()), ("status", status.as_str())] {
            let units = utf16_len(value);
            if units > max {
                return Err(ConfigError::TooLong { field, units, max });
            }
        }
        Ok(())
    }

    pub fn family(&self) -> ProtocolFamily {
        self.server_info().family()
    }

    /// Snapshot of the fields the encoders read.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: self.protocol_version,
            reported_version: self.reported_version.clone(),
            motd: self.motd.clone(),
            players: self.players,
            max_players: self.max_players,
            message: self.message.clone(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Current value of an option, `None` for an unknown name.
    pub fn get_option(&self, name: &str) -> Option<String> {
        let value = match canonical_name(name)? {
            "bind" => self.bind.clone(),
            "port" => self.port.to_string(),
            "message" => self.message.clone(),
            "motd" => self.motd.clone(),
            "players" => self.players.to_string(),
            "max_players" => self.max_players.to_string(),
            "protocol_version" => self.protocol_version.to_string(),
            "reported_version" => self.reported_version.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Set an option from its string form. Returns `Ok(false)` for an unknown name;
    /// on error the config is left unchanged.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<bool, ConfigError> {
        let Some(name) = canonical_name(name) else {
            return Ok(false);
        };

        let mut updated = self.clone();
        match name {
            "bind" => updated.bind = value.to_string(),
            "port" => updated.port = parse_option(name, value)?,
            "message" => updated.message = value.to_string(),
            "motd" => updated.motd = value.to_string(),
            "players" => updated.players = parse_option(name, value)?,
            "max_players" => updated.max_players = parse_option(name, value)?,
            "protocol_version" => updated.protocol_version = parse_option(name, value)?,
            "reported_version" => updated.reported_version = value.to_string(),
            _ => return Ok(false),
        }
        updated.validate()?;
        *self = updated;
        Ok(true)
    }
}

/// Map the camelCase spellings onto the config keys.
fn canonical_name(name: &str) -> Option<&'static str> {
    let name = match name {
        "host" => "bind",
        "maxPlayers" => "max_players",
        "protocolVersion" => "protocol_version",
        "reportedVersion" => "reported_version",
        other => other,
    };
    OPTION_NAMES.iter().copied().find(|&known| known == name)
}

fn parse_option<T>(option: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            option: option.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
