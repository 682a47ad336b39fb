use serde::Serialize;

use crate::ProtocolFamily;

/// Everything the responder says about itself. Read-only input to every encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub protocol_version: i32,
    pub reported_version: String,
    pub motd: String,
    pub players: u32,
    pub max_players: u32,
    /// Shown to clients that try to log in.
    pub message: String,
}

impl ServerInfo {
    /// The wire format a newly accepted connection should speak. Versions without a
    /// numeric minor component are rejected by config validation; here they fall
    /// back to modern.
    pub fn family(&self) -> ProtocolFamily {
        ProtocolFamily::from_reported_version(&self.reported_version)
            .unwrap_or(ProtocolFamily::Modern)
    }
}

// === Serverbound (transient, decoded then dropped) ===

/// First packet of every modern connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    pub protocol_version: u32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: u32,
}

/// Modern login start. Only the username is read, later protocol versions append
/// fields after it. `None` when the username could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub name: Option<String>,
}

/// Legacy (0x02) login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyLoginRequest {
    pub protocol_version: u8,
    pub username: String,
    pub server_name: String,
}

/// Opaque 64-bit ping payload, kept as the two halves it arrives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPacket {
    pub high: u32,
    pub low: u32,
}

impl PingPacket {
    pub fn as_u64(&self) -> u64 {
        ((self.high as u64) << 32) | self.low as u64
    }
}

// === Status JSON ===

/// A plain chat component, `{"text": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct TextComponent<'a> {
    pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusVersion<'a> {
    pub name: &'a str,
    pub protocol: i32,
}

/// Body of the modern status response. Field order is the wire order.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse<'a> {
    pub description: TextComponent<'a>,
    pub players: StatusPlayers,
    pub version: StatusVersion<'a>,
}

impl<'a> StatusResponse<'a> {
    pub fn from_info(info: &'a ServerInfo) -> Self {
        Self {
            description: TextComponent { text: &info.motd },
            players: StatusPlayers {
                max: info.max_players,
                online: info.players,
            },
            version: StatusVersion {
                name: &info.reported_version,
                protocol: info.protocol_version,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ServerInfo {
        ServerInfo {
            protocol_version: 47,
            reported_version: "1.8.3".into(),
            motd: "WIP".into(),
            players: 0,
            max_players: 10,
            message: "bye".into(),
        }
    }

    #[test]
    fn test_status_json_field_order() {
        let info = info();
        let json = serde_json::to_string(&StatusResponse::from_info(&info)).unwrap();
        assert_eq!(
            json,
            r#"{"description":{"text":"WIP"},"players":{"max":10,"online":0},"version":{"name":"1.8.3","protocol":47}}"#
        );
    }

    #[test]
    fn test_family_follows_reported_version() {
        let mut info = info();
        assert_eq!(info.family(), ProtocolFamily::Modern);
        info.reported_version = "1.5.2".into();
        assert_eq!(info.family(), ProtocolFamily::Legacy);
    }

    #[test]
    fn test_ping_as_u64() {
        let ping = PingPacket { high: 1, low: 2 };
        assert_eq!(ping.as_u64(), 0x0000_0001_0000_0002);
    }
}
