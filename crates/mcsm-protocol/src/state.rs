/// The state of a modern protocol connection.
///
/// `Handshaking` is the unset state every connection starts in. A handshake moves
/// it to `Status` or `Login`, and nothing moves it any further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Handshaking,
    Status,
    Login,
}

impl ConnectionState {
    pub fn from_handshake_next(next: u32) -> Option<Self> {
        match next {
            1 => Some(ConnectionState::Status),
            2 => Some(ConnectionState::Login),
            _ => None,
        }
    }
}

/// Which of the two wire formats a connection speaks. Chosen once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFamily {
    /// Single-byte packet ids, no length prefix (clients up to 1.6).
    Legacy,
    /// VarInt length-prefixed frames (clients from 1.7 on).
    Modern,
}

impl ProtocolFamily {
    /// Pick the family from a version string such as `1.8.3`: a minor component of
    /// 6 or below is legacy. Returns `None` when there is no numeric minor component.
    pub fn from_reported_version(version: &str) -> Option<Self> {
        let minor: u32 = version.split('.').nth(1)?.trim().parse().ok()?;
        if minor <= 6 {
            Some(ProtocolFamily::Legacy)
        } else {
            Some(ProtocolFamily::Modern)
        }
    }
}
