//! The pre-1.7 wire format: a single id byte followed by the packet fields, with
//! no length prefix anywhere.

use bytes::{Buf, BufMut, BytesMut};

use crate::codec::*;
use crate::{LegacyLoginRequest, ServerInfo};

pub const LOGIN_REQUEST: u8 = 0x02;
pub const SERVER_LIST_PING: u8 = 0xFE;
pub const KICK: u8 = 0xFF;

/// Leads the kick string of a server list response (`§1` then NUL).
pub const STATUS_MARKER: &str = "\u{00A7}1\u{0000}";

/// A decoded serverbound legacy packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyRequest {
    ServerListPing,
    Login(LegacyLoginRequest),
}

/// Decode the packet at the front of `buf`. Returns `NotEnoughData` while the
/// packet is still incomplete.
pub fn decode_request<B: Buf>(buf: &mut B) -> CodecResult<LegacyRequest> {
    match read_u8(buf)? {
        LOGIN_REQUEST => Ok(LegacyRequest::Login(decode_login_request(buf)?)),
        // 1.4+ clients follow with 0x01 and 1.6 with a plugin message; neither changes the answer.
        SERVER_LIST_PING => {
            buf.advance(buf.remaining());
            Ok(LegacyRequest::ServerListPing)
        }
        id => Err(CodecError::UnknownLegacyPacketId(id)),
    }
}

/// Decode the body of a login request (the id byte already consumed).
pub fn decode_login_request<B: Buf>(buf: &mut B) -> CodecResult<LegacyLoginRequest> {
    let protocol_version = read_u8(buf)?;
    let username = read_legacy_string(buf)?;
    let server_name = read_legacy_string(buf)?;
    Ok(LegacyLoginRequest {
        protocol_version,
        username,
        server_name,
    })
}

/// Kick packet carrying `message`, sent in response to a login request.
pub fn encode_kick(message: &str) -> CodecResult<BytesMut> {
    let mut buf = BytesMut::with_capacity(3 + utf16_len(message) * 2);
    buf.put_u8(KICK);
    write_legacy_string(&mut buf, message)?;
    Ok(buf)
}

/// The string a server list response carries: the marker, then each field
/// followed by a NUL code unit.
pub fn status_string(info: &ServerInfo) -> String {
    format!(
        "{}{}\0{}\0{}\0{}\0{}\0",
        STATUS_MARKER,
        info.protocol_version, info.reported_version, info.motd, info.players, info.max_players
    )
}

/// Server list response. Travels as a kick packet; the client reads the fields
/// out of the message and never shows it.
pub fn encode_status_response(info: &ServerInfo) -> CodecResult<BytesMut> {
    encode_kick(&status_string(info))
}
