//! The 1.7+ wire format. Every packet is `VarInt length | VarInt id | payload`,
//! where the length covers the id and the payload.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::*;
use crate::{
    ConnectionState, HandshakePacket, LoginStart, PingPacket, ServerInfo, StatusResponse,
    TextComponent,
};

/// Largest frame body a client may declare (3-byte VarInt limit).
pub const MAX_FRAME_LEN: usize = 2_097_151;

// === Packet ID constants ===

// Serverbound
const HANDSHAKE: u32 = 0x00;
const STATUS_REQUEST: u32 = 0x00;
const PING_REQUEST: u32 = 0x01;
const LOGIN_START: u32 = 0x00;

// Clientbound
const STATUS_RESPONSE: u32 = 0x00;
const PONG_RESPONSE: u32 = 0x01;
const LOGIN_DISCONNECT: u32 = 0x00;

/// A decoded serverbound modern packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModernRequest {
    Handshake(HandshakePacket),
    StatusRequest,
    Ping(PingPacket),
    LoginStart(LoginStart),
}

/// Split one complete frame off the front of `buf`, returning its packet id and
/// body. Returns `Ok(None)` and leaves `buf` untouched while the frame is incomplete.
pub fn try_split_frame(buf: &mut BytesMut) -> CodecResult<Option<(u32, BytesMut)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let (length, header_len) = match decode_varint(buf) {
        Ok(decoded) => decoded,
        Err(CodecError::NotEnoughData) => return Ok(None),
        Err(e) => return Err(e),
    };
    let length = length as usize;
    if length == 0 {
        return Err(CodecError::MalformedPacket("frame has no packet id".into()));
    }
    if length > MAX_FRAME_LEN {
        return Err(CodecError::MalformedPacket(format!(
            "declared frame length {} exceeds {}",
            length, MAX_FRAME_LEN
        )));
    }
    if buf.len() - header_len < length {
        return Ok(None);
    }

    buf.advance(header_len);
    let mut body = buf.split_to(length);
    let packet_id = read_varint(&mut body).map_err(CodecError::within_frame)?;
    trace!("Read packet id=0x{:02X} len={}", packet_id, body.len());

    Ok(Some((packet_id, body)))
}

/// Decode a frame body according to the connection state.
pub fn decode_request(
    state: ConnectionState,
    id: u32,
    body: &mut BytesMut,
) -> CodecResult<ModernRequest> {
    let request = match (state, id) {
        (ConnectionState::Handshaking, HANDSHAKE) => {
            let handshake = decode_handshake(body)?;
            expect_consumed(body, "handshake")?;
            ModernRequest::Handshake(handshake)
        }
        (ConnectionState::Status, STATUS_REQUEST) => ModernRequest::StatusRequest,
        (ConnectionState::Status, PING_REQUEST) => {
            let ping = decode_ping(body)?;
            expect_consumed(body, "ping")?;
            ModernRequest::Ping(ping)
        }
        (ConnectionState::Login, LOGIN_START) => {
            // The client is turned away regardless of what it sent.
            let name = read_string(body, 16).ok();
            ModernRequest::LoginStart(LoginStart { name })
        }
        (state, id) => return Err(CodecError::UnknownPacketId { state, id }),
    };
    Ok(request)
}

pub fn decode_handshake<B: Buf>(buf: &mut B) -> CodecResult<HandshakePacket> {
    read_handshake(buf).map_err(CodecError::within_frame)
}

fn read_handshake<B: Buf>(buf: &mut B) -> CodecResult<HandshakePacket> {
    let protocol_version = read_varint(buf)?;
    let server_address = read_string(buf, 255)?;
    let server_port = read_u16(buf)?;
    let next_state = read_varint(buf)?;
    Ok(HandshakePacket {
        protocol_version,
        server_address,
        server_port,
        next_state,
    })
}

pub fn decode_ping<B: Buf>(buf: &mut B) -> CodecResult<PingPacket> {
    let high = read_u32(buf).map_err(CodecError::within_frame)?;
    let low = read_u32(buf).map_err(CodecError::within_frame)?;
    Ok(PingPacket { high, low })
}

fn expect_consumed(body: &BytesMut, packet: &str) -> CodecResult<()> {
    if body.has_remaining() {
        return Err(CodecError::MalformedPacket(format!(
            "{} trailing bytes after {} packet",
            body.remaining(),
            packet
        )));
    }
    Ok(())
}

// === Encode functions ===

/// Wrap a packet id and payload in a length-prefixed frame.
pub fn build_frame(packet_id: u32, payload: &[u8]) -> BytesMut {
    let body_len = varint_len(packet_id) + payload.len();
    let mut frame = BytesMut::with_capacity(varint_len(body_len as u32) + body_len);
    write_varint(&mut frame, body_len as u32);
    write_varint(&mut frame, packet_id);
    frame.extend_from_slice(payload);
    frame
}

fn json_frame<T: serde::Serialize>(packet_id: u32, body: &T) -> CodecResult<BytesMut> {
    let json = serde_json::to_string(body)?;
    let mut payload = BytesMut::with_capacity(varint_len(json.len() as u32) + json.len());
    write_string(&mut payload, &json);
    Ok(build_frame(packet_id, &payload))
}

pub fn encode_status_response(info: &ServerInfo) -> CodecResult<BytesMut> {
    json_frame(STATUS_RESPONSE, &StatusResponse::from_info(info))
}

pub fn encode_login_disconnect(message: &str) -> CodecResult<BytesMut> {
    json_frame(LOGIN_DISCONNECT, &TextComponent { text: message })
}

/// Pong echoes the ping payload byte for byte.
pub fn encode_pong(ping: &PingPacket) -> BytesMut {
    let mut payload = BytesMut::with_capacity(8);
    write_u32(&mut payload, ping.high);
    write_u32(&mut payload, ping.low);
    build_frame(PONG_RESPONSE, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn handshake_body(next_state: u32) -> BytesMut {
        let mut body = BytesMut::new();
        write_varint(&mut body, 47);
        write_string(&mut body, "localhost");
        write_u16(&mut body, 25565);
        write_varint(&mut body, next_state);
        body
    }

    #[test]
    fn test_build_frame_length_covers_id_and_payload() {
        let frame = build_frame(0x01, &[1, 2, 3]);
        assert_eq!(frame.to_vec(), vec![0x04, 0x01, 1, 2, 3]);
    }

    #[test]
    fn test_split_frame_waits_for_full_body() {
        let full = build_frame(0x00, &handshake_body(1));
        for cut in 0..full.len() {
            let mut buf = BytesMut::from(&full[..cut]);
            assert!(try_split_frame(&mut buf).unwrap().is_none());
            assert_eq!(buf.len(), cut, "incomplete frame must not be consumed");
        }

        let mut buf = BytesMut::from(&full[..]);
        buf.put_u8(0x01);
        let (id, body) = try_split_frame(&mut buf).unwrap().unwrap();
        assert_eq!(id, 0x00);
        assert_eq!(body, handshake_body(1));
        assert_eq!(buf.to_vec(), vec![0x01]);
    }

    #[test]
    fn test_split_frame_rejects_bad_lengths() {
        let mut empty = BytesMut::from(&[0x00, 0x00][..]);
        assert!(matches!(
            try_split_frame(&mut empty),
            Err(CodecError::MalformedPacket(_))
        ));

        let mut huge = BytesMut::new();
        write_varint(&mut huge, MAX_FRAME_LEN as u32 + 1);
        assert!(matches!(
            try_split_frame(&mut huge),
            Err(CodecError::MalformedPacket(_))
        ));

        let mut overlong = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(matches!(
            try_split_frame(&mut overlong),
            Err(CodecError::MalformedVarInt)
        ));
    }

    #[test]
    fn test_decode_handshake() {
        let mut body = handshake_body(2);
        let request = decode_request(ConnectionState::Handshaking, 0x00, &mut body).unwrap();
        assert_eq!(
            request,
            ModernRequest::Handshake(HandshakePacket {
                protocol_version: 47,
                server_address: "localhost".into(),
                server_port: 25565,
                next_state: 2,
            })
        );
    }

    #[test]
    fn test_handshake_with_lying_string_length_is_malformed() {
        let mut body = BytesMut::new();
        write_varint(&mut body, 47);
        write_varint(&mut body, 40);
        body.put_slice(b"short");
        assert!(matches!(
            decode_request(ConnectionState::Handshaking, 0x00, &mut body),
            Err(CodecError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_handshake_trailing_bytes_are_malformed() {
        let mut body = handshake_body(1);
        body.put_u8(0x00);
        assert!(matches!(
            decode_request(ConnectionState::Handshaking, 0x00, &mut body),
            Err(CodecError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_unhandled_state_and_id() {
        let mut body = BytesMut::new();
        assert!(matches!(
            decode_request(ConnectionState::Login, 0x01, &mut body),
            Err(CodecError::UnknownPacketId {
                state: ConnectionState::Login,
                id: 0x01
            })
        ));
        assert!(matches!(
            decode_request(ConnectionState::Handshaking, 0x01, &mut body),
            Err(CodecError::UnknownPacketId { .. })
        ));
    }

    #[test]
    fn test_pong_echoes_payload() {
        let mut body = BytesMut::from(&[0, 0, 0, 1, 0, 0, 0, 2][..]);
        let ping = match decode_request(ConnectionState::Status, 0x01, &mut body).unwrap() {
            ModernRequest::Ping(ping) => ping,
            other => panic!("expected ping, got {:?}", other),
        };
        let pong = encode_pong(&ping);
        assert_eq!(pong.to_vec(), vec![0x09, 0x01, 0, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn test_short_ping_is_malformed() {
        let mut body = BytesMut::from(&[0, 0, 0, 1][..]);
        assert!(matches!(
            decode_request(ConnectionState::Status, 0x01, &mut body),
            Err(CodecError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_login_disconnect_frame() {
        let frame = encode_login_disconnect("bye").unwrap();
        let json = br#"{"text":"bye"}"#;
        let mut expected = vec![(2 + json.len()) as u8, 0x00, json.len() as u8];
        expected.extend_from_slice(json);
        assert_eq!(frame.to_vec(), expected);
    }

    #[test]
    fn test_status_response_length_is_utf8_bytes() {
        let info = ServerInfo {
            protocol_version: 47,
            reported_version: "1.8.3".into(),
            motd: "§aCafé".into(),
            players: 3,
            max_players: 10,
            message: String::new(),
        };
        let mut frame = encode_status_response(&info).unwrap();
        let (id, mut body) = try_split_frame(&mut frame).unwrap().unwrap();
        assert_eq!(id, 0x00);
        let json = read_string(&mut body, 32767).unwrap();
        assert!(body.is_empty());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["description"]["text"], "§aCafé");
        assert_eq!(value["players"]["online"], 3);
    }
}
