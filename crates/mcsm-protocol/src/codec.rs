use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::ConnectionState;

/// A VarInt never takes more than this many bytes for a 32-bit value.
pub const MAX_VARINT_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("VarInt is longer than {MAX_VARINT_LEN} bytes")]
    MalformedVarInt,
    #[error("Not enough data")]
    NotEnoughData,
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
    #[error("Unknown packet id 0x{id:02X} in {state:?} state")]
    UnknownPacketId { state: ConnectionState, id: u32 },
    #[error("Unknown legacy packet id 0x{0:02X}")]
    UnknownLegacyPacketId(u8),
    #[error("Invalid handshake next state: {0}")]
    InvalidNextState(u32),
    #[error("String too long: {len} > {max}")]
    StringTooLong { len: usize, max: usize },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Inside a complete frame, running out of bytes means a field lied about its size.
    pub(crate) fn within_frame(self) -> Self {
        match self {
            CodecError::NotEnoughData => {
                CodecError::MalformedPacket("field extends past the end of the frame".into())
            }
            other => other,
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

// === VarInt ===

/// Decode a VarInt from the front of `bytes`, returning the value and the number
/// of bytes it occupied. Nothing is consumed.
pub fn decode_varint(bytes: &[u8]) -> CodecResult<(u32, usize)> {
    let mut result: u32 = 0;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(CodecError::MalformedVarInt)
    } else {
        Err(CodecError::NotEnoughData)
    }
}

/// Read a VarInt from the buffer.
pub fn read_varint<B: Buf>(buf: &mut B) -> CodecResult<u32> {
    let mut result: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(CodecError::NotEnoughData);
        }
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(CodecError::MalformedVarInt)
}

/// Write a VarInt to the buffer.
pub fn write_varint(buf: &mut BytesMut, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Encode a VarInt into a fresh buffer.
pub fn encode_varint(value: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(varint_len(value));
    write_varint(&mut buf, value);
    buf
}

/// Calculate the byte length of a VarInt.
pub fn varint_len(value: u32) -> usize {
    let mut val = value;
    let mut len = 0;
    loop {
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }
    len
}

// === Fixed-width integers (big endian) ===

pub fn read_u8<B: Buf>(buf: &mut B) -> CodecResult<u8> {
    if buf.remaining() < 1 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_u8())
}

pub fn read_u16<B: Buf>(buf: &mut B) -> CodecResult<u16> {
    if buf.remaining() < 2 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_u16())
}

pub fn read_u32<B: Buf>(buf: &mut B) -> CodecResult<u32> {
    if buf.remaining() < 4 {
        return Err(CodecError::NotEnoughData);
    }
    Ok(buf.get_u32())
}

pub fn write_u16(buf: &mut BytesMut, value: u16) {
    buf.put_u16(value);
}

pub fn write_u32(buf: &mut BytesMut, value: u32) {
    buf.put_u32(value);
}

// === Modern strings (VarInt byte length + UTF-8) ===

/// Read a protocol string (varint-prefixed UTF-8).
pub fn read_string<B: Buf>(buf: &mut B, max_len: usize) -> CodecResult<String> {
    let len = read_varint(buf)? as usize;
    if len > max_len * 4 {
        return Err(CodecError::StringTooLong { len, max: max_len });
    }
    if buf.remaining() < len {
        return Err(CodecError::NotEnoughData);
    }
    let bytes = buf.copy_to_bytes(len);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write a protocol string.
pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_varint(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

// === Legacy strings (u16 code-unit count + UTF-16BE) ===

/// Number of UTF-16 code units `s` occupies on the legacy wire.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Read a legacy string. The prefix counts UTF-16 code units, so the body is
/// twice as many bytes.
pub fn read_legacy_string<B: Buf>(buf: &mut B) -> CodecResult<String> {
    let units = read_u16(buf)? as usize;
    if buf.remaining() < units * 2 {
        return Err(CodecError::NotEnoughData);
    }
    let mut code_units = Vec::with_capacity(units);
    for _ in 0..units {
        code_units.push(buf.get_u16());
    }
    Ok(String::from_utf16_lossy(&code_units))
}

/// Write a legacy string: code-unit count, then the UTF-16BE body.
pub fn write_legacy_string(buf: &mut BytesMut, s: &str) -> CodecResult<()> {
    let units = utf16_len(s);
    if units > u16::MAX as usize {
        return Err(CodecError::StringTooLong {
            len: units,
            max: u16::MAX as usize,
        });
    }
    write_u16(buf, units as u16);
    write_utf16_units(buf, s);
    Ok(())
}

/// Write the UTF-16BE code units of `s` with no prefix.
pub fn write_utf16_units(buf: &mut BytesMut, s: &str) {
    for unit in s.encode_utf16() {
        buf.put_u16(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let test_cases = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (127, vec![0x7F]),
            (128, vec![0x80, 0x01]),
            (255, vec![0xFF, 0x01]),
            (25565, vec![0xDD, 0xC7, 0x01]),
            (2097151, vec![0xFF, 0xFF, 0x7F]),
            (2147483647, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x07]),
            (u32::MAX, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];

        for (value, expected_bytes) in test_cases {
            let encoded = encode_varint(value);
            assert_eq!(
                encoded.to_vec(),
                expected_bytes,
                "encode_varint({}) failed",
                value
            );
            assert_eq!(encoded.len(), varint_len(value));

            let (decoded, consumed) = decode_varint(&encoded).unwrap();
            assert_eq!(decoded, value, "decode_varint for {} failed", value);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn test_varint_overflow() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(
            decode_varint(&bytes),
            Err(CodecError::MalformedVarInt)
        ));
        assert!(matches!(
            decode_varint(&bytes[..5]),
            Err(CodecError::MalformedVarInt)
        ));
    }

    #[test]
    fn test_varint_truncated() {
        assert!(matches!(decode_varint(&[]), Err(CodecError::NotEnoughData)));
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(CodecError::NotEnoughData)
        ));
    }

    #[test]
    fn test_read_varint_advances() {
        let mut buf: &[u8] = &[0xDD, 0xC7, 0x01, 0x2A];
        assert_eq!(read_varint(&mut buf).unwrap(), 25565);
        assert_eq!(buf, &[0x2A]);
    }

    #[test]
    fn test_read_varint_across_segments() {
        let mut buf = (&[0xDD][..]).chain(&[0xC7, 0x01, 0x2A][..]);
        assert_eq!(read_varint(&mut buf).unwrap(), 25565);
        assert_eq!(buf.remaining(), 1);

        let mut buf = (&[0x80][..]).chain(&[0x80][..]);
        assert!(matches!(read_varint(&mut buf), Err(CodecError::NotEnoughData)));

        let mut buf: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(read_varint(&mut buf), Err(CodecError::MalformedVarInt)));
    }

    #[test]
    fn test_fixed_width_big_endian() {
        let mut buf = BytesMut::new();
        write_u16(&mut buf, 25565);
        write_u32(&mut buf, 0xDEADBEEF);
        assert_eq!(buf.to_vec(), vec![0x63, 0xDD, 0xDE, 0xAD, 0xBE, 0xEF]);

        let mut read: &[u8] = &buf;
        assert_eq!(read_u16(&mut read).unwrap(), 25565);
        assert_eq!(read_u32(&mut read).unwrap(), 0xDEADBEEF);
        assert!(matches!(read_u8(&mut read), Err(CodecError::NotEnoughData)));
    }

    #[test]
    fn test_string_roundtrip() {
        let test_str = "Hello, Minecraft!";
        let mut buf = BytesMut::new();
        write_string(&mut buf, test_str);
        assert_eq!(buf[0] as usize, test_str.len());
        let result = read_string(&mut buf, 32767).unwrap();
        assert_eq!(result, test_str);
    }

    #[test]
    fn test_string_prefix_counts_bytes() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "§a");
        assert_eq!(buf.to_vec(), vec![0x03, 0xC2, 0xA7, 0x61]);
    }

    #[test]
    fn test_string_too_long() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, &"a".repeat(300));
        assert!(matches!(
            read_string(&mut buf, 16),
            Err(CodecError::StringTooLong { len: 300, max: 16 })
        ));
    }

    #[test]
    fn test_legacy_string_counts_code_units() {
        let mut buf = BytesMut::new();
        write_legacy_string(&mut buf, "Steve").unwrap();
        assert_eq!(
            buf.to_vec(),
            vec![0x00, 0x05, 0x00, b'S', 0x00, b't', 0x00, b'e', 0x00, b'v', 0x00, b'e']
        );
        let mut read: &[u8] = &buf;
        assert_eq!(read_legacy_string(&mut read).unwrap(), "Steve");
        assert!(read.is_empty());
    }

    #[test]
    fn test_legacy_string_non_bmp() {
        let mut buf = BytesMut::new();
        write_legacy_string(&mut buf, "§\u{1F600}").unwrap();
        // one unit for the section sign, a surrogate pair for the emoji
        assert_eq!(&buf[..2], &[0x00, 0x03]);
        assert_eq!(buf.len(), 2 + 6);
        let mut read: &[u8] = &buf;
        assert_eq!(read_legacy_string(&mut read).unwrap(), "§\u{1F600}");
    }

    #[test]
    fn test_legacy_string_truncated_body() {
        let mut read: &[u8] = &[0x00, 0x03, 0x00, b'a'];
        assert!(matches!(
            read_legacy_string(&mut read),
            Err(CodecError::NotEnoughData)
        ));
    }
}
