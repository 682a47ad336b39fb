use bytes::BytesMut;
use tracing::debug;

use crate::{CodecError, CodecResult, ConnectionState, ProtocolFamily};

/// Per-connection protocol record, owned by whichever task handles the socket.
#[derive(Debug)]
pub struct Connection {
    family: ProtocolFamily,
    state: ConnectionState,
    /// Bytes received but not yet forming a complete packet.
    pub(crate) read_buf: BytesMut,
}

impl Connection {
    pub fn new(family: ProtocolFamily) -> Self {
        Self {
            family,
            state: ConnectionState::Handshaking,
            read_buf: BytesMut::with_capacity(512),
        }
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply a handshake's next-state. Only legal from `Handshaking`; an unknown
    /// value leaves the state unset.
    pub fn apply_handshake(&mut self, next_state: u32) -> CodecResult<ConnectionState> {
        if self.state != ConnectionState::Handshaking {
            return Err(CodecError::UnknownPacketId {
                state: self.state,
                id: 0x00,
            });
        }
        let next = ConnectionState::from_handshake_next(next_state)
            .ok_or(CodecError::InvalidNextState(next_state))?;
        debug!("Connection state {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Forget everything learned on this socket. Called when it closes.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Handshaking;
        self.read_buf.clear();
    }
}
