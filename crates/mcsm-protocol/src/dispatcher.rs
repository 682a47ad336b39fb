use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::legacy::{self, LegacyRequest};
use crate::modern::{self, ModernRequest};
use crate::{CodecError, CodecResult, Connection, ProtocolFamily, ServerInfo};

/// Something the socket owner must do, in order, after feeding a chunk.
#[derive(Debug)]
pub enum Action {
    /// Write these bytes to the socket.
    Send(BytesMut),
    /// Tell the hosting application.
    Notify(Notification),
    /// The exchange is over; shut the socket down.
    Close,
}

/// Per-connection events the hosting application hears about.
#[derive(Debug)]
pub enum Notification {
    /// A client tried to log in (it is about to be disconnected).
    ConnectionAccepted { username: String },
    /// A modern client asked for the server status.
    PingReceived,
    ProtocolError(CodecError),
}

enum Step {
    /// A packet was handled and more may follow in the buffer.
    Continue,
    /// The buffer does not hold a complete packet yet.
    NeedMore,
    /// A final response was produced.
    Finish,
}

/// Routes inbound bytes of one connection to the right codec and turns the
/// decoded requests into responses.
#[derive(Debug)]
pub struct Dispatcher {
    conn: Connection,
    closed: bool,
}

impl Dispatcher {
    pub fn new(family: ProtocolFamily) -> Self {
        Self {
            conn: Connection::new(family),
            closed: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed one chunk read from the socket. Every complete packet buffered so far
    /// is handled in arrival order; an incomplete tail waits for the next chunk.
    pub fn on_data(&mut self, chunk: &[u8], info: &ServerInfo) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.closed {
            return actions;
        }
        self.conn.read_buf.extend_from_slice(chunk);

        loop {
            let step = match self.conn.family() {
                ProtocolFamily::Legacy => self.step_legacy(info, &mut actions),
                ProtocolFamily::Modern => self.step_modern(info, &mut actions),
            };
            match step {
                Ok(Step::Continue) => continue,
                Ok(Step::NeedMore) => break,
                Ok(Step::Finish) => {
                    self.finish(&mut actions);
                    break;
                }
                Err(e) => {
                    warn!("Protocol error: {}", e);
                    actions.push(Action::Notify(Notification::ProtocolError(e)));
                    self.finish(&mut actions);
                    break;
                }
            }
        }
        actions
    }

    /// The socket closed; drop any state held for it.
    pub fn on_close(&mut self) {
        self.conn.reset();
        self.closed = true;
    }

    fn finish(&mut self, actions: &mut Vec<Action>) {
        actions.push(Action::Close);
        self.closed = true;
        self.conn.read_buf.clear();
    }

    fn step_legacy(&mut self, info: &ServerInfo, actions: &mut Vec<Action>) -> CodecResult<Step> {
        if self.conn.read_buf.is_empty() {
            return Ok(Step::NeedMore);
        }

        let buffered = self.conn.read_buf.len();
        let mut peek = &self.conn.read_buf[..];
        let request = match legacy::decode_request(&mut peek) {
            Ok(request) => request,
            Err(CodecError::NotEnoughData) => return Ok(Step::NeedMore),
            Err(e) => return Err(e),
        };
        let consumed = buffered - peek.len();
        self.conn.read_buf.advance(consumed);

        match request {
            LegacyRequest::Login(login) => {
                debug!("Login attempt: the client will be disconnected with a message");
                debug!(
                    "User {} (protocol v{}) attempts to login into {}",
                    login.username, login.protocol_version, login.server_name
                );
                actions.push(Action::Notify(Notification::ConnectionAccepted {
                    username: login.username,
                }));
                actions.push(Action::Send(legacy::encode_kick(&info.message)?));
            }
            LegacyRequest::ServerListPing => {
                actions.push(Action::Send(legacy::encode_status_response(info)?));
                debug!("Status ping response was sent to a client");
            }
        }
        Ok(Step::Finish)
    }

    fn step_modern(&mut self, info: &ServerInfo, actions: &mut Vec<Action>) -> CodecResult<Step> {
        let Some((id, mut body)) = modern::try_split_frame(&mut self.conn.read_buf)? else {
            return Ok(Step::NeedMore);
        };

        match modern::decode_request(self.conn.state(), id, &mut body)? {
            ModernRequest::Handshake(handshake) => {
                debug!(
                    "Handshake packet with protocol v{} directed to {}:{} with next state = {}",
                    handshake.protocol_version,
                    handshake.server_address,
                    handshake.server_port,
                    handshake.next_state
                );
                if let Err(e) = self.conn.apply_handshake(handshake.next_state) {
                    warn!("Protocol error: {}", e);
                    actions.push(Action::Notify(Notification::ProtocolError(e)));
                }
                Ok(Step::Continue)
            }
            ModernRequest::StatusRequest => {
                debug!("Request for server status packet received");
                actions.push(Action::Send(modern::encode_status_response(info)?));
                actions.push(Action::Notify(Notification::PingReceived));
                Ok(Step::Continue)
            }
            ModernRequest::Ping(ping) => {
                debug!("Server ping packet received (payload {})", ping.as_u64());
                actions.push(Action::Send(modern::encode_pong(&ping)));
                Ok(Step::Finish)
            }
            ModernRequest::LoginStart(login) => {
                let username = login.name.unwrap_or_default();
                debug!(
                    "Login attempt from {:?}: the client will be disconnected with a message",
                    username
                );
                actions.push(Action::Notify(Notification::ConnectionAccepted { username }));
                actions.push(Action::Send(modern::encode_login_disconnect(&info.message)?));
                Ok(Step::Finish)
            }
        }
    }
}
