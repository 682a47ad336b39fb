use crate::config::ServerConfig;
use mcsm_events::{EventBus, ServerEvent};
use mcsm_protocol::{Action, Dispatcher, Notification, ProtocolFamily};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, trace};

/// How long a finished connection keeps reading, waiting for the client to hang
/// up, before it is dropped.
const LINGER: Duration = Duration::from_secs(5);

/// Accept connections until `shutdown` flips. Each socket gets its own task.
pub async fn accept_loop(
    listener: TcpListener,
    config: watch::Receiver<ServerConfig>,
    events: Arc<EventBus>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Shutting down the listener...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, peer)) => {
                    debug!("Inbound connection from {}", peer);
                    if let Err(e) = socket.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
                    }
                    // The wire format is fixed for the lifetime of the connection.
                    let family = config.borrow().family();
                    let config = config.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, peer, family, config, events).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    events.emit(&ServerEvent::Error {
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Drive one client connection: every read is handed to the dispatcher with the
/// current server info, and the resulting actions are carried out in order.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    family: ProtocolFamily,
    config: watch::Receiver<ServerConfig>,
    events: Arc<EventBus>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut dispatcher = Dispatcher::new(family);
    let mut buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Error while communicating with {}: {}", peer, e);
                events.emit(&ServerEvent::TransportError {
                    peer,
                    error: e.to_string(),
                });
                break;
            }
        };
        trace!("Read {} bytes from {}", n, peer);

        let info = config.borrow().server_info();
        let actions = dispatcher.on_data(&buf[..n], &info);
        if !perform(&mut stream, peer, actions, &events).await {
            break;
        }
    }

    dispatcher.on_close();
    debug!("Client connection {} closed", peer);
}

/// Carry out dispatcher actions. Returns false once the connection is done.
async fn perform<S>(
    stream: &mut S,
    peer: SocketAddr,
    actions: Vec<Action>,
    events: &EventBus,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for action in actions {
        match action {
            Action::Send(bytes) => {
                if let Err(e) = stream.write_all(&bytes).await {
                    debug!("Write to {} failed: {}", peer, e);
                    events.emit(&ServerEvent::TransportError {
                        peer,
                        error: e.to_string(),
                    });
                    return false;
                }
            }
            Action::Notify(notification) => events.emit(&to_event(peer, notification)),
            Action::Close => {
                close_gracefully(stream, peer).await;
                return false;
            }
        }
    }
    true
}

async fn close_gracefully<S>(stream: &mut S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = stream.shutdown().await {
        debug!("Shutdown of {} failed: {}", peer, e);
        return;
    }
    let mut sink = [0u8; 512];
    let drain = async {
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    };
    if tokio::time::timeout(LINGER, drain).await.is_err() {
        debug!("{} did not hang up within {:?}", peer, LINGER);
    }
}

fn to_event(peer: SocketAddr, notification: Notification) -> ServerEvent {
    match notification {
        Notification::ConnectionAccepted { username } => {
            ServerEvent::ClientConnected { peer, username }
        }
        Notification::PingReceived => ServerEvent::ClientPing { peer },
        Notification::ProtocolError(e) => ServerEvent::ClientError {
            peer,
            error: e.to_string(),
        },
    }
}
