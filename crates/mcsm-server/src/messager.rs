use crate::config::{ConfigError, ServerConfig};
use crate::network;
use mcsm_events::{EventBus, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// The fake server: owns the options, the event bus and, while started, the listener.
pub struct Messager {
    config: watch::Sender<ServerConfig>,
    events: Arc<EventBus>,
    running: Option<Running>,
}

impl Messager {
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (config, _) = watch::channel(config);
        Ok(Self {
            config,
            events: Arc::new(EventBus::new()),
            running: None,
        })
    }

    /// Bus to register listeners on. Listeners may be added at any time.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> ServerConfig {
        self.config.borrow().clone()
    }

    pub fn get_option(&self, name: &str) -> Option<String> {
        self.config.borrow().get_option(name)
    }

    /// Change an option. Live connections pick the new value up on their next
    /// read; bind and port only take effect on the next start.
    pub fn set_option(&self, name: &str, value: &str) -> Result<bool, ConfigError> {
        let mut result = Ok(false);
        self.config.send_if_modified(|config| {
            result = config.set_option(name, value);
            matches!(result, Ok(true))
        });
        if let Ok(true) = result {
            debug!("{} option was set to {}", name, value);
        }
        result
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Bind the listener and start accepting. Returns `Ok(false)` if already running.
    pub async fn start(&mut self) -> anyhow::Result<bool> {
        if self.running.is_some() {
            warn!("Messager is already running!");
            return Ok(false);
        }

        let addr = self.config.borrow().addr();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind {}: {}", addr, e);
                self.events.emit(&ServerEvent::Error {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };
        let local_addr = listener.local_addr()?;
        info!("Messager started @ {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(network::accept_loop(
            listener,
            self.config.subscribe(),
            self.events.clone(),
            shutdown_rx,
        ));
        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            accept_task,
        });

        self.events.emit(&ServerEvent::Listen { addr: local_addr });
        Ok(true)
    }

    /// Stop accepting connections. Connections already accepted finish their
    /// exchange. Returns false if not running.
    pub async fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            warn!("Messager is already stopped");
            return false;
        };

        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.accept_task.await {
            error!("Accept loop ended abnormally: {}", e);
        }
        info!("Messager has been stopped");
        self.events.emit(&ServerEvent::Close);
        true
    }
}
