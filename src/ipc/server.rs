//! Unix domain socket server for IPC
//!
//! Maps requests onto beeper controls, answers status queries, and pushes
//! beeper events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::beeper::Control;
use crate::events::BeeperEvent;
use crate::sound::Volume;

use super::protocol::{read_message, write_message, BeeperStatus, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    control_tx: mpsc::Sender<Control>,
    event_tx: broadcast::Sender<BeeperEvent>,
}

/// Shared server state
struct ServerState {
    status: BeeperStatus,
    start_time: std::time::Instant,
}

/// What a client connection needs from the server
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    control_tx: mpsc::Sender<Control>,
    event_tx: broadcast::Sender<BeeperEvent>,
}

impl Server {
    /// Bind the socket and prepare to serve
    pub fn new(
        socket_path: &Path,
        initial: BeeperStatus,
        control_tx: mpsc::Sender<Control>,
        event_tx: broadcast::Sender<BeeperEvent>,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: initial,
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state,
            shutdown_tx,
            control_tx,
            event_tx,
        })
    }

    /// Fold a beeper event into the status served to clients
    pub async fn apply_event(&self, event: &BeeperEvent) {
        self.state.write().await.status.apply(event);
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let context = ClientContext {
            state: Arc::clone(&self.state),
            control_tx: self.control_tx.clone(),
            event_tx: self.event_tx.clone(),
        };

        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, context: ClientContext) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Reads are not cancel-safe, so they get their own task
        let (request_tx, mut request_rx) = mpsc::channel::<Request>(8);
        let read_task = tokio::spawn(async move {
            loop {
                match read_message::<_, Request>(&mut reader).await {
                    Ok(Some(request)) => {
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "bad request, disconnecting");
                        break;
                    }
                }
            }
        });

        let mut events: Option<broadcast::Receiver<BeeperEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else { break Ok(()) };
                    debug!(?request, "received request");

                    let (response, subscribe) = Self::process_request(request, &context).await;
                    if subscribe && events.is_none() {
                        events = Some(context.event_tx.subscribe());
                        debug!("client subscribed to notifications");
                    }

                    if let Err(e) = write_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event(&mut events) => match event {
                    Ok(event) => {
                        if let Err(e) = write_message(&mut writer, &Response::Notification { event }).await {
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = None;
                    }
                },
            }
        };

        read_task.abort();
        result
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, context: &ClientContext) -> (Response, bool) {
        let control = match request {
            Request::Ping => return (Response::Pong, false),

            Request::GetStatus => {
                let mut state = context.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                return (Response::Status(state.status.clone()), false);
            }

            Request::Subscribe => return (Response::Subscribed, true),

            Request::SetActive { active } => Control::SetActive(active),
            Request::ToggleActive => Control::ToggleActive,
            Request::SetVolume { volume } => match Volume::new(volume) {
                Ok(volume) => Control::SetVolume(volume),
                Err(e) => return (Response::error("invalid_volume", e.to_string()), false),
            },
            Request::TestSound => Control::TestSound,
            Request::Quit => Control::Quit,
        };

        match context.control_tx.send(control).await {
            Ok(()) => (Response::Ack, false),
            Err(_) => (
                Response::error("service_unavailable", "beeper is not running"),
                false,
            ),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; never resolves otherwise
async fn next_event(
    events: &mut Option<broadcast::Receiver<BeeperEvent>>,
) -> Result<BeeperEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        server: Arc<Server>,
        control_rx: mpsc::Receiver<Control>,
        event_tx: broadcast::Sender<BeeperEvent>,
        socket_path: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("beeper.sock");
        let (control_tx, control_rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(8);

        let server = Server::new(
            &socket_path,
            BeeperStatus::default(),
            control_tx,
            event_tx.clone(),
        )
        .unwrap();

        Fixture {
            server: Arc::new(server),
            control_rx,
            event_tx,
            socket_path,
            _dir: dir,
        }
    }

    fn serve(server: &Arc<Server>) {
        let server = Arc::clone(server);
        tokio::spawn(async move { server.run().await });
    }

    async fn call(stream: &mut UnixStream, request: &Request) -> Response {
        write_message(stream, request).await.unwrap();
        read_message(stream).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let f = fixture();
        serve(&f.server);
        f.server
            .apply_event(&BeeperEvent::Beeped { keys: vec![] })
            .await;

        let mut stream = UnixStream::connect(&f.socket_path).await.unwrap();
        assert!(matches!(call(&mut stream, &Request::Ping).await, Response::Pong));

        match call(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => {
                assert_eq!(status.beep_count, 1);
                assert!(status.active);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_controls_are_forwarded() {
        let mut f = fixture();
        serve(&f.server);

        let mut stream = UnixStream::connect(&f.socket_path).await.unwrap();
        let resp = call(&mut stream, &Request::SetVolume { volume: 0.5 }).await;
        assert!(matches!(resp, Response::Ack));
        assert_eq!(
            f.control_rx.recv().await,
            Some(Control::SetVolume(Volume::clamped(0.5)))
        );

        call(&mut stream, &Request::TestSound).await;
        assert_eq!(f.control_rx.recv().await, Some(Control::TestSound));
    }

    #[tokio::test]
    async fn test_invalid_volume_rejected() {
        let mut f = fixture();
        serve(&f.server);

        let mut stream = UnixStream::connect(&f.socket_path).await.unwrap();
        match call(&mut stream, &Request::SetVolume { volume: 2.0 }).await {
            Response::Error { code, .. } => assert_eq!(code, "invalid_volume"),
            other => panic!("unexpected response: {other:?}"),
        }
        assert!(f.control_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_service_gone() {
        let f = fixture();
        let Fixture {
            server,
            control_rx,
            socket_path,
            ..
        } = f;
        drop(control_rx);
        serve(&server);

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        match call(&mut stream, &Request::Quit).await {
            Response::Error { code, .. } => assert_eq!(code, "service_unavailable"),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscriber_gets_notifications() {
        let f = fixture();
        serve(&f.server);

        let mut stream = UnixStream::connect(&f.socket_path).await.unwrap();
        assert!(matches!(
            call(&mut stream, &Request::Subscribe).await,
            Response::Subscribed
        ));

        f.event_tx
            .send(BeeperEvent::ActiveChanged { active: false })
            .unwrap();

        let pushed: Response = read_message(&mut stream).await.unwrap().unwrap();
        match pushed {
            Response::Notification { event } => {
                assert_eq!(event, BeeperEvent::ActiveChanged { active: false })
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_removes_socket() {
        let f = fixture();
        assert!(f.socket_path.exists());
        f.server.shutdown().await;
        assert!(!f.socket_path.exists());
    }
}
