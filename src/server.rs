//! Mock server lifecycle.
//!
//! [`start`] validates the route settings, binds the listener and serves the
//! canned responses on a background task until the returned
//! [`ServerHandle`] is stopped. [`MockServer`] wraps a single handle behind
//! an `Idle -> Running -> Idle` state machine for callers that want one
//! shared instance.

use crate::error::Error;
use crate::response::{self, Body};
use crate::routes::RouteTable;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Port used when the caller has no preference.
pub const DEFAULT_PORT: u16 = 8080;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Validate `settings` and start serving them on `port`, all interfaces.
///
/// Returns once the listener is accepting connections. Port `0` picks a
/// free port; read it back with [`ServerHandle::addr`].
pub async fn start(settings: &[Value], port: u16) -> Result<ServerHandle, Error> {
    let routes = RouteTable::from_values(settings)?;
    ServerHandle::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), routes).await
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A running mock listener.
///
/// Stop it with [`ServerHandle::stop`]; dropping a running handle aborts
/// the background task without waiting for it.
pub struct ServerHandle {
    addr: SocketAddr,
    routes: Arc<RouteTable>,
    running: Mutex<Option<Running>>,
}

impl ServerHandle {
    /// Bind `addr` and serve `routes` until stopped.
    pub async fn bind(addr: SocketAddr, routes: RouteTable) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::PortBind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| Error::PortBind { addr, source })?;

        let routes = Arc::new(routes);
        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(serve(listener, Arc::clone(&routes), signal));

        info!(addr = %addr, routes = routes.len(), "Mock server listening");

        Ok(Self {
            addr,
            routes,
            running: Mutex::new(Some(Running { shutdown, task })),
        })
    }

    /// Address the listener is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL for `path` on this server, reachable from the local host.
    pub fn url(&self, path: &str) -> String {
        let ip = match self.addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        let separator = if path.starts_with('/') { "" } else { "/" };
        format!(
            "http://{}{}{}",
            SocketAddr::new(ip, self.addr.port()),
            separator,
            path
        )
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Close the listener and every open connection.
    ///
    /// The port is free once this returns. Stopping twice is a no-op.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!(addr = %self.addr, "Mock server not running");
            return;
        };

        // The receiver is gone only if the task already ended
        let _ = running.shutdown.send(());
        if let Err(err) = running.task.await {
            warn!(addr = %self.addr, error = %err, "Mock server task failed");
        }

        info!(addr = %self.addr, "Mock server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.task.abort();
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("addr", &self.addr)
            .field("routes", &self.routes.len())
            .finish()
    }
}

async fn serve(
    listener: TcpListener,
    routes: Arc<RouteTable>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, Arc::clone(&routes)));
                }
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    connections.shutdown().await;
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, routes: Arc<RouteTable>) {
    let service = service_fn(move |request: Request<Incoming>| {
        let response = dispatch(&routes, &request);
        async move { Ok::<_, Infallible>(response) }
    });

    if let Err(err) = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(peer = %peer, error = %err, "Connection closed with error");
    }
}

/// Answer a request from the route table. Method, query and body are ignored.
fn dispatch<B>(routes: &RouteTable, request: &Request<B>) -> Response<Body> {
    let path = request.uri().path();

    match routes.lookup(path) {
        Some(route) => {
            debug!(
                method = %request.method(),
                path = %path,
                status = route.status().as_u16(),
                "Serving route"
            );
            response::respond(route)
        }
        None => {
            debug!(method = %request.method(), path = %path, "No route configured");
            response::not_found(path)
        }
    }
}

/// Single shared mock server with an explicit `Idle`/`Running` state.
///
/// Starting while running is rejected with [`Error::AlreadyRunning`];
/// stopping while idle does nothing.
#[derive(Debug, Default)]
pub struct MockServer {
    active: Mutex<Option<ServerHandle>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start serving `settings` on `port`. Returns the bound address.
    pub async fn start(&self, settings: &[Value], port: u16) -> Result<SocketAddr, Error> {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_ref() {
            return Err(Error::AlreadyRunning {
                addr: handle.addr(),
            });
        }

        let handle = start(settings, port).await?;
        let addr = handle.addr();
        *active = Some(handle);
        Ok(addr)
    }

    pub async fn stop(&self) {
        match self.active.lock().await.take() {
            Some(handle) => handle.stop().await,
            None => debug!("Mock server not running"),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Address of the running listener, if any.
    pub async fn addr(&self) -> Option<SocketAddr> {
        self.active.lock().await.as_ref().map(ServerHandle::addr)
    }
}
