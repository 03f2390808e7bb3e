//! TCP server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::frame::{read_frame, write_frame, Frame};
use digitool_core::{Config, ErrorKind, Request, Response, Store};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Per-connection settings shared by all connection tasks.
#[derive(Debug, Clone)]
struct ConnectionContext {
    store: Arc<Store>,
    request_timeout: Duration,
    max_request_bytes: usize,
}

/// The DigitoolDB server.
///
/// Accepts TCP connections and answers newline-delimited JSON requests.
/// Each connection runs in its own task; core calls run on blocking
/// threads so that slow disks never stall the accept loop.
///
/// # Example
///
/// ```rust,ignore
/// use digitool_server::{Server, ServerConfig};
///
/// let server = Server::open(ServerConfig::default())?;
/// server.run(tokio::signal::ctrl_c().map(|_| ())).await?;
/// ```
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    context: ConnectionContext,
}

impl Server {
    /// Creates a server over an open store.
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        let context = ConnectionContext {
            store,
            request_timeout: config.request_timeout(),
            max_request_bytes: config.max_request_bytes,
        };
        Self { config, context }
    }

    /// Opens the configured data directory and creates a server over it.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store cannot be opened,
    /// for instance because another process holds its lock.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store_config = Config::default().sync_writes(config.sync_writes);
        let store = Store::open_with_config(&config.data_dir, store_config)?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// Returns the store served by this server.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.context.store
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` completes.
    ///
    /// Once `shutdown` fires no new connections are accepted. Connections
    /// already open keep being served until their peers disconnect.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        info!(
            addr = %local_addr,
            data_dir = %self.config.data_dir.display(),
            max_connections = self.config.max_connections,
            "server listening"
        );

        tokio::pin!(shutdown);
        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&permits).acquire_owned() => {
                    permit.map_err(|e| ServerError::Internal(e.to_string()))?
                }
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        continue;
                    }
                },
            };

            let context = self.context.clone();
            tokio::spawn(async move {
                debug!(%peer, "connection opened");
                if let Err(err) = handle_connection(stream, peer, &context).await {
                    debug!(%peer, error = %err, "connection failed");
                }
                debug!(%peer, "connection closed");
                drop(permit);
            });
        }

        info!(addr = %local_addr, "server stopped");
        Ok(())
    }
}

/// Answers requests on one connection until the peer closes it.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: &ConnectionContext,
) -> ServerResult<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut buf = Vec::new();

    loop {
        let response = match read_frame(&mut reader, context.max_request_bytes, &mut buf).await? {
            Frame::Eof => return Ok(()),
            Frame::TooLarge(size) => {
                let err = ServerError::RequestTooLarge {
                    size,
                    limit: context.max_request_bytes,
                };
                warn!(%peer, error = %err, "rejected request");
                Response::from(err)
            }
            Frame::Line if buf.iter().all(u8::is_ascii_whitespace) => continue,
            Frame::Line => match Request::from_slice(&buf) {
                Ok(request) => execute(context, request).await,
                Err(err) => {
                    debug!(%peer, error = %err, "malformed request");
                    Response::from(&err)
                }
            },
        };
        write_frame(&mut write, &response).await?;
    }
}

/// Runs one request on a blocking thread, bounded by the request timeout.
///
/// A timed-out request keeps running to completion; only its reply is
/// abandoned.
async fn execute(context: &ConnectionContext, request: Request) -> Response {
    let operation = request.operation();
    let store = Arc::clone(&context.store);
    let task = tokio::task::spawn_blocking(move || store.handle(request));

    match tokio::time::timeout(context.request_timeout, task).await {
        Ok(Ok(response)) => {
            debug!(operation, success = response.success, "handled request");
            response
        }
        Ok(Err(err)) => {
            warn!(operation, error = %err, "request task failed");
            Response::error(ErrorKind::StorageFault, format!("request failed: {err}"))
        }
        Err(_) => {
            let err = ServerError::Timeout(context.request_timeout);
            warn!(operation, error = %err, "request timed out");
            Response::from(err)
        }
    }
}

impl From<ServerError> for Response {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Core(err) => Response::from(&err),
            other if other.is_client_error() => {
                Response::error(ErrorKind::Validation, other.to_string())
            }
            other => Response::error(ErrorKind::StorageFault, other.to_string()),
        }
    }
}
