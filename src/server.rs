//! HTTP hosting and graceful shutdown.
//!
//! The engine is synchronous: each request body is collected, then
//! [`Engine::handle`] runs on tokio's blocking pool so a slow action never
//! stalls the connection reactor.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`]. Anything longer
//! than the orchestrator's grace period is cut off by SIGKILL, so keep that
//! period above your slowest request.

use std::convert::Infallible;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::config;
use crate::engine::Engine;
use crate::error::Error;

/// Hosts an [`Engine`] on a TCP listener.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Parses `addr`; `":port"` binds all interfaces.
    ///
    /// ```rust,no_run
    /// use rondo::Server;
    /// let server = Server::bind(":8000")?;
    /// # Ok::<(), rondo::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = config::socket_addr(addr)
            .parse::<SocketAddr>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(Self { addr })
    }

    /// Serves plain HTTP/1.1 and HTTP/2 until shutdown.
    pub async fn serve(self, engine: Engine) -> Result<(), Error> {
        self.accept_loop(engine, None).await
    }

    /// Serves over TLS with the PEM certificate chain and key at the given
    /// paths.
    pub async fn serve_tls(self, engine: Engine, cert: &Path, key: &Path) -> Result<(), Error> {
        let acceptor = tls_acceptor(cert, key)?;
        self.accept_loop(engine, Some(acceptor)).await
    }

    async fn accept_loop(self, engine: Engine, tls: Option<TlsAcceptor>) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, tls = tls.is_some(), "rondo listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting even
                // while connections are still queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let engine = engine.clone();
                    let tls = tls.clone();
                    tasks.spawn(async move {
                        match tls {
                            None => serve_connection(engine, stream, peer).await,
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(stream) => serve_connection(engine, stream, peer).await,
                                Err(e) => warn!(%peer, "tls handshake failed: {e}"),
                            },
                        }
                    });
                }

                // Reap finished tasks so the set does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("rondo stopped");
        Ok(())
    }
}

async fn serve_connection<S>(engine: Engine, stream: S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let svc = service_fn(move |req| dispatch(engine.clone(), req));

    // `auto::Builder` speaks HTTP/1.1 or HTTP/2, whichever the client
    // negotiates; upgrades are kept available for `Context::hijack`.
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(stream), svc)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Collects the body, up to the configured cap, then runs the engine off
/// the reactor.
///
/// Every failure is answered here, so hyper never sees an error.
async fn dispatch(engine: Engine, req: hyper::Request<Incoming>) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let limit = engine.config().max_body_size;
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(path = parts.uri.path(), limit, "request body too large");
            return Ok(status_response(StatusCode::PAYLOAD_TOO_LARGE));
        }
        Err(e) => {
            warn!(path = parts.uri.path(), "failed to read request body: {e}");
            return Ok(status_response(StatusCode::BAD_REQUEST));
        }
    };
    let req = http::Request::from_parts(parts, body);

    match tokio::task::spawn_blocking(move || engine.handle(req)).await {
        Ok(resp) => Ok(resp),
        Err(e) => {
            error!("request task failed: {e}");
            Ok(status_response(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn status_response(code: StatusCode) -> http::Response<Full<Bytes>> {
    let mut resp = http::Response::new(Full::new(Bytes::from(code.to_string())));
    *resp.status_mut() = code;
    resp
}

// ── TLS ───────────────────────────────────────────────────────────────────────

fn tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, Error> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
        .ok_or_else(|| Error::Tls(format!("no private key in {}", key_path.display())))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_accepts_port_shorthand() {
        assert_eq!(Server::bind(":8000").unwrap().addr.port(), 8000);
        assert!(Server::bind("not an address").is_err());
    }

    #[test]
    fn missing_certificate_is_io_error() {
        let err = tls_acceptor(Path::new("/nonexistent/cert.pem"), Path::new("/nonexistent/key.pem"));
        assert!(matches!(err, Err(Error::Io(_))));
    }

    /// Serves `engine` on a free port and returns the raw response to `raw`.
    async fn exchange(engine: Engine, raw: &[u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        tokio::spawn(Server::bind(&addr.to_string()).unwrap().serve(engine));

        let mut stream = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(20)).await,
            }
        }
        let mut stream = stream.expect("server did not start");

        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        // A rejected body can end in a reset; what was read is enough.
        let _ = stream.read_to_end(&mut out).await;
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let mut engine = Engine::classic();
        engine.get("/", || "over the wire");

        let out = exchange(engine, b"GET / HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 200 OK"), "{out}");
        assert!(out.ends_with("over the wire"), "{out}");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut engine = Engine::classic_with(crate::Config { max_body_size: 8, ..Default::default() });
        engine.post("/", |req: &crate::Request| req.body().len().to_string());

        let raw = b"POST / HTTP/1.1\r\nhost: localhost\r\ncontent-length: 32\r\nconnection: close\r\n\r\n\
                    0123456789abcdef0123456789abcdef";
        let out = exchange(engine.clone(), raw).await;
        assert!(out.starts_with("HTTP/1.1 413"), "{out}");

        let raw = b"POST / HTTP/1.1\r\nhost: localhost\r\ncontent-length: 4\r\nconnection: close\r\n\r\nabcd";
        let out = exchange(engine, raw).await;
        assert!(out.starts_with("HTTP/1.1 200 OK"), "{out}");
        assert!(out.ends_with("4"), "{out}");
    }
}
