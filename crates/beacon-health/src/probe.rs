//! Minimal HTTP/1.1 client used by the HTTP check.
//!
//! Opens a plain TCP connection, performs a single request with hyper, and
//! returns the response status. Timeouts are enforced by the engine; when
//! the engine gives up on a probe its task is aborted, which drops the
//! connection.

use anyhow::{Context, bail};
use http::{Method, StatusCode, Uri};
use tracing::debug;

/// Target of an HTTP check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub url: String,
    pub method: Method,
}

impl HttpTarget {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::HEAD,
        }
    }
}

/// Perform one request and return the response status.
///
/// Errors cover malformed URLs, connection failures, and protocol errors.
pub async fn http_request(target: &HttpTarget) -> anyhow::Result<StatusCode> {
    let uri: Uri = target
        .url
        .parse()
        .with_context(|| format!("invalid url {:?}", target.url))?;
    if uri.scheme_str() != Some("http") {
        bail!("unsupported url scheme in {:?}", target.url);
    }
    let host = uri.host().context("url has no host")?;
    let port = uri.port_u16().unwrap_or(80);
    let authority = format!("{host}:{port}");
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let stream = tokio::net::TcpStream::connect((connect_host(host), port))
        .await
        .with_context(|| format!("connection to {authority} failed"))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .context("http handshake failed")?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "health probe connection closed");
        }
    });

    let req = http::Request::builder()
        .method(target.method.clone())
        .uri(path)
        .header(http::header::HOST, authority.as_str())
        .header(http::header::USER_AGENT, "beacon-health/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .context("failed to build request")?;

    let resp = sender
        .send_request(req)
        .await
        .with_context(|| format!("request to {} failed", target.url))?;

    debug!(status = %resp.status(), url = %target.url, "health probe response");
    Ok(resp.status())
}

/// `Uri::host` keeps the brackets of an IPv6 literal; the resolver wants
/// the bare address. The `Host` header keeps them.
fn connect_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `status` to every request after `delay`. Returns the bound address.
    pub async fn serve(status: &'static str, delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        serve_on(listener, status, delay)
    }

    /// Like [`serve`], on an already bound listener.
    pub fn serve_on(listener: TcpListener, status: &'static str, delay: Duration) -> SocketAddr {
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let resp = format!(
                        "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(resp.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    /// An address nothing is listening on.
    pub async fn closed_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }
}
