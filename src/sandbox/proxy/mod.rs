//! Local HTTP forward proxy that applies the domain policy to subprocess
//! traffic. `run_command` children get `HTTP_PROXY`/`HTTPS_PROXY` pointed
//! here, so their outbound requests pass the same gate as in-process HTTP.

use crate::policy::domain::DomainChecker;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on a request head (request line + headers).
const MAX_HEAD_BYTES: usize = 64 * 1024;
/// Upper bound on a forwarded request body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct DomainProxy {
    addr: SocketAddr,
    cancel: CancellationToken,
}

impl DomainProxy {
    /// `host:port` for proxy environment variables.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DomainProxy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Bind `127.0.0.1:0` and serve the forward proxy until shutdown.
pub async fn start_domain_proxy(checker: Arc<DomainChecker>) -> Result<DomainProxy> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind domain proxy")?;
    let addr = listener.local_addr()?;
    let cancel = CancellationToken::new();
    info!("domain proxy listening on {}", addr);

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let (stream, peer) = tokio::select! {
                    () = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!("proxy accept failed: {}", e);
                            continue;
                        }
                    }
                };
                let checker = checker.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, checker).await {
                        debug!("proxy connection from {} ended with error: {}", peer, e);
                    }
                });
            }
        });
    }

    Ok(DomainProxy { addr, cancel })
}

/// Read up to the end of the request head (`\r\n\r\n`); returns the head and
/// any body bytes already read past it.
async fn read_head(stream: &mut TcpStream) -> Result<(String, Vec<u8>)> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            anyhow::bail!("connection closed before request head completed");
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let rest = buf[pos + 4..].to_vec();
            return Ok((head, rest));
        }
        if buf.len() > MAX_HEAD_BYTES {
            anyhow::bail!("request head too large");
        }
    }
}

async fn deny(stream: &mut TcpStream, reason: &str) -> Result<()> {
    let body = format!("domain not allowed: {}\n", reason);
    let response = format!(
        "HTTP/1.1 403 Forbidden\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, checker: Arc<DomainChecker>) -> Result<()> {
    let (head, mut body) = read_head(&mut stream).await?;
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default().to_string();
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        anyhow::bail!("malformed request line: {}", request_line);
    };

    if method.eq_ignore_ascii_case("CONNECT") {
        // target is host:port
        if let Err(e) = checker.allow(target).await {
            warn!("proxy CONNECT to {} denied: {}", target, e);
            return deny(&mut stream, target).await;
        }
        let mut upstream = TcpStream::connect(target)
            .await
            .with_context(|| format!("failed to reach {}", target))?;
        stream
            .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
            .await?;
        debug!("proxy tunnel open to {}", target);
        let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
        return Ok(());
    }

    // Absolute-form request (e.g. `GET http://example.com/ HTTP/1.1`).
    let url = url::Url::parse(target)
        .with_context(|| format!("proxy target is not an absolute URL: {}", target))?;
    let host = url.host_str().unwrap_or_default().to_string();
    if let Err(e) = checker.allow(&host).await {
        warn!("proxy request to {} denied: {}", host, e);
        return deny(&mut stream, &host).await;
    }

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|_| anyhow::anyhow!("unsupported method {}", method))?;

    // Carry forward headers, minus hop-by-hop ones.
    let mut content_length = 0usize;
    let mut headers = Vec::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().unwrap_or(0);
        }
        if name.eq_ignore_ascii_case("proxy-connection")
            || name.eq_ignore_ascii_case("connection")
            || name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("keep-alive")
        {
            continue;
        }
        headers.push((name.to_string(), value.to_string()));
    }
    if content_length > MAX_BODY_BYTES {
        anyhow::bail!("request body too large");
    }
    while body.len() < content_length {
        let mut chunk = vec![0u8; (content_length - body.len()).min(64 * 1024)];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let client = reqwest::Client::new();
    let mut request = client.request(method, url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if content_length > 0 {
        request = request.body(body);
    }

    let response = request.send().await?;
    let status = response.status();
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    if let Some(ct) = response.headers().get("content-type").and_then(|v| v.to_str().ok()) {
        head.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    let bytes = response.bytes().await.unwrap_or_default();
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        bytes.len()
    ));
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&bytes).await?;
    Ok(())
}
