//! Opening the byte stream for a [`Transport`].

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use super::{Config, Security, Transport};
use crate::{Error, Result};

/// Pipes to a child process speaking IMAP.
#[derive(Debug)]
pub struct ProcessStream {
    // dropping the handle kills the child
    _child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

/// The byte stream under one connection.
#[derive(Debug)]
pub enum ImapStream {
    /// Cleartext TCP.
    Plain(TcpStream),
    /// TCP wrapped in TLS. Boxed because the session state is large.
    Tls(Box<TlsStream<TcpStream>>),
    /// A spawned server.
    Process(Box<ProcessStream>),
}

impl ImapStream {
    /// True when the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin) {
        match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(tls) => &mut **tls,
            Self::Process(process) => &mut process.stdout,
        }
    }

    fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin) {
        match self {
            Self::Plain(tcp) => tcp,
            Self::Tls(tls) => &mut **tls,
            Self::Process(process) => &mut process.stdin,
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().reader()).poll_read(cx, buf)
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(self.get_mut().writer()).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().writer()).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(self.get_mut().writer()).poll_shutdown(cx)
    }
}

/// A TLS connector trusting the Mozilla root set.
pub fn create_tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Opens the stream a [`Transport`] describes.
///
/// TCP connects (and TLS handshakes) are bounded by the configured connect
/// timeout. Spawning a process is not.
pub async fn connect(transport: &Transport) -> Result<ImapStream> {
    match transport {
        Transport::Tcp(config) => {
            let timeout = config.connect_timeout;
            tokio::time::timeout(timeout, connect_tcp(config))
                .await
                .map_err(|_| Error::Timeout(timeout))?
        }
        Transport::Process { program, args } => spawn(program, args),
    }
}

async fn connect_tcp(config: &Config) -> Result<ImapStream> {
    let addr = format!("{}:{}", config.host, config.port);
    debug!(%addr, security = ?config.security, "connecting");
    let tcp = TcpStream::connect(&addr).await?;

    let stream = match config.security {
        Security::None => ImapStream::Plain(tcp),
        Security::Implicit => {
            let server_name = ServerName::try_from(config.host.clone())?;
            let tls = create_tls_connector().connect(server_name, tcp).await?;
            ImapStream::Tls(Box::new(tls))
        }
    };
    info!(%addr, tls = stream.is_tls(), "connected");
    Ok(stream)
}

fn spawn(program: &str, args: &[String]) -> Result<ImapStream> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::InvalidState("child stdin not captured".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::InvalidState("child stdout not captured".to_string()))?;

    info!(program, "spawned IMAP process");
    Ok(ImapStream::Process(Box::new(ProcessStream {
        _child: child,
        stdin,
        stdout,
    })))
}
