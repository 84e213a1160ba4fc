// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Byte transports: USB character device, raw TCP (JetDirect, port 9100) and
// the OS spooler in raw mode.
//
// There is no protocol negotiation on any of them. The printer receives the
// ESC/POS stream exactly as encoded; the only feedback channel is the
// DLE EOT real-time status request.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::error::{PrinterError, Result};
use parkdesk_core::types::ProbeReport;

use crate::escpos;
use crate::locator::{self, TransportTarget};
use crate::spooler;

/// How long a TCP probe waits for each status byte.
const PROBE_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// A way of getting bytes to the printer.
///
/// The connection manager owns exactly one transport and serialises every
/// call on it, so implementations never see concurrent writes.
pub trait Transport: Send + Sync + 'static {
    /// Resolve the configured endpoint to a concrete target.
    fn locate(&self, config: &PrinterConfig) -> impl Future<Output = Option<TransportTarget>> + Send;

    /// Open a session on `target`, replacing any previous one.
    fn open(
        &mut self,
        target: &TransportTarget,
        config: &PrinterConfig,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Liveness probe on the open session.
    fn probe(&mut self) -> impl Future<Output = Result<ProbeReport>> + Send;

    /// Send one encoded job.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Drop the session. Never fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Short label for logs and the `Connected` event.
    fn describe(&self) -> String;
}

enum Session {
    Device { path: PathBuf, file: File },
    Network { stream: TcpStream },
    Queue { name: String, fallback: Option<PathBuf> },
}

/// The real transport. The strategy is chosen by the located target.
#[derive(Default)]
pub struct SystemTransport {
    target: Option<TransportTarget>,
    session: Option<Session>,
}

impl SystemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(PrinterError::NotConnected)
    }
}

impl Transport for SystemTransport {
    async fn locate(&self, config: &PrinterConfig) -> Option<TransportTarget> {
        locator::locate(config).await
    }

    #[instrument(skip(self, config), fields(target = %target))]
    async fn open(&mut self, target: &TransportTarget, config: &PrinterConfig) -> Result<()> {
        self.close().await;

        let session = match target {
            TransportTarget::Device(path) => Session::Device {
                path: path.clone(),
                file: open_device(path).await?,
            },
            TransportTarget::Network { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| PrinterError::Connection(format!("tcp {host}:{port}: {e}")))?;
                stream
                    .set_nodelay(true)
                    .map_err(|e| PrinterError::Connection(format!("TCP_NODELAY: {e}")))?;
                Session::Network { stream }
            }
            TransportTarget::Queue(name) => {
                let state = spooler::queue_state(name).await;
                if !state.is_enabled() {
                    return Err(PrinterError::Connection(format!(
                        "spooler queue {name} is {state:?}"
                    )));
                }
                Session::Queue {
                    name: name.clone(),
                    fallback: locator::first_usable_device(config),
                }
            }
        };

        info!("transport session opened");
        self.target = Some(target.clone());
        self.session = Some(session);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn probe(&mut self) -> Result<ProbeReport> {
        match self.session()? {
            Session::Device { path, file } => {
                if !locator::is_usable_device(path) {
                    return Err(PrinterError::Connection(format!(
                        "{} is no longer present",
                        path.display()
                    )));
                }
                // USB printer class devices are write-only here; a failed
                // status request is the liveness signal.
                file.write_all(&escpos::status_request(1))
                    .await
                    .map_err(|e| PrinterError::Connection(format!("status request: {e}")))?;
                Ok(ProbeReport::alive())
            }
            Session::Network { stream } => probe_network(stream).await,
            Session::Queue { name, .. } => {
                let state = spooler::queue_state(name).await;
                if state.is_enabled() {
                    Ok(ProbeReport::alive())
                } else {
                    Err(PrinterError::Connection(format!(
                        "spooler queue {name} is {state:?}"
                    )))
                }
            }
        }
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self.session()? {
            Session::Device { file, .. } => {
                file.write_all(data)
                    .await
                    .map_err(|e| PrinterError::Write(e.to_string()))?;
                file.flush()
                    .await
                    .map_err(|e| PrinterError::Write(format!("flush: {e}")))?;
            }
            Session::Network { stream } => {
                stream
                    .write_all(data)
                    .await
                    .map_err(|e| PrinterError::Write(e.to_string()))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| PrinterError::Write(format!("flush: {e}")))?;
            }
            Session::Queue { name, fallback } => {
                spooler::print_raw(name, data, fallback.as_deref()).await?;
            }
        }
        debug!("job bytes written");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(Session::Network { mut stream }) = self.session.take() {
            // Peer may already be gone.
            let _ = stream.shutdown().await;
        }
        if let Some(target) = self.target.take() {
            debug!(%target, "transport session closed");
        }
    }

    fn describe(&self) -> String {
        self.target
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "disconnected".into())
    }
}

async fn open_device(path: &Path) -> Result<File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| PrinterError::Connection(format!("{}: {e}", path.display())))
}

/// Ask for all four status bytes. A closed socket is fatal; a printer that
/// simply does not answer is alive with unknown sensors.
async fn probe_network(stream: &mut TcpStream) -> Result<ProbeReport> {
    let mut replies = [None; 4];
    for (n, reply) in (1u8..=4).zip(replies.iter_mut()) {
        stream
            .write_all(&escpos::status_request(n))
            .await
            .map_err(|e| PrinterError::Connection(format!("status request: {e}")))?;

        let mut byte = [0u8; 1];
        match tokio::time::timeout(PROBE_REPLY_TIMEOUT, stream.read(&mut byte)).await {
            Ok(Ok(0)) => return Err(PrinterError::Connection("connection closed by printer".into())),
            Ok(Ok(_)) => *reply = Some(byte[0]),
            Ok(Err(e)) => return Err(PrinterError::Connection(format!("status reply: {e}"))),
            Err(_) => debug!(n, "no status reply"),
        }
    }
    Ok(escpos::decode_status(replies))
}
