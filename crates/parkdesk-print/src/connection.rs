// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection manager: sole owner of the transport.
//
// Every open, write, probe and close goes through here, and the driver keeps
// the manager behind an async mutex, so at most one of them is in flight.

use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::error::{PrinterError, Result};
use parkdesk_core::types::ProbeReport;

use crate::locator::TransportTarget;
use crate::retry::ConnectRetry;
use crate::transport::Transport;

/// Connection lifecycle as seen by the driver.
///
/// `Error` is always followed by a scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: PrinterConfig,
    target: Option<TransportTarget>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: PrinterConfig) -> Self {
        Self {
            transport,
            config,
            target: None,
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// The target of the open session, if any.
    #[cfg(test)]
    pub fn target(&self) -> Option<&TransportTarget> {
        self.target.as_ref()
    }

    /// Locate the printer and open a session.
    ///
    /// A printer that cannot be located fails at once with `DeviceNotFound`.
    /// Otherwise up to `retry_attempts` opens are made, each bounded by the
    /// connect timeout and separated by the fixed retry delay. `on_retry` is
    /// called with `(attempt, max_attempts, error)` for every failure that
    /// is followed by another attempt.
    #[instrument(skip_all)]
    pub async fn establish<F>(&mut self, mut on_retry: F) -> Result<()>
    where
        F: FnMut(u32, u32, &PrinterError) + Send,
    {
        let target = self
            .transport
            .locate(&self.config)
            .await
            .ok_or_else(|| PrinterError::DeviceNotFound(self.config.endpoint().to_string()))?;
        self.adopt(&target);

        let retry = ConnectRetry::from_config(&self.config);
        let limit = self.config.connect_timeout();
        let mut attempt = 1;
        loop {
            debug!(%target, attempt, "opening transport");
            let result = match timeout(limit, self.transport.open(&target, &self.config)).await {
                Ok(result) => result,
                Err(_) => Err(PrinterError::Timeout(limit)),
            };

            match result {
                Ok(()) => {
                    info!(%target, attempt, "transport open");
                    self.target = Some(target);
                    return Ok(());
                }
                Err(e) if retry.has_next(attempt) => {
                    on_retry(attempt, retry.attempts, &e);
                    sleep(retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.transport.close().await;
                    return Err(e);
                }
            }
        }
    }

    /// Replace the config copy when the located device differs from the
    /// configured one, so later lookups try it first.
    fn adopt(&mut self, target: &TransportTarget) {
        let TransportTarget::Device(path) = target else {
            return;
        };
        if self.config.device_path.as_ref() == Some(path) {
            return;
        }
        info!(device = %path.display(), "using located device");
        self.config = PrinterConfig {
            device_path: Some(path.clone()),
            ..self.config.clone()
        };
    }

    /// Write one encoded job on the open session.
    pub async fn execute(&mut self, data: &[u8]) -> Result<()> {
        if self.target.is_none() {
            return Err(PrinterError::NotConnected);
        }
        self.transport.write(data).await
    }

    pub async fn probe(&mut self) -> Result<ProbeReport> {
        if self.target.is_none() {
            return Err(PrinterError::NotConnected);
        }
        self.transport.probe().await
    }

    pub async fn close(&mut self) {
        self.target = None;
        self.transport.close().await;
    }

    /// Label of the open session, e.g. `tcp:10.0.0.20:9100`.
    pub fn describe(&self) -> String {
        self.transport.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> PrinterConfig {
        PrinterConfig {
            retry_delay_ms: 100,
            connect_timeout_ms: 1_000,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_opens() {
        let mock = MockTransport::new();
        mock.with(|s| s.open_failures = 2);
        let mut manager = ConnectionManager::new(mock.clone(), config());

        let mut retries = Vec::new();
        manager
            .establish(|attempt, max, _| retries.push((attempt, max)))
            .await
            .expect("establish");

        assert_eq!(manager.describe(), "mock:/dev/mock-lp0");
        assert_eq!(retries, [(1, 3), (2, 3)]);
        assert_eq!(mock.with(|s| s.opens), 3);
        assert!(manager.target().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_configured_attempts() {
        let mock = MockTransport::new();
        mock.with(|s| s.open_failures = 10);
        let mut manager = ConnectionManager::new(mock.clone(), config());

        let err = manager.establish(|_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, PrinterError::Connection(_)));
        assert_eq!(mock.with(|s| s.opens), 3);
        assert!(manager.target().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_device_does_not_consume_attempts() {
        let mock = MockTransport::new();
        mock.with(|s| s.present = false);
        let mut manager = ConnectionManager::new(mock.clone(), config());

        let err = manager.establish(|_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, PrinterError::DeviceNotFound(_)));
        assert_eq!(mock.with(|s| s.opens), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_open_times_out() {
        let mock = MockTransport::new();
        mock.with(|s| s.open_delay = Duration::from_secs(5));
        let mut manager = ConnectionManager::new(
            mock.clone(),
            PrinterConfig {
                retry_attempts: 1,
                ..config()
            },
        );

        let err = manager.establish(|_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, PrinterError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn located_device_replaces_config() {
        let mock = MockTransport::new();
        let mut manager = ConnectionManager::new(mock, config());
        assert!(manager.config().device_path.is_none());

        manager.establish(|_, _, _| {}).await.expect("establish");
        assert_eq!(
            manager.config().device_path,
            Some(PathBuf::from("/dev/mock-lp0"))
        );
    }

    #[tokio::test]
    async fn execute_requires_session() {
        let mock = MockTransport::new();
        let mut manager = ConnectionManager::new(mock.clone(), config());
        assert!(matches!(
            manager.execute(b"x").await,
            Err(PrinterError::NotConnected)
        ));

        manager.establish(|_, _, _| {}).await.expect("establish");
        manager.execute(b"x").await.expect("execute");
        manager.close().await;
        assert!(matches!(
            manager.probe().await,
            Err(PrinterError::NotConnected)
        ));
        assert_eq!(mock.writes(), [b"x".to_vec()]);
    }
}
