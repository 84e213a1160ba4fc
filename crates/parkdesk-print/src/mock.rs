// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptable in-memory transport for tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::error::{PrinterError, Result};
use parkdesk_core::types::ProbeReport;

use crate::locator::TransportTarget;
use crate::transport::Transport;

#[derive(Debug)]
pub(crate) struct MockState {
    /// `locate` finds the printer.
    pub present: bool,
    /// Probes succeed.
    pub alive: bool,
    pub probe_delay: Duration,
    /// Remaining opens that fail.
    pub open_failures: u32,
    pub open_delay: Duration,
    /// Remaining writes that fail.
    pub write_failures: u32,
    pub write_delay: Duration,
    pub open: bool,
    pub locates: u32,
    pub opens: u32,
    pub probes: u32,
    pub writes: Vec<Vec<u8>>,
    pub in_flight: u32,
    pub max_in_flight: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            present: true,
            alive: true,
            probe_delay: Duration::ZERO,
            open_failures: 0,
            open_delay: Duration::ZERO,
            write_failures: 0,
            write_delay: Duration::ZERO,
            open: false,
            locates: 0,
            opens: 0,
            probes: 0,
            writes: Vec::new(),
            in_flight: 0,
            max_in_flight: 0,
        }
    }
}

/// Clones share state, so a test keeps one handle while the driver owns
/// another.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.writes.clone())
    }
}

impl Transport for MockTransport {
    async fn locate(&self, _config: &PrinterConfig) -> Option<TransportTarget> {
        self.with(|s| {
            s.locates += 1;
            s.present
                .then(|| TransportTarget::Device(PathBuf::from("/dev/mock-lp0")))
        })
    }

    async fn open(&mut self, _target: &TransportTarget, _config: &PrinterConfig) -> Result<()> {
        let delay = self.with(|s| {
            s.opens += 1;
            s.open_delay
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if s.open_failures > 0 {
                s.open_failures -= 1;
                Err(PrinterError::Connection("mock open refused".into()))
            } else {
                s.open = true;
                Ok(())
            }
        })
    }

    async fn probe(&mut self) -> Result<ProbeReport> {
        let delay = self.with(|s| s.probe_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if !s.open {
                return Err(PrinterError::NotConnected);
            }
            s.probes += 1;
            if s.alive {
                Ok(ProbeReport::alive())
            } else {
                Err(PrinterError::Connection("mock printer silent".into()))
            }
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let delay = self.with(|s| {
            s.in_flight += 1;
            s.max_in_flight = s.max_in_flight.max(s.in_flight);
            s.write_delay
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            s.in_flight -= 1;
            if !s.open {
                Err(PrinterError::NotConnected)
            } else if s.write_failures > 0 {
                s.write_failures -= 1;
                Err(PrinterError::Write("mock paper jam".into()))
            } else {
                s.writes.push(data.to_vec());
                Ok(())
            }
        })
    }

    async fn close(&mut self) {
        self.with(|s| s.open = false);
    }

    fn describe(&self) -> String {
        "mock:/dev/mock-lp0".into()
    }
}
