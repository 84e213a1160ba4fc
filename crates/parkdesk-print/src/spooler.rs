// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS print spooler passthrough.
//
// Jobs are written to a temporary file and submitted in raw mode so the
// spooler forwards the ESC/POS bytes untouched. Queue state comes from
// `lpstat` (CUPS) or `Get-Printer` (Windows).

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use parkdesk_core::error::{PrinterError, Result};

/// What the spooler says about a named queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Enabled and not printing.
    Idle,
    /// Enabled and currently printing.
    Busy,
    /// Exists but does not accept jobs.
    Disabled,
    /// No such queue (or the spooler could not be queried).
    Missing,
}

impl QueueState {
    /// Usable as a connect target.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Still able to take jobs.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

/// Ask the spooler for the state of `queue`.
#[instrument]
pub async fn queue_state(queue: &str) -> QueueState {
    let output = match status_command(queue).output().await {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "spooler status command unavailable");
            return QueueState::Missing;
        }
    };
    if !output.status.success() {
        return QueueState::Missing;
    }
    parse_queue_state(&String::from_utf8_lossy(&output.stdout), queue)
}

#[cfg(not(windows))]
fn status_command(queue: &str) -> Command {
    let mut cmd = Command::new("lpstat");
    cmd.arg("-p").arg(queue);
    cmd
}

#[cfg(windows)]
fn status_command(queue: &str) -> Command {
    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile")
        .arg("-Command")
        .arg(format!("(Get-Printer -Name '{queue}').PrinterStatus"));
    cmd
}

/// Interpret `lpstat -p` (or `Get-Printer`) output for `queue`.
///
/// CUPS prints lines such as `printer TM-T20 is idle.  enabled since ...` or
/// `printer TM-T20 disabled since ...`.
pub fn parse_queue_state(output: &str, queue: &str) -> QueueState {
    let prefix = format!("printer {queue} ");
    if let Some(line) = output.lines().find(|l| l.starts_with(&prefix)) {
        let line = line.to_ascii_lowercase();
        return if line.contains("disabled") {
            QueueState::Disabled
        } else if line.contains("is idle") {
            QueueState::Idle
        } else if line.contains("now printing") {
            QueueState::Busy
        } else {
            QueueState::Disabled
        };
    }
    if output.lines().any(|l| l.starts_with("printer ")) {
        return QueueState::Missing;
    }

    match output.trim().to_ascii_lowercase().as_str() {
        "normal" => QueueState::Idle,
        "printing" | "busy" | "processing" => QueueState::Busy,
        "" => QueueState::Missing,
        _ => QueueState::Disabled,
    }
}

/// Submit `data` to `queue` in raw mode. If the spooler refuses, write the
/// bytes straight to `fallback_device` when one is available.
#[instrument(skip(data), fields(len = data.len()))]
pub async fn print_raw(queue: &str, data: &[u8], fallback_device: Option<&Path>) -> Result<()> {
    // Deleted when `file` drops; a failed delete is not reported.
    let file = tempfile::Builder::new()
        .prefix("parkdesk-")
        .suffix(".bin")
        .tempfile()?;
    tokio::fs::write(file.path(), data).await?;

    let spooler_err = match raw_print_command(queue, file.path()).output().await {
        Ok(output) if output.status.success() => {
            info!(queue, "job handed to spooler");
            return Ok(());
        }
        Ok(output) => String::from_utf8_lossy(&output.stderr).trim().to_string(),
        Err(e) => e.to_string(),
    };

    let Some(device) = fallback_device else {
        return Err(PrinterError::Spooler(format!("{queue}: {spooler_err}")));
    };

    warn!(queue, device = %device.display(), error = %spooler_err, "spooler refused job, writing to device directly");
    write_device(device, data)
        .await
        .map_err(|e| PrinterError::Spooler(format!("{queue}: {spooler_err}; fallback {}: {e}", device.display())))
}

async fn write_device(device: &Path, data: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new().write(true).open(device).await?;
    file.write_all(data).await?;
    file.flush().await
}

#[cfg(not(windows))]
fn raw_print_command(queue: &str, file: &Path) -> Command {
    let mut cmd = Command::new("lp");
    cmd.arg("-d").arg(queue).arg("-o").arg("raw").arg(file);
    cmd
}

#[cfg(windows)]
fn raw_print_command(queue: &str, file: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C")
        .arg("copy")
        .arg("/B")
        .arg(file)
        .arg(format!("\\\\localhost\\{queue}"));
    cmd
}
