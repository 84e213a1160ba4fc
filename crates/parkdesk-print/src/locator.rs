// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport locator.
//
// Resolves the configured transport kind to one concrete target: a USB
// character device, a host:port pair, or a spooler queue. USB lookup tries
// the configured path first and then walks a per-platform candidate table.
// Nothing here opens the device.

use std::path::{Path, PathBuf};

use tracing::debug;

use parkdesk_core::config::PrinterConfig;
use parkdesk_core::types::TransportKind;

use crate::spooler;

/// Operating system family, used to pick the USB candidate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }
}

/// One entry of a USB candidate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Character device path.
    Device(&'static str),
    /// Spooler queue a USB printer is usually installed under.
    Queue(&'static str),
}

// Vendor udev symlinks come first so a stable name wins over lpN numbering.
const LINUX_CANDIDATES: &[Candidate] = &[
    Candidate::Device("/dev/usb/thermal"),
    Candidate::Device("/dev/thermal-printer"),
    Candidate::Device("/dev/usb/lp0"),
    Candidate::Device("/dev/usb/lp1"),
    Candidate::Device("/dev/lp0"),
];

const MACOS_CANDIDATES: &[Candidate] = &[
    Candidate::Queue("POS_58"),
    Candidate::Queue("POS_80"),
    Candidate::Queue("EPSON_TM_T20"),
    Candidate::Device("/dev/cu.usbserial"),
];

const WINDOWS_CANDIDATES: &[Candidate] = &[
    Candidate::Queue("POS-58"),
    Candidate::Queue("POS-80"),
    Candidate::Queue("EPSON TM-T20 Receipt"),
];

/// USB candidates for `platform`, most specific first.
///
/// With no configured device path the first usable entry is the default.
pub fn usb_candidates(platform: Platform) -> &'static [Candidate] {
    match platform {
        Platform::Linux => LINUX_CANDIDATES,
        Platform::MacOs => MACOS_CANDIDATES,
        Platform::Windows => WINDOWS_CANDIDATES,
        Platform::Other => &[],
    }
}

/// A concrete place to send bytes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Device(PathBuf),
    Network { host: String, port: u16 },
    Queue(String),
}

impl std::fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(path) => write!(f, "usb:{}", path.display()),
            Self::Network { host, port } => write!(f, "tcp:{host}:{port}"),
            Self::Queue(name) => write!(f, "spooler:{name}"),
        }
    }
}

/// Find the target for the configured transport, or `None` if nothing usable
/// is present.
pub async fn locate(config: &PrinterConfig) -> Option<TransportTarget> {
    locate_in(config, usb_candidates(Platform::current())).await
}

pub(crate) async fn locate_in(
    config: &PrinterConfig,
    candidates: &[Candidate],
) -> Option<TransportTarget> {
    match config.transport {
        TransportKind::Tcp => {
            let host = config.host.clone().filter(|h| !h.is_empty())?;
            Some(TransportTarget::Network {
                host,
                port: config.port,
            })
        }
        TransportKind::Spooler => {
            let queue = config.queue_name.as_deref().filter(|q| !q.is_empty())?;
            ready_queue(queue).await
        }
        TransportKind::Usb => {
            if let Some(path) = &config.device_path {
                if is_usable_device(path) {
                    return Some(TransportTarget::Device(path.clone()));
                }
                debug!(path = %path.display(), "configured device not usable, trying candidates");
            }
            for candidate in candidates {
                let found = match *candidate {
                    Candidate::Device(path) => {
                        is_usable_device(Path::new(path)).then(|| TransportTarget::Device(path.into()))
                    }
                    Candidate::Queue(name) => ready_queue(name).await,
                };
                if found.is_some() {
                    return found;
                }
            }
            None
        }
    }
}

async fn ready_queue(queue: &str) -> Option<TransportTarget> {
    let state = spooler::queue_state(queue).await;
    debug!(queue, ?state, "spooler queue checked");
    state
        .is_ready()
        .then(|| TransportTarget::Queue(queue.to_string()))
}

/// Whether `path` exists and is a character device. Symlinks are followed.
#[cfg(unix)]
pub fn is_usable_device(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    std::fs::metadata(path)
        .map(|meta| meta.file_type().is_char_device())
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_usable_device(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

/// First usable character device: the configured path, then the device
/// entries of the platform table. Used as the spooler fallback.
pub fn first_usable_device(config: &PrinterConfig) -> Option<PathBuf> {
    first_usable_device_in(config, usb_candidates(Platform::current()))
}

pub(crate) fn first_usable_device_in(
    config: &PrinterConfig,
    candidates: &[Candidate],
) -> Option<PathBuf> {
    let configured = config.device_path.iter().cloned();
    let table = candidates.iter().filter_map(|c| match c {
        Candidate::Device(path) => Some(PathBuf::from(path)),
        Candidate::Queue(_) => None,
    });
    configured.chain(table).find(|p| is_usable_device(p))
}
